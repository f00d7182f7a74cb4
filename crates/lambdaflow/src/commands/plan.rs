use crate::project::Project;
use colored::Colorize;
use lambdaflow_cloud::{ActionType, Plan};

pub async fn handle(project: &Project, image: Option<String>) -> anyhow::Result<()> {
    project.print_header("変更内容を確認しています...");

    let spec = project.function_spec()?;
    let image = project.image(image)?;
    let settings = project.release_settings(&spec.region)?;

    let ctx = project.context();
    let pipeline = project.connect(&ctx, &spec.region).await?;
    let plan = pipeline
        .plan(&ctx, &spec, &image, settings.as_ref())
        .await?;

    print_plan(&plan);
    Ok(())
}

pub fn print_plan(plan: &Plan) {
    println!();
    for action in &plan.actions {
        let mark = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Delete => "-".red(),
        };
        println!(
            "  {} {} {} ({})",
            mark,
            action.resource_type,
            action.resource_id.cyan(),
            action.description
        );
        for (key, value) in &action.details {
            println!("      {}: {}", key, value);
        }
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
}

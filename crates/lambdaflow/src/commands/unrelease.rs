use crate::project::{Project, confirmed};
use colored::Colorize;
use lambdaflow_cloud_aws::record;

pub async fn handle(project: &Project, yes: bool) -> anyhow::Result<()> {
    project.print_header("リリースを解除します...");

    let state_manager = project.state();
    let lock = state_manager.acquire_lock().await?;
    let mut state = state_manager.load().await?;

    let event_bus = project.event_bus(&state)?;
    let region = match project.release_settings(&project.function_region())? {
        Some(settings) => settings.region,
        None => project.function_region(),
    };

    println!("  • EventBridge ルール {} ({})", project.app.cyan(), event_bus);
    println!();
    if !confirmed(yes, "警告: ルールを削除します。関数とバージョンは残ります。") {
        return Ok(());
    }

    let ctx = project.context();
    let pipeline = project.connect(&ctx, &region).await?;
    pipeline.unrelease(&ctx, &event_bus).await?;

    state.remove_record(&project.app, record::RELEASE);
    state_manager.save(&state).await?;
    lock.release().await?;

    println!();
    println!("{}", "✓ リリースを解除しました".green().bold());
    Ok(())
}

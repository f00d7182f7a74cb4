use crate::project::Project;
use colored::Colorize;
use lambdaflow_cloud_aws::record;

pub async fn handle(project: &Project) -> anyhow::Result<()> {
    project.print_header("リリースを開始します...");

    let settings = project
        .release_settings(&project.function_region())?
        .ok_or_else(|| anyhow::anyhow!("lambdaflow.kdl に release ブロックがありません"))?;

    let state_manager = project.state();
    let lock = state_manager.acquire_lock().await?;
    let mut state = state_manager.load().await?;

    let deployment = project.deployment(&state)?.ok_or_else(|| {
        anyhow::anyhow!(
            "{} のデプロイ記録がありません。先に lambdaflow deploy を実行してください",
            project.app
        )
    })?;
    println!(
        "バージョン {} を {} にリリースします",
        deployment.version.cyan(),
        settings.event_bus.cyan()
    );
    println!();

    let ctx = project.context();
    let pipeline = project.connect(&ctx, &settings.region).await?;
    let previous = project.release(&state)?;
    let release = pipeline
        .release(&ctx, &settings, &deployment, previous.as_ref())
        .await?;

    state.put_record(&project.app, record::RELEASE, &release)?;
    state_manager.save(&state).await?;
    lock.release().await?;

    println!();
    println!("{}", "✓ リリースが完了しました".green().bold());
    println!("  ルール: {}", release.rule_arn.cyan());
    println!("  対象:   {}", release.function_arn);
    if let Some(url) = release.url() {
        println!("  URL:    {}", url.cyan());
    }

    Ok(())
}

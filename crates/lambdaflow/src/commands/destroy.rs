use crate::project::{Project, confirmed};
use colored::Colorize;
use lambdaflow_cloud_aws::record;

/// 最新のデプロイを取り消す（バージョン + ルール）
pub async fn handle(project: &Project, yes: bool) -> anyhow::Result<()> {
    project.print_header("デプロイを取り消します...");

    let state_manager = project.state();
    let lock = state_manager.acquire_lock().await?;
    let mut state = state_manager.load().await?;

    let deployment = project.deployment(&state)?.ok_or_else(|| {
        anyhow::anyhow!("{} のデプロイ記録がありません", project.app)
    })?;
    let event_bus = project.event_bus(&state)?;

    println!("  • バージョン {} ({})", deployment.version.cyan(), deployment.ver_arn);
    println!("  • EventBridge ルール {} ({})", project.app.cyan(), event_bus);
    println!();
    if !confirmed(yes, "警告: 上記のリソースを削除します。") {
        return Ok(());
    }

    let ctx = project.context();
    let pipeline = project.connect(&ctx, &deployment.region).await?;
    pipeline.rollback(&ctx, &deployment, &event_bus).await?;

    state.remove_record(&project.app, record::DEPLOYMENT);
    state.remove_record(&project.app, record::RELEASE);
    state_manager.save(&state).await?;
    lock.release().await?;

    println!();
    println!("{}", "✓ デプロイを取り消しました".green().bold());
    Ok(())
}

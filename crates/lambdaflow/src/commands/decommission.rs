use crate::commands::plan::print_plan;
use crate::project::{Project, confirmed};
use colored::Colorize;
use lambdaflow_cloud_aws::Pipeline;

/// 関数ごと削除する
pub async fn handle(project: &Project, yes: bool) -> anyhow::Result<()> {
    project.print_header("アプリケーションを削除します...");

    let state_manager = project.state();
    let lock = state_manager.acquire_lock().await?;
    let mut state = state_manager.load().await?;

    let deployment = project.deployment(&state)?;
    let event_bus = project.event_bus(&state)?;
    let region = deployment
        .as_ref()
        .map(|d| d.region.clone())
        .unwrap_or_else(|| project.function_region());

    print_plan(&Pipeline::plan_decommission(&project.app, deployment.as_ref()));

    if !confirmed(
        yes,
        "警告: 関数・全バージョン・EventBridge ルールを削除します。元に戻せません。",
    ) {
        return Ok(());
    }

    let ctx = project.context();
    let pipeline = project.connect(&ctx, &region).await?;
    pipeline
        .decommission(&ctx, deployment.as_ref(), Some(&event_bus))
        .await?;

    let removed = state.remove_app(&project.app);
    state_manager.save(&state).await?;
    lock.release().await?;

    println!();
    println!("{}", "✓ アプリケーションを削除しました".green().bold());
    tracing::debug!("Removed {} local records", removed);
    Ok(())
}

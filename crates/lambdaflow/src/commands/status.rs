use crate::project::Project;
use colored::Colorize;

/// 記録済みの状態を表示（AWS には接続しない）
pub async fn handle(project: &Project) -> anyhow::Result<()> {
    let state = project.state().load().await?;

    println!("{}", format!("アプリケーション: {}", project.app).bold());
    println!();

    match project.deployment(&state)? {
        Some(deployment) => {
            println!("{}", "デプロイ".cyan().bold());
            println!("  ID:         {}", deployment.id);
            println!("  リージョン: {}", deployment.region);
            println!("  関数:       {}", deployment.func_arn);
            if deployment.has_version() {
                println!("  バージョン: {} ({})", deployment.version.green(), deployment.ver_arn);
            } else {
                println!("  バージョン: {}", "(未発行)".yellow());
            }
        }
        None => println!("{}", "デプロイ記録はありません".dimmed()),
    }
    println!();

    match project.release(&state)? {
        Some(release) => {
            println!("{}", "リリース".cyan().bold());
            println!("  ルール:       {}", release.rule_arn);
            println!("  イベントバス: {}", release.event_bus);
            println!("  ソース:       {}", release.event_source);
            println!("  対象:         {}", release.function_arn);
            if let Some(url) = release.url() {
                println!("  URL:          {}", url.cyan());
            }
        }
        None => println!("{}", "リリース記録はありません".dimmed()),
    }

    if let Some(updated) = state
        .records_for(&project.app)
        .iter()
        .map(|r| r.updated_at)
        .max()
    {
        println!();
        println!("最終更新: {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}

use crate::project::Project;
use colored::Colorize;
use lambdaflow_cloud_aws::record;

pub async fn handle(project: &Project, image: Option<String>) -> anyhow::Result<()> {
    project.print_header("デプロイを開始します...");

    let spec = project.function_spec()?;
    let image = project.image(image)?;
    println!("リージョン: {}", spec.region.cyan());
    println!("イメージ: {}", image.cyan());
    println!();

    let state_manager = project.state();
    let lock = state_manager.acquire_lock().await?;
    let mut state = state_manager.load().await?;

    let previous = project.release(&state)?;

    let ctx = project.context();
    let pipeline = project.connect(&ctx, &spec.region).await?;
    let outcome = pipeline
        .deploy(&ctx, &spec, &image, previous.as_ref())
        .await?;

    // 公開済みのバージョンは紐付けに失敗しても記録する
    state.put_record(&project.app, record::DEPLOYMENT, &outcome.deployment)?;
    let release = match outcome.release {
        Some(Ok(release)) => {
            state.put_record(&project.app, record::RELEASE, &release)?;
            Some(release)
        }
        Some(Err(e)) => {
            state_manager.save(&state).await?;
            lock.release().await?;
            return Err(anyhow::Error::new(e).context(format!(
                "バージョン {} は発行されましたが、EventBridge ルールの紐付けに失敗しました",
                outcome.deployment.version
            )));
        }
        None => None,
    };
    state_manager.save(&state).await?;
    lock.release().await?;

    let deployment = &outcome.deployment;
    println!();
    println!("{}", "✓ デプロイが完了しました".green().bold());
    println!("  関数:       {}", deployment.func_arn.cyan());
    println!("  バージョン: {} ({})", deployment.version.cyan(), deployment.ver_arn);
    if let Some(release) = &release {
        println!(
            "  ルール:     {} (source: {})",
            release.rule_arn.cyan(),
            release.event_source
        );
    }

    Ok(())
}

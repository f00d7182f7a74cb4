mod commands;
mod project;

use clap::{Parser, Subcommand};
use project::Overrides;

#[derive(Parser)]
#[command(name = "lambdaflow")]
#[command(about = "コンテナイメージを Lambda にデプロイし、EventBridge でリリースする", long_about = None)]
struct Cli {
    /// デバッグログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    /// アプリケーション名（設定ファイルの app を上書き）
    #[arg(long, global = true, env = "LAMBDAFLOW_APP")]
    app: Option<String>,

    /// ワークスペース名（設定ファイルの workspace を上書き）
    #[arg(short, long, global = true, env = "LAMBDAFLOW_WORKSPACE")]
    workspace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 関数を作成・更新し、新しいバージョンを発行
    Deploy {
        /// デプロイするイメージ URI（設定ファイルの image を上書き）
        #[arg(short, long, env = "LAMBDAFLOW_IMAGE")]
        image: Option<String>,
    },
    /// 最新のデプロイを EventBridge ルールに紐付け
    Release,
    /// 変更内容を表示（リモートは変更しない）
    Plan {
        /// デプロイするイメージ URI（設定ファイルの image を上書き）
        #[arg(short, long, env = "LAMBDAFLOW_IMAGE")]
        image: Option<String>,
    },
    /// 最新のデプロイを取り消す（バージョンとルールを削除）
    Destroy {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// EventBridge ルールのみ削除
    Unrelease {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 関数・バージョン・ルールをすべて削除
    Decommission {
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// 記録済みのデプロイとリリースを表示
    Status,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderrへ（-v でdebug）
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new(
            "lambdaflow=debug,lambdaflow_cloud=debug,lambdaflow_cloud_aws=debug",
        )
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Versionコマンドは設定ファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("lambdaflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let overrides = Overrides {
        app: cli.app,
        workspace: cli.workspace,
    };
    let project = project::Project::load(overrides)?;

    match cli.command {
        Commands::Deploy { image } => commands::deploy::handle(&project, image).await?,
        Commands::Release => commands::release::handle(&project).await?,
        Commands::Plan { image } => commands::plan::handle(&project, image).await?,
        Commands::Destroy { yes } => commands::destroy::handle(&project, yes).await?,
        Commands::Unrelease { yes } => commands::unrelease::handle(&project, yes).await?,
        Commands::Decommission { yes } => commands::decommission::handle(&project, yes).await?,
        Commands::Status => commands::status::handle(&project).await?,
        Commands::Version => unreachable!("Version is handled before config loading"),
    }

    Ok(())
}

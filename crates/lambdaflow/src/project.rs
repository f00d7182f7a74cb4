use anyhow::Context;
use colored::Colorize;
use lambdaflow_cloud::{GlobalState, ReconcileContext, Source, StateManager, TerminalReporter};
use lambdaflow_cloud_aws::{
    AwsSessionProvider, Deployment, DesiredFunctionSpec, Pipeline, Release, ReleaseSettings,
    record,
};
use lambdaflow_config::ProjectConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// コマンドラインからの上書き
pub struct Overrides {
    pub app: Option<String>,
    pub workspace: Option<String>,
}

/// 読み込み済みのプロジェクト
pub struct Project {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config: ProjectConfig,
    pub app: String,
    pub workspace: Option<String>,
}

impl Project {
    pub fn load(overrides: Overrides) -> anyhow::Result<Self> {
        let (config_path, config) =
            lambdaflow_config::load_project_config().context("設定ファイルの読み込みに失敗しました")?;
        tracing::debug!("Loaded config from {}", config_path.display());

        let app = overrides
            .app
            .or_else(|| config.app.clone())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "アプリケーション名が設定されていません（lambdaflow.kdl の app または --app）"
                )
            })?;
        let workspace = overrides.workspace.or_else(|| config.workspace.clone());

        Ok(Self {
            root: std::env::current_dir()?,
            config_path,
            config,
            app,
            workspace,
        })
    }

    pub fn print_header(&self, title: &str) {
        println!("{}", title.blue().bold());
        println!("📄 設定ファイル: {}", self.config_path.display().to_string().cyan());
        println!("アプリケーション: {}", self.app.cyan());
        if let Some(workspace) = &self.workspace {
            println!("ワークスペース: {}", workspace.cyan());
        }
        println!();
    }

    pub fn state(&self) -> StateManager {
        StateManager::new(&self.root)
    }

    pub fn function_spec(&self) -> anyhow::Result<DesiredFunctionSpec> {
        DesiredFunctionSpec::resolve(&self.config.deploy, self.workspace.as_deref())
            .context("deploy 設定が不正です")
    }

    pub fn image(&self, image: Option<String>) -> anyhow::Result<String> {
        image
            .or_else(|| self.config.image.clone())
            .filter(|i| !i.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("イメージが指定されていません（lambdaflow.kdl の image または --image）")
            })
    }

    /// release ブロックがあれば解決する
    pub fn release_settings(&self, fallback_region: &str) -> anyhow::Result<Option<ReleaseSettings>> {
        self.config
            .release
            .as_ref()
            .map(|release| {
                ReleaseSettings::resolve(release, fallback_region).context("release 設定が不正です")
            })
            .transpose()
    }

    /// 端末出力付きのコンテキスト（Ctrl-C でキャンセル）
    pub fn context(&self) -> ReconcileContext {
        let mut source = Source::new(&self.app);
        if let Some(workspace) = &self.workspace {
            source = source.with_workspace(workspace);
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "キャンセルしています...".yellow());
                token.cancel();
            }
        });

        ReconcileContext::new(source, Arc::new(TerminalReporter::new())).with_cancel(cancel)
    }

    pub async fn connect(&self, ctx: &ReconcileContext, region: &str) -> anyhow::Result<Pipeline> {
        Pipeline::connect(&AwsSessionProvider, ctx, region)
            .await
            .with_context(|| format!("AWS ({}) への接続に失敗しました", region))
    }

    pub fn deployment(&self, state: &GlobalState) -> anyhow::Result<Option<Deployment>> {
        Ok(state.get_record(&self.app, record::DEPLOYMENT)?)
    }

    pub fn release(&self, state: &GlobalState) -> anyhow::Result<Option<Release>> {
        Ok(state.get_record(&self.app, record::RELEASE)?)
    }

    /// 削除対象のイベントバス（記録 > 設定 > default）
    pub fn event_bus(&self, state: &GlobalState) -> anyhow::Result<String> {
        if let Some(release) = self.release(state)? {
            return Ok(release.event_bus);
        }
        let region = self.function_region();
        Ok(self
            .release_settings(&region)?
            .map(|s| s.event_bus)
            .unwrap_or_else(|| lambdaflow_cloud_aws::DEFAULT_EVENT_BUS.to_string()))
    }

    /// 関数のリージョン（deploy 設定、未指定なら既定値）
    pub fn function_region(&self) -> String {
        self.config
            .deploy
            .region
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| lambdaflow_cloud_aws::DEFAULT_REGION.to_string())
    }
}

/// 破壊的操作の確認
pub fn confirmed(yes: bool, warning: &str) -> bool {
    if yes {
        return true;
    }
    println!("{}", warning.yellow());
    println!("実行するには --yes オプションを指定してください");
    false
}

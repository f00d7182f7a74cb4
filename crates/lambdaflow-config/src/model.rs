//! 設定モデル
//!
//! パース直後の生の値を保持する。デフォルト値の適用は
//! プロバイダ側（`DesiredFunctionSpec::resolve` など）で一度だけ行う。

use serde::{Deserialize, Serialize};

/// lambdaflow.kdl 全体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// アプリケーション名（関数名・ルール名として使われる）
    pub app: Option<String>,

    /// ワークスペース名（環境タグのデフォルト）
    pub workspace: Option<String>,

    /// デプロイするコンテナイメージ
    pub image: Option<String>,

    pub deploy: DeployConfig,

    pub release: Option<ReleaseConfig>,
}

/// `deploy { ... }` ブロック
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    pub region: Option<String>,
    pub role_arn: Option<String>,
    /// MB（0 または未指定でデフォルト）
    pub memory: Option<i64>,
    /// 秒（0 または未指定でデフォルト）
    pub timeout: Option<i64>,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub efs: Option<EfsConfig>,
    /// 設定されている場合はデプロイ直後にトリガーも作成する
    pub event_source: Option<String>,
    /// 差分がなくても設定更新を常に発行する
    pub always_update_config: bool,
}

/// `efs { ... }` ブロック
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EfsConfig {
    pub access_point_arn: Option<String>,
    pub mount_path: Option<String>,
}

/// `release { ... }` ブロック
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseConfig {
    pub region: Option<String>,
    pub event_bus: Option<String>,
    pub event_source: Option<String>,
    pub url: Option<String>,
}

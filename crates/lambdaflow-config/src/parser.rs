//! KDLパーサー
//!
//! lambdaflow.kdl をパースして [`ProjectConfig`] を生成します。

use crate::error::{ConfigError, Result};
use crate::model::{DeployConfig, EfsConfig, ProjectConfig, ReleaseConfig};
use kdl::{KdlDocument, KdlNode};
use std::fs;
use std::path::Path;

/// KDLファイルをパース
pub fn parse_config_file<P: AsRef<Path>>(path: P) -> Result<ProjectConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Parsing config file: {}", path.display());
    parse_config_str(&content)
}

/// KDL文字列をパース
pub fn parse_config_str(content: &str) -> Result<ProjectConfig> {
    let doc: KdlDocument = content.parse()?;
    let mut config = ProjectConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "app" => config.app = string_arg(node),
            "workspace" => config.workspace = string_arg(node),
            "image" => config.image = string_arg(node),
            "deploy" => config.deploy = parse_deploy(node)?,
            "release" => config.release = Some(parse_release(node)?),
            other => {
                tracing::warn!("Unknown top-level node ignored: {}", other);
            }
        }
    }

    Ok(config)
}

fn parse_deploy(node: &KdlNode) -> Result<DeployConfig> {
    let mut deploy = DeployConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "region" => deploy.region = string_arg(child),
                "role_arn" | "role-arn" => deploy.role_arn = string_arg(child),
                "memory" => deploy.memory = int_arg(child)?,
                "timeout" => deploy.timeout = int_arg(child)?,
                // 複数のIDを引数として受け取る
                "subnet_ids" | "subnet-ids" => deploy.subnet_ids = string_args(child),
                "security_group_ids" | "security-group-ids" => {
                    deploy.security_group_ids = string_args(child)
                }
                "efs" => deploy.efs = Some(parse_efs(child)),
                "event_source" | "event-source" => deploy.event_source = string_arg(child),
                "always_update_config" | "always-update-config" => {
                    deploy.always_update_config = bool_arg(child).unwrap_or(true)
                }
                other => {
                    return Err(ConfigError::InvalidConfig(format!(
                        "deploy: 未知の設定 '{}'",
                        other
                    )));
                }
            }
        }
    }

    Ok(deploy)
}

fn parse_efs(node: &KdlNode) -> EfsConfig {
    let mut efs = EfsConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "access_point_arn" | "access-point-arn" => {
                    efs.access_point_arn = string_arg(child)
                }
                "mount_path" | "mount-path" => efs.mount_path = string_arg(child),
                _ => {}
            }
        }
    }

    efs
}

fn parse_release(node: &KdlNode) -> Result<ReleaseConfig> {
    let mut release = ReleaseConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "region" => release.region = string_arg(child),
                "event_bus" | "event-bus" => release.event_bus = string_arg(child),
                "event_source" | "event-source" => release.event_source = string_arg(child),
                "url" => release.url = string_arg(child),
                other => {
                    return Err(ConfigError::InvalidConfig(format!(
                        "release: 未知の設定 '{}'",
                        other
                    )));
                }
            }
        }
    }

    Ok(release)
}

fn string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string().map(|s| s.to_string()))
        .collect()
}

fn int_arg(node: &KdlNode) -> Result<Option<i64>> {
    let Some(value) = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
    else {
        return Ok(None);
    };

    let int = value.as_integer().ok_or_else(|| {
        ConfigError::InvalidConfig(format!(
            "{} は整数で指定してください",
            node.name().value()
        ))
    })?;

    i64::try_from(int).map(Some).map_err(|_| {
        ConfigError::InvalidConfig(format!("{} の値が大きすぎます", node.name().value()))
    })
}

fn bool_arg(node: &KdlNode) -> Option<bool> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_bool())
}

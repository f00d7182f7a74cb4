//! Desired spec, remote state and the records produced by reconciliation

use crate::error::{AwsError, Result};
use lambdaflow_cloud::RetryPolicy;
use lambdaflow_config::{DeployConfig, ReleaseConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REGION: &str = "eu-west-1";

/// The default amount of memory given to the function, 256MB
pub const DEFAULT_MEMORY_MB: i32 = 256;

/// How long the function may run before it is terminated
pub const DEFAULT_TIMEOUT_SECS: i32 = 60;

pub const DEFAULT_EVENT_BUS: &str = "default";

/// Environment tag used when no workspace is known
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Network placement of a function
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcConfig {
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
}

impl VpcConfig {
    pub fn is_empty(&self) -> bool {
        self.subnet_ids.is_empty() && self.security_group_ids.is_empty()
    }

    /// Order-insensitive comparison
    pub fn same_placement(&self, other: &VpcConfig) -> bool {
        fn sorted(ids: &[String]) -> Vec<&str> {
            let mut ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        }
        sorted(&self.subnet_ids) == sorted(&other.subnet_ids)
            && sorted(&self.security_group_ids) == sorted(&other.security_group_ids)
    }
}

/// EFS access point mounted into the function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemMount {
    pub access_point_arn: String,
    pub local_mount_path: String,
}

/// When the update path issues a configuration update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Only when memory, timeout or network placement drifted
    #[default]
    OnDrift,
    /// On every run, regardless of drift
    Always,
}

/// Fully defaulted desired function, built once per reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredFunctionSpec {
    pub region: String,
    pub role_arn: String,
    pub memory_mb: i32,
    pub timeout_secs: i32,
    pub vpc: VpcConfig,
    pub file_system: Option<FileSystemMount>,
    pub event_source: Option<String>,
    /// Value of the `lambdaflow.env` tag
    pub environment: String,
    pub update_policy: UpdatePolicy,
}

impl DesiredFunctionSpec {
    /// Apply defaults to a parsed `deploy` block
    pub fn resolve(config: &DeployConfig, workspace: Option<&str>) -> Result<Self> {
        let role_arn = config
            .role_arn
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| AwsError::InvalidConfig("deploy.role-arn is required".to_string()))?;

        let file_system = match &config.efs {
            None => None,
            Some(efs) => match (&efs.access_point_arn, &efs.mount_path) {
                (Some(arn), Some(path)) => Some(FileSystemMount {
                    access_point_arn: arn.clone(),
                    local_mount_path: path.clone(),
                }),
                (None, None) => None,
                _ => {
                    return Err(AwsError::InvalidConfig(
                        "deploy.efs needs both access-point-arn and mount-path".to_string(),
                    ));
                }
            },
        };

        Ok(Self {
            region: non_empty_or(config.region.as_deref(), DEFAULT_REGION),
            role_arn,
            memory_mb: positive_or("memory", config.memory, DEFAULT_MEMORY_MB)?,
            timeout_secs: positive_or("timeout", config.timeout, DEFAULT_TIMEOUT_SECS)?,
            vpc: VpcConfig {
                subnet_ids: config.subnet_ids.clone(),
                security_group_ids: config.security_group_ids.clone(),
            },
            file_system,
            event_source: config.event_source.clone().filter(|s| !s.is_empty()),
            environment: non_empty_or(workspace, DEFAULT_ENVIRONMENT),
            update_policy: if config.always_update_config {
                UpdatePolicy::Always
            } else {
                UpdatePolicy::OnDrift
            },
        })
    }
}

fn non_empty_or(value: Option<&str>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// `0` or unset falls back to the default
fn positive_or(field: &str, value: Option<i64>, default: i32) -> Result<i32> {
    match value {
        None | Some(0) => Ok(default),
        Some(v) if v < 0 => Err(AwsError::InvalidConfig(format!(
            "deploy.{} must not be negative (got {})",
            field, v
        ))),
        Some(v) => i32::try_from(v)
            .map_err(|_| AwsError::InvalidConfig(format!("deploy.{} is too large ({})", field, v))),
    }
}

/// Configuration of an existing remote function, fetched each run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFunctionState {
    pub function_arn: String,
    pub memory_mb: i32,
    pub timeout_secs: i32,
    pub vpc: VpcConfig,
}

impl RemoteFunctionState {
    /// Fields of `desired` that differ from the remote configuration
    pub fn diff(&self, desired: &DesiredFunctionSpec) -> ConfigDelta {
        ConfigDelta {
            memory_mb: (self.memory_mb != desired.memory_mb).then_some(desired.memory_mb),
            timeout_secs: (self.timeout_secs != desired.timeout_secs)
                .then_some(desired.timeout_secs),
            vpc: (!self.vpc.same_placement(&desired.vpc)).then(|| desired.vpc.clone()),
        }
    }
}

/// Configuration update to send; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDelta {
    pub memory_mb: Option<i32>,
    pub timeout_secs: Option<i32>,
    pub vpc: Option<VpcConfig>,
}

impl ConfigDelta {
    /// Every managed field, drift or not
    pub fn full(desired: &DesiredFunctionSpec) -> Self {
        Self {
            memory_mb: Some(desired.memory_mb),
            timeout_secs: Some(desired.timeout_secs),
            vpc: Some(desired.vpc.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.memory_mb.is_none() && self.timeout_secs.is_none() && self.vpc.is_none()
    }
}

/// A published, immutable function version
///
/// `ver_arn` and `version` are only ever set together, after a successful
/// publish. An empty `version` means nothing was published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub region: String,
    /// Unqualified ARN of the mutable function (`$LATEST`)
    pub func_arn: String,
    /// Qualified ARN of the published version
    pub ver_arn: String,
    pub version: String,
}

impl Deployment {
    pub fn has_version(&self) -> bool {
        !self.version.is_empty()
    }
}

/// An EventBridge rule bound to a published version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub event_source: String,
    pub event_bus: String,
    /// Version ARN the rule invokes
    pub function_arn: String,
    pub rule_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Release {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Fully defaulted `release` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSettings {
    pub region: String,
    pub event_bus: String,
    pub event_source: String,
    pub url: Option<String>,
}

impl ReleaseSettings {
    pub fn resolve(config: &ReleaseConfig, fallback_region: &str) -> Result<Self> {
        let event_source = config
            .event_source
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AwsError::InvalidConfig("release.event-source is required".to_string())
            })?;

        Ok(Self {
            region: non_empty_or(config.region.as_deref(), fallback_region),
            event_bus: non_empty_or(config.event_bus.as_deref(), DEFAULT_EVENT_BUS),
            event_source,
            url: config.url.clone().filter(|u| !u.is_empty()),
        })
    }
}

/// Delays and retry budgets used by the reconcilers
#[derive(Debug, Clone, PartialEq)]
pub struct Timings {
    /// Wait before the first publish attempt; the image is never ready right away
    pub settle_delay: Duration,
    /// Create-function: IAM role propagation
    pub create: RetryPolicy,
    /// Update-function-code right after a configuration update
    pub update_code: RetryPolicy,
    /// Publish-version while the function is still updating
    pub publish: RetryPolicy,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            create: RetryPolicy::fixed(30, Duration::from_secs(2)),
            update_code: RetryPolicy::fixed(30, Duration::from_secs(1)),
            publish: RetryPolicy::fixed(30, Duration::from_secs(1)),
        }
    }
}

impl Timings {
    /// Same budgets, no waiting
    pub fn immediate() -> Self {
        let defaults = Self::default();
        Self {
            settle_delay: Duration::ZERO,
            create: RetryPolicy::immediate(defaults.create.max_attempts),
            update_code: RetryPolicy::immediate(defaults.update_code.max_attempts),
            publish: RetryPolicy::immediate(defaults.publish.max_attempts),
        }
    }
}

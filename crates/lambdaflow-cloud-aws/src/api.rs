//! Remote API seams
//!
//! The reconcilers only talk to Lambda and EventBridge through these traits.
//! `sdk.rs` implements them over the AWS SDK; tests substitute in-memory
//! fakes.

use crate::model::{ConfigDelta, FileSystemMount, RemoteFunctionState, VpcConfig};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Lambda error codes that signal a busy or already-taken resource
const CONFLICT_CODES: &[&str] = &[
    "ResourceConflictException",
    "ConcurrentModificationException",
];

const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException"];

/// Classification of a platform error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The resource is mid-update or the name is already taken
    ResourceConflict,
    /// The target does not exist
    ResourceNotFound,
    Other,
}

/// Error returned by a remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// Platform error code (e.g. `ResourceConflictException`)
    pub code: Option<String>,
    pub message: String,
}

impl ApiError {
    /// Classify a platform error code
    pub fn from_code(code: Option<&str>, message: impl Into<String>) -> Self {
        let kind = match code {
            Some(c) if CONFLICT_CODES.contains(&c) => ApiErrorKind::ResourceConflict,
            Some(c) if NOT_FOUND_CODES.contains(&c) => ApiErrorKind::ResourceNotFound,
            _ => ApiErrorKind::Other,
        };
        Self {
            kind,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::from_code(Some("ResourceConflictException"), message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_code(Some("ResourceNotFoundException"), message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::from_code(None, message)
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ApiErrorKind::ResourceConflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::ResourceNotFound
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// ============ Lambda ============

/// Input for create-function
#[derive(Debug, Clone, PartialEq)]
pub struct CreateFunctionRequest {
    pub function_name: String,
    pub description: String,
    pub role_arn: String,
    pub memory_mb: i32,
    pub timeout_secs: i32,
    pub image_uri: String,
    pub vpc: VpcConfig,
    pub file_system: Option<FileSystemMount>,
    pub tags: BTreeMap<String, String>,
}

/// Result of publish-version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    /// Qualified ARN (`...:function:<name>:<version>`)
    pub version_arn: String,
    pub version: String,
}

/// Resource-policy statement for add-permission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatement {
    pub statement_id: String,
    /// Function name or qualified ARN the statement applies to
    pub function_name: String,
    pub action: String,
    pub principal: String,
    pub source_arn: String,
}

#[async_trait]
pub trait LambdaApi: Send + Sync {
    /// Fetch the function; `ResourceNotFound` when it does not exist
    async fn get_function(&self, function_name: &str) -> ApiResult<RemoteFunctionState>;

    /// Create the function, returning its ARN
    async fn create_function(&self, request: &CreateFunctionRequest) -> ApiResult<String>;

    async fn update_function_configuration(
        &self,
        function_name: &str,
        delta: &ConfigDelta,
    ) -> ApiResult<()>;

    /// Point the function at a new image, returning the function ARN
    async fn update_function_code(&self, function_name: &str, image_uri: &str)
    -> ApiResult<String>;

    async fn publish_version(&self, function_name: &str) -> ApiResult<PublishedVersion>;

    /// Delete the function, or only one version when `qualifier` is set
    async fn delete_function(&self, function_name: &str, qualifier: Option<&str>)
    -> ApiResult<()>;

    async fn add_permission(&self, statement: &PermissionStatement) -> ApiResult<()>;
}

// ============ EventBridge ============

/// Input for put-rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRuleRequest {
    pub name: String,
    pub event_pattern: String,
    pub event_bus: String,
    pub enabled: bool,
}

/// Rule target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTarget {
    pub id: String,
    pub arn: String,
    /// JSONPath projection of the incoming event
    pub input_path: Option<String>,
}

#[async_trait]
pub trait EventBusApi: Send + Sync {
    /// Create or replace a rule, returning its ARN
    async fn put_rule(&self, request: &PutRuleRequest) -> ApiResult<String>;

    /// Create or replace targets of a rule
    async fn put_targets(&self, rule: &str, event_bus: &str, targets: &[RuleTarget])
    -> ApiResult<()>;

    async fn remove_targets(&self, rule: &str, event_bus: &str, ids: &[String]) -> ApiResult<()>;

    async fn delete_rule(&self, name: &str, event_bus: &str) -> ApiResult<()>;
}

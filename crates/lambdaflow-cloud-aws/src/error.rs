//! AWS provider error types

use crate::api::ApiError;
use lambdaflow_cloud::RetryError;
use thiserror::Error;

/// Errors returned by the reconcilers, one variant per phase
#[derive(Error, Debug)]
pub enum AwsError {
    #[error("Unable to connect to AWS in region {region}: {message}")]
    Connect { region: String, message: String },

    #[error("Unable to read Lambda function {function}: {source}")]
    Read {
        function: String,
        #[source]
        source: ApiError,
    },

    #[error("Unable to create Lambda function {function}: {source}")]
    Create {
        function: String,
        #[source]
        source: ApiError,
    },

    #[error("Unable to update function configuration of {function}: {source}")]
    UpdateConfiguration {
        function: String,
        #[source]
        source: ApiError,
    },

    #[error("Unable to update function code of {function}: {source}")]
    UpdateCode {
        function: String,
        #[source]
        source: ApiError,
    },

    #[error("Unable to publish a version of {function}: {source}")]
    Publish {
        function: String,
        #[source]
        source: ApiError,
    },

    #[error("Unable to bind EventBridge rule {rule} ({step}): {source}")]
    Bind {
        rule: String,
        step: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("Unable to delete {resource}: {source}")]
    Delete {
        resource: String,
        #[source]
        source: ApiError,
    },

    #[error("Resource not found: {resource}")]
    ResourceNotFound {
        resource: String,
        #[source]
        source: ApiError,
    },

    #[error("{operation} timed out after {attempts} attempts")]
    TimedOut { operation: String, attempts: u32 },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cloud error: {0}")]
    Cloud(#[from] lambdaflow_cloud::CloudError),
}

impl AwsError {
    /// Underlying platform error, if the failure came from a remote call
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            AwsError::Read { source, .. }
            | AwsError::Create { source, .. }
            | AwsError::UpdateConfiguration { source, .. }
            | AwsError::UpdateCode { source, .. }
            | AwsError::Publish { source, .. }
            | AwsError::Bind { source, .. }
            | AwsError::Delete { source, .. }
            | AwsError::ResourceNotFound { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the platform reported a busy/conflict state
    pub fn is_retryable(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_conflict)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AwsError::TimedOut { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AwsError::Cancelled(_))
    }

    /// Map a finished retry loop onto the phase error produced by `wrap`
    pub(crate) fn from_retry(
        operation: &str,
        err: RetryError<ApiError>,
        wrap: impl FnOnce(ApiError) -> AwsError,
    ) -> Self {
        match err {
            RetryError::Fatal(source) => wrap(source),
            RetryError::Exhausted { attempts, last } => {
                if let Some(last) = last {
                    tracing::warn!("{} gave up after {} attempts: {}", operation, attempts, last);
                }
                AwsError::TimedOut {
                    operation: operation.to_string(),
                    attempts,
                }
            }
            RetryError::Cancelled => AwsError::Cancelled(operation.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;

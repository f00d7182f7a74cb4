//! AWS provider for LambdaFlow
//!
//! Deploys a container-image Lambda function, publishes immutable versions
//! of it and wires an EventBridge rule to the published version.
//!
//! ```text
//! DesiredFunctionSpec ─▶ FunctionReconciler ─▶ Deployment
//!                                                  │
//!           ReleaseSettings ─▶ TriggerReconciler ◀─┘ ─▶ Release
//! ```
//!
//! Remote calls go through the [`LambdaApi`] and [`EventBusApi`] traits;
//! [`AwsSessionProvider`] backs them with the AWS SDK and the default
//! credential chain.

pub mod api;
pub mod error;
pub mod function;
pub mod model;
pub mod pipeline;
pub mod sdk;
pub mod session;
pub mod teardown;
pub mod trigger;

pub use api::{
    ApiError, ApiErrorKind, ApiResult, CreateFunctionRequest, EventBusApi, LambdaApi,
    PermissionStatement, PublishedVersion, PutRuleRequest, RuleTarget,
};
pub use error::{AwsError, Result};
pub use function::{FunctionReconciler, FunctionRequest};
pub use model::{
    ConfigDelta, DEFAULT_EVENT_BUS, DEFAULT_REGION, Deployment, DesiredFunctionSpec,
    FileSystemMount, Release, ReleaseSettings, RemoteFunctionState, Timings, UpdatePolicy,
    VpcConfig,
};
pub use pipeline::{DeployOutcome, Pipeline};
pub use session::{AwsSessionProvider, Session, SessionProvider};
pub use teardown::Teardown;
pub use trigger::{BindRequest, PermissionOutcome, TriggerReconciler};

/// Record kinds used in the local state file
pub mod record {
    pub const DEPLOYMENT: &str = "deployment";
    pub const RELEASE: &str = "release";
}

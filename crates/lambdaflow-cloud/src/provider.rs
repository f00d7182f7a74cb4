//! Component trait definition

use crate::progress::{NoopReporter, Reporter};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one managed platform component
///
/// Each component (function, trigger, ...) converges one remote resource kind
/// to a desired value and produces a record that later calls (release,
/// rollback, teardown) receive verbatim.
#[async_trait]
pub trait Component: Send + Sync {
    /// Desired state handed to [`Component::apply`]
    type Desired: Send + Sync;

    /// Record produced on success and consumed by [`Component::destroy`]
    type Output: Serialize + DeserializeOwned + Send + Sync;

    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the component name (e.g., "lambda-function")
    fn name(&self) -> &str;

    /// Returns the component display name for UI
    fn display_name(&self) -> &str;

    /// Converge the remote resource to `desired`
    async fn apply(
        &self,
        ctx: &ReconcileContext,
        desired: &Self::Desired,
    ) -> Result<Self::Output, Self::Error>;

    /// Remove what `apply` produced
    async fn destroy(
        &self,
        ctx: &ReconcileContext,
        output: &Self::Output,
    ) -> Result<(), Self::Error>;
}

/// Identity of the application being reconciled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Application name, used as function name, rule name and target id
    pub app: String,

    /// Workspace the application is deployed into
    pub workspace: Option<String>,
}

impl Source {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            workspace: None,
        }
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }
}

/// Per-call context shared by every component in one reconciliation
#[derive(Clone)]
pub struct ReconcileContext {
    pub source: Source,
    pub reporter: Arc<dyn Reporter>,
    pub cancel: CancellationToken,
}

impl ReconcileContext {
    pub fn new(source: Source, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            source,
            reporter,
            cancel: CancellationToken::new(),
        }
    }

    /// Context without progress output
    pub fn quiet(source: Source) -> Self {
        Self::new(source, Arc::new(NoopReporter))
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn app(&self) -> &str {
        &self.source.app
    }
}

impl std::fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileContext")
            .field("source", &self.source)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

//! LambdaFlow reconciliation plumbing
//!
//! This crate holds the platform-neutral pieces shared by the provider
//! crates: the component trait, bounded retry loops, progress reporting,
//! dry-run plans and the local record store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 LambdaFlow CLI                   │
//! │     (deploy / release / destroy / decommission)  │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               lambdaflow-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │         trait Component { ... }           │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐    │
//! │  │  Retry   │ │ Progress │ │ Record store │    │
//! │  └──────────┘ └──────────┘ └──────────────┘    │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │             lambdaflow-cloud-aws                 │
//! │   function reconciler · trigger reconciler       │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod progress;
pub mod provider;
pub mod retry;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use progress::{
    NoopReporter, ProgressEvent, RecordingReporter, Reporter, Status, Step, StepOutcome,
    TerminalReporter,
};
pub use provider::{Component, ReconcileContext, Source};
pub use retry::{RetryError, RetryPolicy, pause, retry};
pub use state::{GlobalState, StateLock, StateManager, StoredRecord};

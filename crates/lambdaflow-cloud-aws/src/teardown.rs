//! Teardown of versions, triggers and functions
//!
//! Each procedure can be called on its own and re-run after a partial
//! failure. Trigger and function removal treat "already gone" as success;
//! version removal does not, since a missing version usually means the
//! record is stale.

use crate::api::{ApiError, EventBusApi, LambdaApi};
use crate::error::{AwsError, Result};
use crate::model::Deployment;
use lambdaflow_cloud::{ReconcileContext, Status, StepOutcome};
use std::sync::Arc;

fn ensure_running(ctx: &ReconcileContext, operation: &str) -> Result<()> {
    if ctx.cancel.is_cancelled() {
        return Err(AwsError::Cancelled(operation.to_string()));
    }
    Ok(())
}

/// Delete the published version recorded in `deployment`
///
/// A deployment that never reached a published version is skipped without
/// any remote call.
pub async fn destroy_version(
    lambda: &dyn LambdaApi,
    ctx: &ReconcileContext,
    deployment: &Deployment,
) -> Result<()> {
    if !deployment.has_version() {
        tracing::debug!(function = %deployment.func_arn, "No published version to delete");
        return Ok(());
    }
    ensure_running(ctx, "delete function version")?;

    let mut status = ctx.reporter.status();
    status.update(format!("Deleting Lambda function version {}...", deployment.version));

    let result = lambda
        .delete_function(&deployment.func_arn, Some(&deployment.version))
        .await;

    let resource = format!("Lambda function version {}", deployment.ver_arn);
    match result {
        Ok(()) => {
            tracing::info!(version = %deployment.version, "Deleted function version");
            status.step(
                StepOutcome::Ok,
                format!("Deleted Lambda function version {}", deployment.version),
            );
            Ok(())
        }
        Err(source) if source.is_not_found() => {
            status.step(StepOutcome::Error, format!("{} not found", resource));
            Err(AwsError::ResourceNotFound { resource, source })
        }
        Err(source) => {
            status.step(StepOutcome::Error, format!("Failed to delete {}", resource));
            Err(AwsError::Delete { resource, source })
        }
    }
}

/// Remove the rule target and the rule named after the application
pub async fn destroy_trigger(
    events: &dyn EventBusApi,
    ctx: &ReconcileContext,
    event_bus: &str,
) -> Result<()> {
    ensure_running(ctx, "delete event rule")?;
    let app = ctx.app();
    let mut status = ctx.reporter.status();

    status.update("Removing EventBridge rule target...");
    let result = events
        .remove_targets(app, event_bus, &[app.to_string()])
        .await;
    tolerate_missing(
        &mut status,
        result,
        format!("EventBridge target {}", app),
        "Removed EventBridge rule target",
    )?;

    status.update("Deleting EventBridge rule...");
    let result = events.delete_rule(app, event_bus).await;
    tolerate_missing(
        &mut status,
        result,
        format!("EventBridge rule {}", app),
        "Deleted EventBridge rule",
    )
}

/// Delete the function itself, every remaining version included
pub async fn destroy_function(lambda: &dyn LambdaApi, ctx: &ReconcileContext) -> Result<()> {
    ensure_running(ctx, "delete function")?;
    let app = ctx.app();
    let mut status = ctx.reporter.status();

    status.update("Deleting Lambda function...");
    let result = lambda.delete_function(app, None).await;
    tolerate_missing(
        &mut status,
        result,
        format!("Lambda function {}", app),
        "Deleted Lambda function",
    )
}

fn tolerate_missing(
    status: &mut Status,
    result: std::result::Result<(), ApiError>,
    resource: String,
    done_label: &str,
) -> Result<()> {
    match result {
        Ok(()) => {
            tracing::info!("{}", done_label);
            status.step(StepOutcome::Ok, done_label);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            tracing::warn!("{} does not exist, skipping: {}", resource, e);
            status.step(StepOutcome::Warning, format!("{} already removed", resource));
            Ok(())
        }
        Err(source) => {
            status.step(StepOutcome::Error, format!("Failed to delete {}", resource));
            Err(AwsError::Delete { resource, source })
        }
    }
}

/// The three teardown procedures over one session
#[derive(Clone)]
pub struct Teardown {
    lambda: Arc<dyn LambdaApi>,
    events: Arc<dyn EventBusApi>,
}

impl Teardown {
    pub fn new(lambda: Arc<dyn LambdaApi>, events: Arc<dyn EventBusApi>) -> Self {
        Self { lambda, events }
    }

    pub async fn destroy_version(
        &self,
        ctx: &ReconcileContext,
        deployment: &Deployment,
    ) -> Result<()> {
        destroy_version(&*self.lambda, ctx, deployment).await
    }

    pub async fn destroy_trigger(&self, ctx: &ReconcileContext, event_bus: &str) -> Result<()> {
        destroy_trigger(&*self.events, ctx, event_bus).await
    }

    pub async fn destroy_function(&self, ctx: &ReconcileContext) -> Result<()> {
        destroy_function(&*self.lambda, ctx).await
    }
}

//! EventBridge trigger reconciler
//!
//! Binds a rule matching one event source to a published function version.
//! Every step is an upsert, so binding the same version twice leaves one
//! rule with one target.

use crate::api::{EventBusApi, LambdaApi, PermissionStatement, PutRuleRequest, RuleTarget};
use crate::error::{AwsError, Result};
use crate::model::{DEFAULT_EVENT_BUS, Deployment, Release, ReleaseSettings};
use crate::teardown;
use async_trait::async_trait;
use lambdaflow_cloud::{Action, Component, ReconcileContext};
use serde_json::json;
use std::sync::Arc;

pub const RESOURCE_TYPE: &str = "eventbridge-rule";

const EVENTS_PRINCIPAL: &str = "events.amazonaws.com";

const MAX_STATEMENT_ID_LEN: usize = 100;

/// Lambda's answer to adding a statement id that already exists
const DUPLICATE_STATEMENT_CODE: &str = "ResourceConflictException";
const INVOKE_ACTION: &str = "lambda:InvokeFunction";

/// Only the event payload is handed to the function
const TARGET_INPUT_PATH: &str = "$.detail";

/// Desired input of [`TriggerReconciler`] as a [`Component`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRequest {
    pub event_source: String,
    pub event_bus: String,
    /// Version ARN the rule invokes
    pub function_arn: String,
    pub url: Option<String>,
}

impl BindRequest {
    pub fn for_release(settings: &ReleaseSettings, deployment: &Deployment) -> Self {
        Self {
            event_source: settings.event_source.clone(),
            event_bus: settings.event_bus.clone(),
            function_arn: deployment.ver_arn.clone(),
            url: settings.url.clone(),
        }
    }

    /// Binding made right after a deploy, on the default bus
    pub fn on_default_bus(event_source: impl Into<String>, deployment: &Deployment) -> Self {
        Self {
            event_source: event_source.into(),
            event_bus: DEFAULT_EVENT_BUS.to_string(),
            function_arn: deployment.ver_arn.clone(),
            url: None,
        }
    }
}

/// Result of the add-permission step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    /// A statement with the same id already exists
    AlreadyGranted,
}

/// `{"source": ["<event_source>"]}`
pub fn event_pattern(event_source: &str) -> String {
    json!({ "source": [event_source] }).to_string()
}

/// Statement id for the rule `app` on `event_bus`
///
/// The rule ARN is derived from the bus and the rule name, so a statement id
/// naming both always carries the same source ARN. Characters Lambda rejects
/// in statement ids are replaced with `-` and the id is cut to Lambda's
/// length limit.
pub fn statement_id(app: &str, event_bus: &str) -> String {
    format!("lambda-eventbridge-{}-{}", app, event_bus)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .take(MAX_STATEMENT_ID_LEN)
        .collect()
}

pub struct TriggerReconciler {
    lambda: Arc<dyn LambdaApi>,
    events: Arc<dyn EventBusApi>,
}

impl TriggerReconciler {
    pub fn new(lambda: Arc<dyn LambdaApi>, events: Arc<dyn EventBusApi>) -> Self {
        Self { lambda, events }
    }

    /// Upsert the rule, grant it invoke permission and point it at the version
    pub async fn bind(&self, ctx: &ReconcileContext, request: &BindRequest) -> Result<Release> {
        let app = ctx.app();
        if ctx.cancel.is_cancelled() {
            return Err(AwsError::Cancelled("bind event rule".to_string()));
        }

        let step = ctx.reporter.add_step("Creating EventBridge rule");
        let rule_arn = self
            .events
            .put_rule(&PutRuleRequest {
                name: app.to_string(),
                event_pattern: event_pattern(&request.event_source),
                event_bus: request.event_bus.clone(),
                enabled: true,
            })
            .await
            .map_err(|source| AwsError::Bind {
                rule: app.to_string(),
                step: "put rule",
                source,
            })?;
        step.done();

        let mut step = ctx.reporter.add_step("Granting invoke permission");
        if self
            .grant_invoke(app, &request.event_bus, &request.function_arn, &rule_arn)
            .await?
            == PermissionOutcome::AlreadyGranted
        {
            step.update("Invoke permission already granted");
        }
        step.done();

        let step = ctx.reporter.add_step("Adding rule target");
        self.events
            .put_targets(
                app,
                &request.event_bus,
                &[RuleTarget {
                    id: app.to_string(),
                    arn: request.function_arn.clone(),
                    input_path: Some(TARGET_INPUT_PATH.to_string()),
                }],
            )
            .await
            .map_err(|source| AwsError::Bind {
                rule: app.to_string(),
                step: "put targets",
                source,
            })?;
        step.done();

        tracing::info!(rule = app, bus = %request.event_bus, "Bound event rule");
        Ok(Release {
            event_source: request.event_source.clone(),
            event_bus: request.event_bus.clone(),
            function_arn: request.function_arn.clone(),
            rule_arn,
            url: request.url.clone(),
        })
    }

    /// Allow the rule to invoke the version
    ///
    /// The statement id names the application and the bus, so a duplicate
    /// statement on this version is one an earlier bind of the same rule
    /// added. Other conflicts (a concurrent policy edit) stay errors.
    pub async fn grant_invoke(
        &self,
        app: &str,
        event_bus: &str,
        function_arn: &str,
        rule_arn: &str,
    ) -> Result<PermissionOutcome> {
        let statement = PermissionStatement {
            statement_id: statement_id(app, event_bus),
            function_name: function_arn.to_string(),
            action: INVOKE_ACTION.to_string(),
            principal: EVENTS_PRINCIPAL.to_string(),
            source_arn: rule_arn.to_string(),
        };

        match self.lambda.add_permission(&statement).await {
            Ok(()) => Ok(PermissionOutcome::Granted),
            Err(e) if e.has_code(DUPLICATE_STATEMENT_CODE) => {
                tracing::info!(
                    statement_id = %statement.statement_id,
                    "Invoke permission already present: {}",
                    e
                );
                Ok(PermissionOutcome::AlreadyGranted)
            }
            Err(source) => Err(AwsError::Bind {
                rule: app.to_string(),
                step: "add permission",
                source,
            }),
        }
    }

    /// What [`TriggerReconciler::bind`] would do
    pub fn plan(&self, app: &str, request: &BindRequest) -> Action {
        Action::update(RESOURCE_TYPE, app, "Upsert rule and point it at the new version")
            .with_detail("event_bus", json!(request.event_bus))
            .with_detail("event_pattern", json!(event_pattern(&request.event_source)))
    }
}

#[async_trait]
impl Component for TriggerReconciler {
    type Desired = BindRequest;
    type Output = Release;
    type Error = AwsError;

    fn name(&self) -> &str {
        RESOURCE_TYPE
    }

    fn display_name(&self) -> &str {
        "EventBridge rule"
    }

    async fn apply(&self, ctx: &ReconcileContext, desired: &BindRequest) -> Result<Release> {
        self.bind(ctx, desired).await
    }

    async fn destroy(&self, ctx: &ReconcileContext, output: &Release) -> Result<()> {
        teardown::destroy_trigger(&*self.events, ctx, &output.event_bus).await
    }
}

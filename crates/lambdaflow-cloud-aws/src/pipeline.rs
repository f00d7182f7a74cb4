//! Orchestration of the function and trigger components
//!
//! A [`Pipeline`] owns no remote state. Each call takes the records produced
//! by earlier calls (a [`Deployment`], a [`Release`]) and hands them to the
//! components unchanged.
//!
//! An application has one active event rule. Binding on a bus other than the
//! one in the previous [`Release`] removes the old rule first, so teardown
//! only ever has one bus to clean up.

use crate::error::{AwsError, Result};
use crate::function::{FunctionReconciler, FunctionRequest};
use crate::model::{
    DEFAULT_EVENT_BUS, Deployment, DesiredFunctionSpec, Release, ReleaseSettings, Timings,
};
use crate::session::{Session, SessionProvider};
use crate::teardown::Teardown;
use crate::trigger::{BindRequest, TriggerReconciler};
use lambdaflow_cloud::{Action, Component, Plan, ReconcileContext};
use std::time::Instant;

/// Outcome of [`Pipeline::deploy`]
///
/// The function phase has succeeded whenever this is returned, so the
/// deployment is always present even if the bind that follows failed.
#[derive(Debug)]
pub struct DeployOutcome {
    pub deployment: Deployment,
    /// Set when the deploy config names an event source
    pub release: Option<Result<Release>>,
}

pub struct Pipeline {
    session: Session,
    function: FunctionReconciler,
    trigger: TriggerReconciler,
    teardown: Teardown,
}

impl Pipeline {
    /// Open a session for `region`, reported as its own step
    pub async fn connect(
        provider: &dyn SessionProvider,
        ctx: &ReconcileContext,
        region: &str,
    ) -> Result<Self> {
        let mut step = ctx.reporter.add_step("Connecting to AWS");
        step.update(format!("Connecting to AWS ({})", region));
        let session = provider.connect(region).await?;
        step.done();
        Ok(Self::from_session(session))
    }

    pub fn from_session(session: Session) -> Self {
        Self {
            function: FunctionReconciler::new(session.lambda.clone()),
            trigger: TriggerReconciler::new(session.lambda.clone(), session.events.clone()),
            teardown: Teardown::new(session.lambda.clone(), session.events.clone()),
            session,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.function = self.function.with_timings(timings);
        self
    }

    pub fn region(&self) -> &str {
        &self.session.region
    }

    /// Converge the function, publish a version and, when an event source is
    /// set, bind it on the default bus
    ///
    /// Only a failure of the function phase is returned as `Err`.
    pub async fn deploy(
        &self,
        ctx: &ReconcileContext,
        spec: &DesiredFunctionSpec,
        image: &str,
        previous: Option<&Release>,
    ) -> Result<DeployOutcome> {
        let request = FunctionRequest {
            spec: spec.clone(),
            image: image.to_string(),
        };
        let deployment = apply_component(&self.function, ctx, &request).await?;

        let release = match &spec.event_source {
            Some(source) => {
                let bind = BindRequest::on_default_bus(source.clone(), &deployment);
                Some(self.bind(ctx, &bind, previous).await)
            }
            None => None,
        };

        Ok(DeployOutcome {
            deployment,
            release,
        })
    }

    /// Bind the configured event rule to the deployment's version
    pub async fn release(
        &self,
        ctx: &ReconcileContext,
        settings: &ReleaseSettings,
        deployment: &Deployment,
        previous: Option<&Release>,
    ) -> Result<Release> {
        if !deployment.has_version() {
            return Err(AwsError::InvalidConfig(format!(
                "deployment {} has no published version to release",
                deployment.id
            )));
        }
        let request = BindRequest::for_release(settings, deployment);
        self.bind(ctx, &request, previous).await
    }

    async fn bind(
        &self,
        ctx: &ReconcileContext,
        request: &BindRequest,
        previous: Option<&Release>,
    ) -> Result<Release> {
        if let Some(old) = previous.filter(|r| r.event_bus != request.event_bus) {
            tracing::info!(
                app = ctx.app(),
                from = %old.event_bus,
                to = %request.event_bus,
                "Moving event rule to another bus"
            );
            self.teardown.destroy_trigger(ctx, &old.event_bus).await?;
        }
        apply_component(&self.trigger, ctx, request).await
    }

    /// Remove the deployment's version and the event rule
    pub async fn rollback(
        &self,
        ctx: &ReconcileContext,
        deployment: &Deployment,
        event_bus: &str,
    ) -> Result<()> {
        tracing::info!(app = ctx.app(), version = %deployment.version, "Rolling back");
        self.function.destroy(ctx, deployment).await?;
        self.teardown.destroy_trigger(ctx, event_bus).await
    }

    /// Remove the event rule only
    pub async fn unrelease(&self, ctx: &ReconcileContext, event_bus: &str) -> Result<()> {
        tracing::info!(app = ctx.app(), bus = event_bus, "Removing release");
        self.teardown.destroy_trigger(ctx, event_bus).await
    }

    /// Remove everything: the version (if known), the rule and the function
    pub async fn decommission(
        &self,
        ctx: &ReconcileContext,
        deployment: Option<&Deployment>,
        event_bus: Option<&str>,
    ) -> Result<()> {
        tracing::info!(app = ctx.app(), "Decommissioning");
        if let Some(deployment) = deployment {
            self.teardown.destroy_version(ctx, deployment).await?;
        }
        self.teardown
            .destroy_trigger(ctx, event_bus.unwrap_or(DEFAULT_EVENT_BUS))
            .await?;
        self.teardown.destroy_function(ctx).await
    }

    /// Dry run of deploy (and release, when settings are given)
    pub async fn plan(
        &self,
        ctx: &ReconcileContext,
        spec: &DesiredFunctionSpec,
        image: &str,
        release: Option<&ReleaseSettings>,
    ) -> Result<Plan> {
        let app = ctx.app();
        let mut actions = vec![self.function.plan(app, spec, image).await?];

        // Not published yet
        let pending = Deployment::default();
        if let Some(source) = &spec.event_source {
            actions.push(
                self.trigger
                    .plan(app, &BindRequest::on_default_bus(source.clone(), &pending)),
            );
        }
        if let Some(settings) = release {
            actions.push(
                self.trigger
                    .plan(app, &BindRequest::for_release(settings, &pending)),
            );
        }

        Ok(Plan::new(actions))
    }

    /// Actions `decommission` would take
    pub fn plan_decommission(app: &str, deployment: Option<&Deployment>) -> Plan {
        let mut actions: Vec<Action> = Vec::new();
        if let Some(d) = deployment.filter(|d| d.has_version()) {
            actions.push(Action::delete(
                crate::function::RESOURCE_TYPE,
                &d.ver_arn,
                format!("Delete version {}", d.version),
            ));
        }
        actions.push(Action::delete(
            crate::trigger::RESOURCE_TYPE,
            app,
            "Remove target and delete rule",
        ));
        actions.push(Action::delete(
            crate::function::RESOURCE_TYPE,
            app,
            "Delete function",
        ));
        Plan::new(actions)
    }
}

async fn apply_component<C: Component>(
    component: &C,
    ctx: &ReconcileContext,
    desired: &C::Desired,
) -> std::result::Result<C::Output, C::Error> {
    let started = Instant::now();
    tracing::debug!(component = component.name(), "Applying");
    let result = component.apply(ctx, desired).await;
    match &result {
        Ok(_) => tracing::info!(
            component = component.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "{} reconciled",
            component.display_name()
        ),
        Err(e) => tracing::warn!(
            component = component.name(),
            "{} failed: {}",
            component.display_name(),
            e
        ),
    }
    result
}

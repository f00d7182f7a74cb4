//! Lambda function reconciler
//!
//! Converges the remote function to a [`DesiredFunctionSpec`] and publishes
//! an immutable version of it:
//!
//! 1. read the function; not-found selects the create path
//! 2. create (retrying while the execution role propagates) or update
//!    configuration and code
//! 3. wait for the function to settle
//! 4. publish a version (retrying while the function is still updating)

use crate::api::{ApiError, CreateFunctionRequest, LambdaApi, PublishedVersion};
use crate::error::{AwsError, Result};
use crate::model::{
    ConfigDelta, Deployment, DesiredFunctionSpec, RemoteFunctionState, Timings, UpdatePolicy,
};
use crate::teardown;
use async_trait::async_trait;
use lambdaflow_cloud::{Action, Component, ReconcileContext, pause, retry};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const RESOURCE_TYPE: &str = "lambda-function";

pub const TAG_APP: &str = "lambdaflow.app";
pub const TAG_ENV: &str = "lambdaflow.env";

/// Desired input of [`FunctionReconciler`] as a [`Component`]
#[derive(Debug, Clone)]
pub struct FunctionRequest {
    pub spec: DesiredFunctionSpec,
    pub image: String,
}

pub struct FunctionReconciler {
    lambda: Arc<dyn LambdaApi>,
    timings: Timings,
}

impl FunctionReconciler {
    pub fn new(lambda: Arc<dyn LambdaApi>) -> Self {
        Self {
            lambda,
            timings: Timings::default(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Current remote configuration, `None` when the function does not exist
    pub async fn read_remote(&self, app: &str) -> Result<Option<RemoteFunctionState>> {
        match self.lambda.get_function(app).await {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(source) => Err(AwsError::Read {
                function: app.to_string(),
                source,
            }),
        }
    }

    /// Create or update the function and publish a new version
    pub async fn reconcile(
        &self,
        ctx: &ReconcileContext,
        spec: &DesiredFunctionSpec,
        image: &str,
    ) -> Result<Deployment> {
        let app = ctx.app();

        let step = ctx.reporter.add_step("Reading Lambda function");
        let remote = self.read_remote(app).await?;
        step.done();

        let func_arn = match remote {
            Some(remote) => {
                tracing::info!(function = app, "Function exists, updating");
                self.update(ctx, spec, image, &remote).await?
            }
            None => {
                tracing::info!(function = app, "Function not found, creating");
                self.create(ctx, spec, image).await?
            }
        };

        let step = ctx.reporter.add_step("Waiting for Lambda function to settle");
        pause(self.timings.settle_delay, &ctx.cancel)
            .await
            .map_err(|_| AwsError::Cancelled("waiting for function to settle".to_string()))?;
        step.done();

        let published = self.publish(ctx).await?;
        tracing::info!(
            function = app,
            version = %published.version,
            "Published function version"
        );

        Ok(Deployment {
            id: uuid::Uuid::new_v4().to_string(),
            region: spec.region.clone(),
            func_arn,
            ver_arn: published.version_arn,
            version: published.version,
        })
    }

    async fn create(
        &self,
        ctx: &ReconcileContext,
        spec: &DesiredFunctionSpec,
        image: &str,
    ) -> Result<String> {
        let app = ctx.app();
        let request = create_request(app, spec, image);
        let policy = &self.timings.create;

        let mut step = ctx.reporter.add_step("Creating Lambda function");
        let lambda = &*self.lambda;
        let request = &request;
        let progress = &mut step;

        // The execution role may not be assumable yet; a name conflict never heals.
        let result = retry(
            policy,
            &ctx.cancel,
            |e: &ApiError| !e.is_conflict(),
            move |attempt| {
                if attempt > 0 {
                    progress.update(format!(
                        "Creating Lambda function (attempt {}/{})",
                        attempt + 1,
                        policy.max_attempts
                    ));
                }
                lambda.create_function(request)
            },
        )
        .await;

        let func_arn = result.map_err(|e| {
            AwsError::from_retry("create function", e, |source| AwsError::Create {
                function: app.to_string(),
                source,
            })
        })?;
        step.done();
        Ok(func_arn)
    }

    async fn update(
        &self,
        ctx: &ReconcileContext,
        spec: &DesiredFunctionSpec,
        image: &str,
        remote: &RemoteFunctionState,
    ) -> Result<String> {
        let app = ctx.app();
        let delta = match spec.update_policy {
            UpdatePolicy::Always => ConfigDelta::full(spec),
            UpdatePolicy::OnDrift => remote.diff(spec),
        };

        if delta.is_empty() {
            tracing::debug!(function = app, "Configuration unchanged");
        } else {
            let step = ctx.reporter.add_step("Updating function configuration");
            self.lambda
                .update_function_configuration(app, &delta)
                .await
                .map_err(|source| AwsError::UpdateConfiguration {
                    function: app.to_string(),
                    source,
                })?;
            step.done();
        }

        let step = ctx.reporter.add_step("Updating function code");
        let lambda = &*self.lambda;
        let result = retry(
            &self.timings.update_code,
            &ctx.cancel,
            ApiError::is_conflict,
            move |_| lambda.update_function_code(app, image),
        )
        .await;

        let func_arn = result.map_err(|e| {
            AwsError::from_retry("update function code", e, |source| AwsError::UpdateCode {
                function: app.to_string(),
                source,
            })
        })?;
        step.done();
        Ok(func_arn)
    }

    async fn publish(&self, ctx: &ReconcileContext) -> Result<PublishedVersion> {
        let app = ctx.app();
        let policy = &self.timings.publish;

        let mut step = ctx.reporter.add_step("Publishing version");
        let lambda = &*self.lambda;
        let progress = &mut step;

        let result = retry(
            policy,
            &ctx.cancel,
            ApiError::is_conflict,
            move |attempt| {
                if attempt > 0 {
                    progress.update(format!(
                        "Waiting for function to finish updating (attempt {}/{})",
                        attempt + 1,
                        policy.max_attempts
                    ));
                }
                lambda.publish_version(app)
            },
        )
        .await;

        let published = result.map_err(|e| {
            AwsError::from_retry("publish version", e, |source| AwsError::Publish {
                function: app.to_string(),
                source,
            })
        })?;
        step.done();
        Ok(published)
    }

    /// What [`FunctionReconciler::reconcile`] would do, without changing anything
    pub async fn plan(
        &self,
        app: &str,
        spec: &DesiredFunctionSpec,
        image: &str,
    ) -> Result<Action> {
        let action = match self.read_remote(app).await? {
            None => Action::create(RESOURCE_TYPE, app, "Create function and publish a version")
                .with_detail("image", json!(image))
                .with_detail("memory_mb", json!(spec.memory_mb))
                .with_detail("timeout_secs", json!(spec.timeout_secs))
                .with_detail("region", json!(spec.region)),
            Some(remote) => {
                let delta = match spec.update_policy {
                    UpdatePolicy::Always => ConfigDelta::full(spec),
                    UpdatePolicy::OnDrift => remote.diff(spec),
                };
                let description = if delta.is_empty() {
                    "Update code and publish a version"
                } else {
                    "Update configuration and code, publish a version"
                };

                let mut action = Action::update(RESOURCE_TYPE, app, description)
                    .with_detail("image", json!(image));
                if let Some(memory) = delta.memory_mb {
                    action = action.with_detail("memory_mb", json!(memory));
                }
                if let Some(timeout) = delta.timeout_secs {
                    action = action.with_detail("timeout_secs", json!(timeout));
                }
                if let Some(vpc) = &delta.vpc {
                    action = action.with_detail(
                        "vpc",
                        json!({
                            "subnet_ids": vpc.subnet_ids,
                            "security_group_ids": vpc.security_group_ids,
                        }),
                    );
                }
                action
            }
        };
        Ok(action)
    }
}

fn create_request(app: &str, spec: &DesiredFunctionSpec, image: &str) -> CreateFunctionRequest {
    let mut tags = BTreeMap::new();
    tags.insert(TAG_APP.to_string(), app.to_string());
    tags.insert(TAG_ENV.to_string(), spec.environment.clone());

    CreateFunctionRequest {
        function_name: app.to_string(),
        description: format!("lambdaflow {}", app),
        role_arn: spec.role_arn.clone(),
        memory_mb: spec.memory_mb,
        timeout_secs: spec.timeout_secs,
        image_uri: image.to_string(),
        vpc: spec.vpc.clone(),
        file_system: spec.file_system.clone(),
        tags,
    }
}

#[async_trait]
impl Component for FunctionReconciler {
    type Desired = FunctionRequest;
    type Output = Deployment;
    type Error = AwsError;

    fn name(&self) -> &str {
        RESOURCE_TYPE
    }

    fn display_name(&self) -> &str {
        "Lambda function"
    }

    async fn apply(&self, ctx: &ReconcileContext, desired: &FunctionRequest) -> Result<Deployment> {
        self.reconcile(ctx, &desired.spec, &desired.image).await
    }

    /// Removes the published version only; the function itself stays
    async fn destroy(&self, ctx: &ReconcileContext, output: &Deployment) -> Result<()> {
        teardown::destroy_version(&*self.lambda, ctx, output).await
    }
}

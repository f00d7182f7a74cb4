//! [`LambdaApi`] / [`EventBusApi`] over the AWS SDK

use crate::api::{
    ApiError, ApiResult, CreateFunctionRequest, EventBusApi, LambdaApi, PermissionStatement,
    PublishedVersion, PutRuleRequest, RuleTarget,
};
use crate::model::{ConfigDelta, RemoteFunctionState, VpcConfig};
use async_trait::async_trait;
use aws_sdk_eventbridge::types::{RuleState, Target};
use aws_sdk_lambda::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_lambda::types::{FileSystemConfig, FunctionCode, PackageType};

/// Turn an SDK failure into an [`ApiError`] keyed on the service error code
fn classify<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug + 'static,
{
    let code = err.code().map(str::to_string);
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    ApiError::from_code(code.as_deref(), message)
}

fn sdk_vpc(vpc: &VpcConfig) -> aws_sdk_lambda::types::VpcConfig {
    aws_sdk_lambda::types::VpcConfig::builder()
        .set_subnet_ids(Some(vpc.subnet_ids.clone()))
        .set_security_group_ids(Some(vpc.security_group_ids.clone()))
        .build()
}

fn missing(field: &str, operation: &str) -> ApiError {
    ApiError::other(format!("{} response did not include {}", operation, field))
}

/// Lambda client
#[derive(Debug, Clone)]
pub struct AwsLambda {
    client: aws_sdk_lambda::Client,
}

impl AwsLambda {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LambdaApi for AwsLambda {
    async fn get_function(&self, function_name: &str) -> ApiResult<RemoteFunctionState> {
        tracing::debug!(function = function_name, "GetFunction");
        let output = self
            .client
            .get_function()
            .function_name(function_name)
            .send()
            .await
            .map_err(classify)?;

        let config = output
            .configuration()
            .ok_or_else(|| missing("configuration", "GetFunction"))?;

        let vpc = config
            .vpc_config()
            .map(|v| VpcConfig {
                subnet_ids: v.subnet_ids().to_vec(),
                security_group_ids: v.security_group_ids().to_vec(),
            })
            .unwrap_or_default();

        Ok(RemoteFunctionState {
            function_arn: config
                .function_arn()
                .ok_or_else(|| missing("function ARN", "GetFunction"))?
                .to_string(),
            memory_mb: config.memory_size().unwrap_or_default(),
            timeout_secs: config.timeout().unwrap_or_default(),
            vpc,
        })
    }

    async fn create_function(&self, request: &CreateFunctionRequest) -> ApiResult<String> {
        tracing::debug!(function = %request.function_name, image = %request.image_uri, "CreateFunction");
        let mut builder = self
            .client
            .create_function()
            .function_name(&request.function_name)
            .description(&request.description)
            .role(&request.role_arn)
            .memory_size(request.memory_mb)
            .timeout(request.timeout_secs)
            .package_type(PackageType::Image)
            .code(FunctionCode::builder().image_uri(&request.image_uri).build())
            .vpc_config(sdk_vpc(&request.vpc));

        if let Some(fs) = &request.file_system {
            let config = FileSystemConfig::builder()
                .arn(&fs.access_point_arn)
                .local_mount_path(&fs.local_mount_path)
                .build()
                .map_err(|e| ApiError::other(e.to_string()))?;
            builder = builder.file_system_configs(config);
        }

        for (key, value) in &request.tags {
            builder = builder.tags(key, value);
        }

        let output = builder.send().await.map_err(classify)?;
        output
            .function_arn()
            .map(str::to_string)
            .ok_or_else(|| missing("function ARN", "CreateFunction"))
    }

    async fn update_function_configuration(
        &self,
        function_name: &str,
        delta: &ConfigDelta,
    ) -> ApiResult<()> {
        tracing::debug!(function = function_name, ?delta, "UpdateFunctionConfiguration");
        self.client
            .update_function_configuration()
            .function_name(function_name)
            .set_memory_size(delta.memory_mb)
            .set_timeout(delta.timeout_secs)
            .set_vpc_config(delta.vpc.as_ref().map(sdk_vpc))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update_function_code(
        &self,
        function_name: &str,
        image_uri: &str,
    ) -> ApiResult<String> {
        tracing::debug!(function = function_name, image = image_uri, "UpdateFunctionCode");
        let output = self
            .client
            .update_function_code()
            .function_name(function_name)
            .image_uri(image_uri)
            .send()
            .await
            .map_err(classify)?;
        output
            .function_arn()
            .map(str::to_string)
            .ok_or_else(|| missing("function ARN", "UpdateFunctionCode"))
    }

    async fn publish_version(&self, function_name: &str) -> ApiResult<PublishedVersion> {
        tracing::debug!(function = function_name, "PublishVersion");
        let output = self
            .client
            .publish_version()
            .function_name(function_name)
            .send()
            .await
            .map_err(classify)?;

        Ok(PublishedVersion {
            version_arn: output
                .function_arn()
                .ok_or_else(|| missing("function ARN", "PublishVersion"))?
                .to_string(),
            version: output
                .version()
                .ok_or_else(|| missing("version", "PublishVersion"))?
                .to_string(),
        })
    }

    async fn delete_function(
        &self,
        function_name: &str,
        qualifier: Option<&str>,
    ) -> ApiResult<()> {
        tracing::debug!(function = function_name, ?qualifier, "DeleteFunction");
        self.client
            .delete_function()
            .function_name(function_name)
            .set_qualifier(qualifier.map(str::to_string))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn add_permission(&self, statement: &PermissionStatement) -> ApiResult<()> {
        tracing::debug!(statement_id = %statement.statement_id, "AddPermission");
        self.client
            .add_permission()
            .statement_id(&statement.statement_id)
            .function_name(&statement.function_name)
            .action(&statement.action)
            .principal(&statement.principal)
            .source_arn(&statement.source_arn)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// EventBridge client
#[derive(Debug, Clone)]
pub struct AwsEventBus {
    client: aws_sdk_eventbridge::Client,
}

impl AwsEventBus {
    pub fn new(client: aws_sdk_eventbridge::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventBusApi for AwsEventBus {
    async fn put_rule(&self, request: &PutRuleRequest) -> ApiResult<String> {
        tracing::debug!(rule = %request.name, bus = %request.event_bus, "PutRule");
        let state = if request.enabled {
            RuleState::Enabled
        } else {
            RuleState::Disabled
        };

        let output = self
            .client
            .put_rule()
            .name(&request.name)
            .event_pattern(&request.event_pattern)
            .event_bus_name(&request.event_bus)
            .state(state)
            .send()
            .await
            .map_err(classify)?;

        output
            .rule_arn()
            .map(str::to_string)
            .ok_or_else(|| missing("rule ARN", "PutRule"))
    }

    async fn put_targets(
        &self,
        rule: &str,
        event_bus: &str,
        targets: &[RuleTarget],
    ) -> ApiResult<()> {
        tracing::debug!(rule, bus = event_bus, count = targets.len(), "PutTargets");
        let mut builder = self
            .client
            .put_targets()
            .rule(rule)
            .event_bus_name(event_bus);

        for target in targets {
            let target = Target::builder()
                .id(&target.id)
                .arn(&target.arn)
                .set_input_path(target.input_path.clone())
                .build()
                .map_err(|e| ApiError::other(e.to_string()))?;
            builder = builder.targets(target);
        }

        let output = builder.send().await.map_err(classify)?;
        match output.failed_entries().first() {
            None => Ok(()),
            Some(entry) => Err(ApiError::from_code(
                entry.error_code(),
                format!(
                    "{} of {} targets failed: {}",
                    output.failed_entries().len(),
                    targets.len(),
                    entry.error_message().unwrap_or("no message")
                ),
            )),
        }
    }

    async fn remove_targets(&self, rule: &str, event_bus: &str, ids: &[String]) -> ApiResult<()> {
        tracing::debug!(rule, bus = event_bus, ?ids, "RemoveTargets");
        self.client
            .remove_targets()
            .rule(rule)
            .event_bus_name(event_bus)
            .set_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_rule(&self, name: &str, event_bus: &str) -> ApiResult<()> {
        tracing::debug!(rule = name, bus = event_bus, "DeleteRule");
        self.client
            .delete_rule()
            .name(name)
            .event_bus_name(event_bus)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

//! Authenticated, region-scoped clients

use crate::api::{EventBusApi, LambdaApi};
use crate::error::{AwsError, Result};
use crate::sdk::{AwsEventBus, AwsLambda};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use std::sync::Arc;

/// Lambda and EventBridge clients bound to one region
#[derive(Clone)]
pub struct Session {
    pub region: String,
    pub lambda: Arc<dyn LambdaApi>,
    pub events: Arc<dyn EventBusApi>,
}

impl Session {
    pub fn new(
        region: impl Into<String>,
        lambda: Arc<dyn LambdaApi>,
        events: Arc<dyn EventBusApi>,
    ) -> Self {
        Self {
            region: region.into(),
            lambda,
            events,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Source of sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn connect(&self, region: &str) -> Result<Session>;
}

/// Sessions from the default AWS credential chain
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsSessionProvider;

#[async_trait]
impl SessionProvider for AwsSessionProvider {
    async fn connect(&self, region: &str) -> Result<Session> {
        tracing::debug!(region, "Loading AWS configuration");
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        if config.credentials_provider().is_none() {
            return Err(AwsError::Connect {
                region: region.to_string(),
                message: "no credentials provider configured".to_string(),
            });
        }

        Ok(Session::new(
            region,
            Arc::new(AwsLambda::new(aws_sdk_lambda::Client::new(&config))),
            Arc::new(AwsEventBus::new(aws_sdk_eventbridge::Client::new(&config))),
        ))
    }
}

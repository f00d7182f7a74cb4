//! In-memory Lambda / EventBridge doubles

#![allow(dead_code)]

use async_trait::async_trait;
use lambdaflow_cloud::ReconcileContext;
use lambdaflow_cloud::RecordingReporter;
use lambdaflow_cloud::Source;
use lambdaflow_cloud_aws::{
    ApiError, ApiResult, ConfigDelta, CreateFunctionRequest, EventBusApi, LambdaApi,
    PermissionStatement, PublishedVersion, PutRuleRequest, RemoteFunctionState, RuleTarget,
    Session, VpcConfig,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const APP: &str = "orders-svc";
pub const IMAGE: &str = "123.dkr.ecr/repo:tag";
pub const ROLE: &str = "arn:aws:iam::123456789012:role/exec";

pub fn function_arn(name: &str) -> String {
    format!("arn:aws:lambda:eu-west-1:123456789012:function:{}", name)
}

pub fn recording_context() -> (ReconcileContext, RecordingReporter) {
    let reporter = RecordingReporter::new();
    let ctx = ReconcileContext::new(Source::new(APP), Arc::new(reporter.clone()));
    (ctx, reporter)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeFunction {
    pub arn: String,
    pub memory_mb: i32,
    pub timeout_secs: i32,
    pub vpc: VpcConfig,
    pub image: String,
    pub role: String,
    pub description: String,
    pub tags: BTreeMap<String, String>,
    pub versions: BTreeSet<u32>,
    next_version: u32,
}

#[derive(Default)]
struct LambdaState {
    functions: BTreeMap<String, FakeFunction>,
    /// Resource policies are per qualified function: keyed by (function, statement id)
    permissions: BTreeMap<(String, String), PermissionStatement>,
    calls: Vec<String>,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
}

impl LambdaState {
    fn scripted(&mut self, op: &'static str) -> ApiResult<()> {
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Accept a bare name or an (optionally qualified) ARN
    fn key_for(&self, name_or_arn: &str) -> Option<String> {
        if self.functions.contains_key(name_or_arn) {
            return Some(name_or_arn.to_string());
        }
        self.functions
            .iter()
            .find(|(_, f)| f.arn == name_or_arn || name_or_arn.starts_with(&format!("{}:", f.arn)))
            .map(|(name, _)| name.clone())
    }
}

/// Lambda double keyed by function name
#[derive(Clone, Default)]
pub struct FakeLambda {
    state: Arc<Mutex<LambdaState>>,
}

impl FakeLambda {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing function
    pub fn with_function(self, name: &str, memory_mb: i32, timeout_secs: i32) -> Self {
        self.state.lock().unwrap().functions.insert(
            name.to_string(),
            FakeFunction {
                arn: function_arn(name),
                memory_mb,
                timeout_secs,
                vpc: VpcConfig::default(),
                image: "old-image".to_string(),
                role: ROLE.to_string(),
                description: String::new(),
                tags: BTreeMap::new(),
                versions: BTreeSet::new(),
                next_version: 1,
            },
        );
        self
    }

    /// Make the next `times` calls of `op` fail with `err`
    pub fn fail(&self, op: &'static str, err: ApiError, times: usize) {
        let mut state = self.state.lock().unwrap();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(err.clone());
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == op).count()
    }

    pub fn function(&self, name: &str) -> Option<FakeFunction> {
        self.state.lock().unwrap().functions.get(name).cloned()
    }

    pub fn permissions(&self) -> Vec<PermissionStatement> {
        self.state
            .lock()
            .unwrap()
            .permissions
            .values()
            .cloned()
            .collect()
    }

    /// Statements attached to one (qualified) function ARN
    pub fn permissions_for(&self, function_arn: &str) -> Vec<PermissionStatement> {
        self.permissions()
            .into_iter()
            .filter(|p| p.function_name == function_arn)
            .collect()
    }

    pub fn session(&self, events: &FakeEventBus) -> Session {
        Session::new("eu-west-1", Arc::new(self.clone()), Arc::new(events.clone()))
    }
}

#[async_trait]
impl LambdaApi for FakeLambda {
    async fn get_function(&self, function_name: &str) -> ApiResult<RemoteFunctionState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("get_function".to_string());
        state.scripted("get_function")?;
        let f = state
            .functions
            .get(function_name)
            .ok_or_else(|| ApiError::not_found(format!("Function not found: {}", function_name)))?;
        Ok(RemoteFunctionState {
            function_arn: f.arn.clone(),
            memory_mb: f.memory_mb,
            timeout_secs: f.timeout_secs,
            vpc: f.vpc.clone(),
        })
    }

    async fn create_function(&self, request: &CreateFunctionRequest) -> ApiResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("create_function".to_string());
        state.scripted("create_function")?;
        if state.functions.contains_key(&request.function_name) {
            return Err(ApiError::conflict(format!(
                "Function already exist: {}",
                request.function_name
            )));
        }
        let arn = function_arn(&request.function_name);
        state.functions.insert(
            request.function_name.clone(),
            FakeFunction {
                arn: arn.clone(),
                memory_mb: request.memory_mb,
                timeout_secs: request.timeout_secs,
                vpc: request.vpc.clone(),
                image: request.image_uri.clone(),
                role: request.role_arn.clone(),
                description: request.description.clone(),
                tags: request.tags.clone(),
                versions: BTreeSet::new(),
                next_version: 1,
            },
        );
        Ok(arn)
    }

    async fn update_function_configuration(
        &self,
        function_name: &str,
        delta: &ConfigDelta,
    ) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("update_function_configuration".to_string());
        state.scripted("update_function_configuration")?;
        let f = state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| ApiError::not_found(function_name.to_string()))?;
        if let Some(memory) = delta.memory_mb {
            f.memory_mb = memory;
        }
        if let Some(timeout) = delta.timeout_secs {
            f.timeout_secs = timeout;
        }
        if let Some(vpc) = &delta.vpc {
            f.vpc = vpc.clone();
        }
        Ok(())
    }

    async fn update_function_code(&self, function_name: &str, image_uri: &str) -> ApiResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("update_function_code".to_string());
        state.scripted("update_function_code")?;
        let f = state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| ApiError::not_found(function_name.to_string()))?;
        f.image = image_uri.to_string();
        Ok(f.arn.clone())
    }

    async fn publish_version(&self, function_name: &str) -> ApiResult<PublishedVersion> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("publish_version".to_string());
        state.scripted("publish_version")?;
        let f = state
            .functions
            .get_mut(function_name)
            .ok_or_else(|| ApiError::not_found(function_name.to_string()))?;
        let version = f.next_version;
        f.next_version += 1;
        f.versions.insert(version);
        Ok(PublishedVersion {
            version_arn: format!("{}:{}", f.arn, version),
            version: version.to_string(),
        })
    }

    async fn delete_function(&self, function_name: &str, qualifier: Option<&str>) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(match qualifier {
            Some(q) => format!("delete_function {}:{}", function_name, q),
            None => format!("delete_function {}", function_name),
        });
        state.scripted("delete_function")?;
        let key = state
            .key_for(function_name)
            .ok_or_else(|| ApiError::not_found(format!("Function not found: {}", function_name)))?;

        match qualifier {
            Some(q) => {
                let version: u32 = q
                    .parse()
                    .map_err(|_| ApiError::other(format!("invalid qualifier {}", q)))?;
                let f = state.functions.get_mut(&key).expect("key resolved above");
                if !f.versions.remove(&version) {
                    return Err(ApiError::not_found(format!("Version not found: {}", q)));
                }
                let qualified = format!("{}:{}", f.arn, q);
                state.permissions.retain(|(function, _), _| *function != qualified);
            }
            None => {
                if let Some(f) = state.functions.remove(&key) {
                    let prefix = format!("{}:", f.arn);
                    state
                        .permissions
                        .retain(|(function, _), _| *function != f.arn && !function.starts_with(&prefix));
                }
            }
        }
        Ok(())
    }

    async fn add_permission(&self, statement: &PermissionStatement) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("add_permission".to_string());
        state.scripted("add_permission")?;
        let key = (
            statement.function_name.clone(),
            statement.statement_id.clone(),
        );
        if state.permissions.contains_key(&key) {
            return Err(ApiError::conflict(format!(
                "The statement id ({}) provided already exists. Please provide a new statement id, or remove the existing statement.",
                statement.statement_id
            )));
        }
        state.permissions.insert(key, statement.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRule {
    pub arn: String,
    pub event_pattern: String,
    pub enabled: bool,
    pub targets: BTreeMap<String, RuleTarget>,
}

#[derive(Default)]
struct EventState {
    /// Keyed by (bus, rule name)
    rules: BTreeMap<(String, String), FakeRule>,
    calls: Vec<String>,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
}

impl EventState {
    fn scripted(&mut self, op: &'static str) -> ApiResult<()> {
        match self.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// EventBridge double
#[derive(Clone, Default)]
pub struct FakeEventBus {
    state: Arc<Mutex<EventState>>,
}

impl FakeEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: &'static str, err: ApiError, times: usize) {
        let mut state = self.state.lock().unwrap();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(err.clone());
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn rule(&self, bus: &str, name: &str) -> Option<FakeRule> {
        self.state
            .lock()
            .unwrap()
            .rules
            .get(&(bus.to_string(), name.to_string()))
            .cloned()
    }

    pub fn rule_count(&self) -> usize {
        self.state.lock().unwrap().rules.len()
    }
}

#[async_trait]
impl EventBusApi for FakeEventBus {
    async fn put_rule(&self, request: &PutRuleRequest) -> ApiResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("put_rule {}", request.name));
        state.scripted("put_rule")?;
        let arn = format!(
            "arn:aws:events:eu-west-1:123456789012:rule/{}/{}",
            request.event_bus, request.name
        );
        let rule = state
            .rules
            .entry((request.event_bus.clone(), request.name.clone()))
            .or_insert_with(|| FakeRule {
                arn: arn.clone(),
                event_pattern: String::new(),
                enabled: false,
                targets: BTreeMap::new(),
            });
        rule.event_pattern = request.event_pattern.clone();
        rule.enabled = request.enabled;
        Ok(arn)
    }

    async fn put_targets(&self, rule: &str, event_bus: &str, targets: &[RuleTarget]) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("put_targets {}", rule));
        state.scripted("put_targets")?;
        let rule = state
            .rules
            .get_mut(&(event_bus.to_string(), rule.to_string()))
            .ok_or_else(|| ApiError::not_found(format!("Rule {} does not exist", rule)))?;
        for target in targets {
            rule.targets.insert(target.id.clone(), target.clone());
        }
        Ok(())
    }

    async fn remove_targets(&self, rule: &str, event_bus: &str, ids: &[String]) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("remove_targets {}", rule));
        state.scripted("remove_targets")?;
        let rule = state
            .rules
            .get_mut(&(event_bus.to_string(), rule.to_string()))
            .ok_or_else(|| ApiError::not_found(format!("Rule {} does not exist", rule)))?;
        for id in ids {
            rule.targets.remove(id);
        }
        Ok(())
    }

    async fn delete_rule(&self, name: &str, event_bus: &str) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete_rule {}", name));
        state.scripted("delete_rule")?;
        state
            .rules
            .remove(&(event_bus.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("Rule {} does not exist", name)))
    }
}

mod common;

use common::{APP, FakeLambda, IMAGE, ROLE, function_arn, recording_context};
use lambdaflow_cloud::{ProgressEvent, ReconcileContext, Source};
use lambdaflow_cloud_aws::{
    ApiError, AwsError, DesiredFunctionSpec, FunctionReconciler, Timings, UpdatePolicy,
};
use lambdaflow_config::DeployConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn spec() -> DesiredFunctionSpec {
    let config = DeployConfig {
        region: Some("eu-west-1".to_string()),
        role_arn: Some(ROLE.to_string()),
        memory: Some(0),
        timeout: Some(0),
        ..Default::default()
    };
    DesiredFunctionSpec::resolve(&config, None).unwrap()
}

fn reconciler(lambda: &FakeLambda) -> FunctionReconciler {
    FunctionReconciler::new(Arc::new(lambda.clone())).with_timings(Timings::immediate())
}

fn quiet() -> ReconcileContext {
    ReconcileContext::quiet(Source::new(APP))
}

#[tokio::test]
async fn test_absent_function_is_created_and_published() {
    let lambda = FakeLambda::new();
    let deployment = reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap();

    assert_eq!(
        lambda.calls(),
        vec!["get_function", "create_function", "publish_version"]
    );

    let created = lambda.function(APP).unwrap();
    assert_eq!(created.memory_mb, 256);
    assert_eq!(created.timeout_secs, 60);
    assert_eq!(created.image, IMAGE);
    assert_eq!(created.description, "lambdaflow orders-svc");
    assert_eq!(created.tags.get("lambdaflow.app").map(String::as_str), Some(APP));
    assert_eq!(created.tags.get("lambdaflow.env").map(String::as_str), Some("default"));

    assert_eq!(deployment.region, "eu-west-1");
    assert_eq!(deployment.func_arn, function_arn(APP));
    assert_eq!(deployment.version, "1");
    assert_eq!(deployment.ver_arn, format!("{}:1", function_arn(APP)));
    assert!(!deployment.id.is_empty());
}

#[tokio::test]
async fn test_second_reconcile_publishes_new_version_of_same_function() {
    let lambda = FakeLambda::new();
    let reconciler = reconciler(&lambda);

    let first = reconciler.reconcile(&quiet(), &spec(), IMAGE).await.unwrap();
    let second = reconciler.reconcile(&quiet(), &spec(), IMAGE).await.unwrap();

    assert_eq!(first.func_arn, second.func_arn);
    assert_ne!(first.ver_arn, second.ver_arn);
    assert_ne!(first.version, second.version);
    assert_ne!(first.id, second.id);
    assert_eq!(lambda.count("create_function"), 1);
    assert_eq!(lambda.count("update_function_code"), 1);
}

#[tokio::test]
async fn test_memory_drift_updates_configuration_before_code() {
    let lambda = FakeLambda::new().with_function(APP, 512, 60);
    reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap();

    assert_eq!(
        lambda.calls(),
        vec![
            "get_function",
            "update_function_configuration",
            "update_function_code",
            "publish_version"
        ]
    );
    let function = lambda.function(APP).unwrap();
    assert_eq!(function.memory_mb, 256);
    assert_eq!(function.image, IMAGE);
}

#[tokio::test]
async fn test_no_drift_skips_configuration_update() {
    let lambda = FakeLambda::new().with_function(APP, 256, 60);
    reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap();

    assert_eq!(lambda.count("update_function_configuration"), 0);
    assert_eq!(lambda.count("update_function_code"), 1);
}

#[tokio::test]
async fn test_always_policy_updates_configuration_without_drift() {
    let lambda = FakeLambda::new().with_function(APP, 256, 60);
    let spec = DesiredFunctionSpec {
        update_policy: UpdatePolicy::Always,
        ..spec()
    };
    reconciler(&lambda)
        .reconcile(&quiet(), &spec, IMAGE)
        .await
        .unwrap();

    assert_eq!(lambda.count("update_function_configuration"), 1);
}

#[tokio::test]
async fn test_configuration_failure_is_fatal() {
    let lambda = FakeLambda::new().with_function(APP, 512, 60);
    lambda.fail(
        "update_function_configuration",
        ApiError::conflict("An update is in progress"),
        1,
    );

    let err = reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap_err();

    assert!(matches!(err, AwsError::UpdateConfiguration { .. }));
    assert_eq!(lambda.count("update_function_configuration"), 1);
    assert_eq!(lambda.count("update_function_code"), 0);
}

#[tokio::test]
async fn test_code_update_waits_out_conflicts() {
    let lambda = FakeLambda::new().with_function(APP, 512, 60);
    lambda.fail(
        "update_function_code",
        ApiError::conflict("An update is in progress"),
        2,
    );

    reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap();
    assert_eq!(lambda.count("update_function_code"), 3);
}

#[tokio::test]
async fn test_read_failure_other_than_not_found_is_fatal() {
    let lambda = FakeLambda::new();
    lambda.fail(
        "get_function",
        ApiError::from_code(Some("AccessDeniedException"), "denied"),
        1,
    );

    let err = reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap_err();

    assert!(matches!(err, AwsError::Read { .. }));
    assert_eq!(lambda.calls(), vec!["get_function"]);
}

#[tokio::test]
async fn test_create_retries_transient_errors() {
    let lambda = FakeLambda::new();
    lambda.fail(
        "create_function",
        ApiError::from_code(
            Some("InvalidParameterValueException"),
            "The role defined for the function cannot be assumed by Lambda.",
        ),
        29,
    );

    let deployment = reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap();

    assert_eq!(lambda.count("create_function"), 30);
    assert_eq!(deployment.version, "1");
}

#[tokio::test]
async fn test_create_gives_up_after_thirty_attempts() {
    let lambda = FakeLambda::new();
    lambda.fail(
        "create_function",
        ApiError::from_code(Some("InvalidParameterValueException"), "role not ready"),
        30,
    );

    let err = reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap_err();

    match err {
        AwsError::TimedOut {
            operation,
            attempts,
        } => {
            assert_eq!(operation, "create function");
            assert_eq!(attempts, 30);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(lambda.count("create_function"), 30);
    assert_eq!(lambda.count("publish_version"), 0);
}

#[tokio::test]
async fn test_create_conflict_is_fatal() {
    let lambda = FakeLambda::new();
    lambda.fail(
        "create_function",
        ApiError::conflict("Function already exist: orders-svc"),
        1,
    );

    let err = reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap_err();

    assert!(matches!(err, AwsError::Create { ref source, .. } if source.is_conflict()));
    assert_eq!(lambda.count("create_function"), 1);
}

#[tokio::test]
async fn test_publish_retries_conflicts_on_its_own_budget() {
    let lambda = FakeLambda::new();
    // Create failures do not eat into the publish budget
    lambda.fail("create_function", ApiError::other("role not ready"), 10);
    lambda.fail(
        "publish_version",
        ApiError::conflict("The operation cannot be performed at this time."),
        29,
    );

    let deployment = reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap();

    assert_eq!(lambda.count("create_function"), 11);
    assert_eq!(lambda.count("publish_version"), 30);
    assert!(deployment.has_version());
}

#[tokio::test]
async fn test_publish_exhaustion_is_a_timeout() {
    let lambda = FakeLambda::new();
    lambda.fail("publish_version", ApiError::conflict("still updating"), 30);

    let err = reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(err, AwsError::TimedOut { ref operation, .. } if operation == "publish version"));
}

#[tokio::test]
async fn test_publish_non_conflict_error_is_fatal() {
    let lambda = FakeLambda::new();
    lambda.fail(
        "publish_version",
        ApiError::from_code(Some("ServiceException"), "internal"),
        1,
    );

    let err = reconciler(&lambda)
        .reconcile(&quiet(), &spec(), IMAGE)
        .await
        .unwrap_err();

    assert!(matches!(err, AwsError::Publish { .. }));
    assert_eq!(lambda.count("publish_version"), 1);
}

#[tokio::test]
async fn test_failed_phase_aborts_its_step() {
    let lambda = FakeLambda::new();
    lambda.fail("publish_version", ApiError::other("boom"), 1);
    let (ctx, reporter) = recording_context();

    let result = reconciler(&lambda).reconcile(&ctx, &spec(), IMAGE).await;

    assert!(result.is_err());
    assert_eq!(reporter.aborted_steps(), vec!["Publishing version"]);
    assert!(
        reporter
            .events()
            .contains(&ProgressEvent::StepDone("Creating Lambda function".to_string()))
    );
}

#[tokio::test]
async fn test_cancelled_context_stops_before_create() {
    let lambda = FakeLambda::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = quiet().with_cancel(cancel);

    let err = reconciler(&lambda)
        .reconcile(&ctx, &spec(), IMAGE)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(lambda.count("create_function"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_settle_delay() {
    let lambda = FakeLambda::new();
    let cancel = CancellationToken::new();
    let ctx = quiet().with_cancel(cancel.clone());
    let reconciler = FunctionReconciler::new(Arc::new(lambda.clone()));

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let err = reconciler.reconcile(&ctx, &spec(), IMAGE).await.unwrap_err();
    trigger.await.unwrap();

    assert!(err.is_cancelled());
    assert_eq!(lambda.count("create_function"), 1);
    assert_eq!(lambda.count("publish_version"), 0);
}

#[tokio::test]
async fn test_plan_reports_create_for_missing_function() {
    let lambda = FakeLambda::new();
    let action = reconciler(&lambda)
        .plan(APP, &spec(), IMAGE)
        .await
        .unwrap();

    assert_eq!(action.action_type, lambdaflow_cloud::ActionType::Create);
    assert_eq!(action.details["memory_mb"], serde_json::json!(256));
    assert_eq!(lambda.calls(), vec!["get_function"]);
}

#[tokio::test]
async fn test_plan_lists_only_drifted_fields() {
    let lambda = FakeLambda::new().with_function(APP, 512, 60);
    let action = reconciler(&lambda)
        .plan(APP, &spec(), IMAGE)
        .await
        .unwrap();

    assert_eq!(action.action_type, lambdaflow_cloud::ActionType::Update);
    assert!(action.details.contains_key("memory_mb"));
    assert!(!action.details.contains_key("timeout_secs"));
    assert_eq!(lambda.count("update_function_configuration"), 0);
}

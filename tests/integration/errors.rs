use crate::utils::{get, RecordingSleeper, Reply, Scripted};
use reprise::{Error, FailureKind, RetryPolicy, RetryingTransport, StatusCode};

const URL: &str = "http://localhost/hello";

fn transport(max_attempts: u32, script: &Scripted) -> RetryingTransport {
    let policy = RetryPolicy::builder()
        .max_attempts(max_attempts)
        .build()
        .unwrap();
    RetryingTransport::new(policy)
        .with_transport(script.clone())
        .with_async_transport(script.clone())
        .with_sleeper(RecordingSleeper::default())
}

#[test]
fn retryable_failure_is_retried() {
    let _ = env_logger::try_init();
    let script = Scripted::new(vec![
        Reply::Fail(FailureKind::Connect),
        Reply::Fail(FailureKind::Network),
        Reply::Status(200),
    ]);

    let res = transport(5, &script).send(&get(URL)).unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(script.calls(), 3);
}

#[tokio::test]
async fn retryable_failure_is_retried_async() {
    let script = Scripted::new(vec![Reply::Fail(FailureKind::Timeout), Reply::Status(200)]);

    let res = transport(5, &script).send_async(&get(URL)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(script.calls(), 2);
}

#[test]
fn non_retryable_failure_propagates() {
    let script = Scripted::new(vec![Reply::Fail(FailureKind::Protocol), Reply::Status(200)]);

    let err = transport(5, &script).send(&get(URL)).unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(ref e) if e.kind() == FailureKind::Protocol
    ));
    assert_eq!(script.calls(), 1);
}

#[tokio::test]
async fn exhausted_failure_propagates_async() {
    let script = Scripted::new(vec![Reply::Fail(FailureKind::Timeout)]);

    let err = transport(2, &script)
        .send_async(&get(URL))
        .await
        .unwrap_err();
    assert_eq!(err.as_transport().unwrap().kind(), FailureKind::Timeout);
    assert_eq!(err.as_transport().unwrap().get_ref().to_string(), "scripted failure");
    assert_eq!(script.calls(), 3);
}

#[test]
fn failure_kinds_are_configurable() {
    let script = Scripted::new(vec![Reply::Fail(FailureKind::Protocol), Reply::Status(200)]);
    let policy = RetryPolicy::builder()
        .retryable_failures([FailureKind::Protocol])
        .build()
        .unwrap();
    let transport = RetryingTransport::new(policy)
        .with_transport(script.clone())
        .with_sleeper(RecordingSleeper::default());

    assert_eq!(transport.send(&get(URL)).unwrap().status(), StatusCode::OK);
}

#[test]
fn missing_async_side_fails_fast() {
    let script = Scripted::new(vec![Reply::Status(200)]);
    let transport = RetryingTransport::default().with_transport(script.clone());

    let err = futures::executor::block_on(transport.send_async(&get(URL))).unwrap_err();
    assert!(matches!(err, Error::MissingCapability("async")));
    assert_eq!(script.calls(), 0);
}

#[test]
fn invalid_policy_is_rejected_at_build() {
    assert!(matches!(
        RetryPolicy::builder().backoff_jitter(2.0).build(),
        Err(Error::Config(_))
    ));
}

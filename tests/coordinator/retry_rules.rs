use super::{two_instances, Behavior, Scripted};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use steadycall::{Coordinator, Endpoint, InvocationError, OutboundRequest, RetryablePaths, TransportOptions};
use steadycall_retry::RetryConfig;

const MAX_ATTEMPTS: usize = 3;

fn coordinator(transport: Scripted) -> Coordinator<Scripted> {
    Coordinator::builder("orders", two_instances())
        .retry(
            RetryConfig::builder()
                .max_attempts(MAX_ATTEMPTS)
                .wait_duration(Duration::from_millis(20))
                .build(),
        )
        .retryable_paths(RetryablePaths::new(["/orders/*/cancel"]))
        .build(transport)
}

async fn attempts_for(endpoint: Endpoint, behavior: Behavior) -> (usize, InvocationError) {
    let transport = Scripted::new(behavior);
    let err = coordinator(transport.clone())
        .invoke(OutboundRequest::empty("orders", endpoint))
        .await
        .unwrap_err();
    (transport.dispatch_count(), err)
}

#[tokio::test(start_paused = true)]
async fn response_timeout_on_plain_post_is_not_retried() {
    let (attempts, err) = attempts_for(Endpoint::post("/orders"), Behavior::ResponseTimeout).await;
    assert_eq!(attempts, 1);
    assert!(matches!(err, InvocationError::ResponseFailure { .. }));
}

#[tokio::test(start_paused = true)]
async fn response_timeout_on_get_is_retried_to_the_limit() {
    let (attempts, _) = attempts_for(Endpoint::get("/orders"), Behavior::ResponseTimeout).await;
    assert_eq!(attempts, MAX_ATTEMPTS);
}

#[tokio::test(start_paused = true)]
async fn response_timeout_on_marked_post_is_retried_to_the_limit() {
    let (attempts, _) = attempts_for(
        Endpoint::post("/orders").retryable(),
        Behavior::ResponseTimeout,
    )
    .await;
    assert_eq!(attempts, MAX_ATTEMPTS);
}

#[tokio::test(start_paused = true)]
async fn response_timeout_on_retryable_path_is_retried_to_the_limit() {
    let (attempts, _) =
        attempts_for(Endpoint::post("/orders/{id}/cancel"), Behavior::ResponseTimeout).await;
    assert_eq!(attempts, MAX_ATTEMPTS);
}

#[tokio::test(start_paused = true)]
async fn connect_failures_are_retried_for_any_method() {
    for endpoint in [Endpoint::get("/orders"), Endpoint::post("/orders"), Endpoint::delete("/orders/1")] {
        let (attempts, err) = attempts_for(endpoint, Behavior::Refused).await;
        assert_eq!(attempts, MAX_ATTEMPTS);
        assert!(matches!(err, InvocationError::ConnectFailure { .. }));
    }
}

#[tokio::test(start_paused = true)]
async fn attempt_timeout_covers_hanging_transports() {
    let transport = Scripted::new(Behavior::Hang);
    let coordinator = Coordinator::builder("orders", two_instances())
        .retry(RetryConfig::builder().max_attempts(2).build())
        .transport_options(TransportOptions::new(
            Duration::from_millis(100),
            Duration::from_millis(400),
        ))
        .build(transport.clone());

    let started = tokio::time::Instant::now();
    let err = coordinator
        .invoke(OutboundRequest::empty("orders", Endpoint::get("/orders")))
        .await
        .unwrap_err();

    assert_eq!(transport.dispatch_count(), 2);
    match err {
        InvocationError::ResponseFailure { source, .. } => assert!(source.is_timeout()),
        other => panic!("unexpected error: {other}"),
    }
    // Two attempts of 500ms and one 500ms wait.
    assert!(started.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn retries_are_reported_to_listeners() {
    let retries = Arc::new(AtomicUsize::new(0));
    let exhausted = Arc::new(AtomicUsize::new(0));
    let (r, e) = (Arc::clone(&retries), Arc::clone(&exhausted));

    let transport = Scripted::new(Behavior::Refused);
    let coordinator = Coordinator::builder("orders", two_instances())
        .retry(
            RetryConfig::builder()
                .max_attempts(4)
                .wait_duration(Duration::from_millis(5))
                .on_retry(move |_, _| {
                    r.fetch_add(1, Ordering::SeqCst);
                })
                .on_exhausted(move |_| {
                    e.fetch_add(1, Ordering::SeqCst);
                })
                .build(),
        )
        .build(transport);

    let _ = coordinator
        .invoke(OutboundRequest::empty("orders", Endpoint::get("/orders")))
        .await;

    assert_eq!(retries.load(Ordering::SeqCst), 3);
    assert_eq!(exhausted.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn a_healthy_retry_target_ends_the_call() {
    let transport = Scripted::new(Behavior::Status(200));
    transport.set(super::HOST_A, Behavior::Refused);

    let status = coordinator(transport.clone())
        .invoke(OutboundRequest::empty("orders", Endpoint::post("/orders")))
        .await
        .unwrap();

    assert_eq!(status, 200);
    let dispatched = transport.dispatched();
    assert_eq!(dispatched.last().map(String::as_str), Some(super::HOST_B));
    assert!(dispatched.len() <= 2);
}

#[tokio::test(start_paused = true)]
async fn error_status_on_plain_post_fails_once() {
    let (attempts, err) = attempts_for(Endpoint::post("/orders"), Behavior::Status(500)).await;
    assert_eq!(attempts, 1);
    assert!(matches!(err, InvocationError::Application { status: 500, .. }));
}

#[tokio::test(start_paused = true)]
async fn error_status_on_get_is_retried_to_the_limit() {
    let (attempts, err) = attempts_for(Endpoint::get("/orders"), Behavior::Status(503)).await;
    assert_eq!(attempts, MAX_ATTEMPTS);
    assert!(matches!(err, InvocationError::Application { status: 503, .. }));
}

#[tokio::test(start_paused = true)]
async fn signal_status_on_plain_post_is_retried_to_the_limit() {
    let transport = Scripted::new(Behavior::Status(steadycall_retry::status::CIRCUIT_OPEN));
    let coordinator = Coordinator::builder("orders", two_instances())
        .retry(
            RetryConfig::builder()
                .max_attempts(MAX_ATTEMPTS)
                .wait_duration(Duration::from_millis(20))
                .retry_on_signal_statuses()
                .build(),
        )
        .build(transport.clone());

    let err = coordinator
        .invoke(OutboundRequest::empty("orders", Endpoint::post("/orders")))
        .await
        .unwrap_err();

    assert_eq!(transport.dispatch_count(), MAX_ATTEMPTS);
    assert!(matches!(err, InvocationError::Application { status: 581, .. }));
}

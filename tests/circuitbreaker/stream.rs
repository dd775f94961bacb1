use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use steadycall_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStreamExt,
    CircuitState,
};
use steadycall_core::TargetKey;

fn breaker() -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new(
        TargetKey::method("10.0.0.1", 80, "GET /events"),
        Arc::new(
            CircuitBreakerConfig::builder()
                .minimum_number_of_calls(1)
                .wait_duration_in_open(Duration::from_secs(60))
                .build(),
        ),
    ))
}

#[tokio::test]
async fn dropping_before_the_first_value_releases_the_permission() {
    let breaker = breaker();
    let mut guarded = Box::pin(
        stream::pending::<Result<u16, String>>().circuit_breaker(Arc::clone(&breaker)),
    );

    let polled = tokio::time::timeout(Duration::from_millis(10), guarded.next()).await;
    assert!(polled.is_err());
    assert_eq!(breaker.metrics().in_flight, 1);

    drop(guarded);
    assert_eq!(breaker.metrics().in_flight, 0);
    assert_eq!(breaker.metrics().total_calls, 0);
}

#[tokio::test]
async fn dropping_after_a_value_counts_as_answered() {
    let breaker = breaker();
    let mut guarded = Box::pin(
        stream::iter([Ok::<u16, String>(200)])
            .chain(stream::pending())
            .circuit_breaker(Arc::clone(&breaker)),
    );

    assert!(matches!(guarded.next().await, Some(Ok(200))));
    drop(guarded);

    let metrics = breaker.metrics();
    assert_eq!(metrics.total_calls, 1);
    assert_eq!(metrics.failure_count, 0);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn open_breaker_rejects_before_subscribing() {
    let breaker = breaker();
    breaker.force_open();

    let items: Vec<_> = stream::iter([Ok::<u16, String>(200)])
        .circuit_breaker(Arc::clone(&breaker))
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(CircuitBreakerError::OpenCircuit { .. })));
}

#[tokio::test]
async fn error_status_as_first_value_is_a_failure() {
    let breaker = breaker();
    let items: Vec<_> = stream::iter([Ok::<u16, String>(500), Ok(200)])
        .circuit_breaker(Arc::clone(&breaker))
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(breaker.state(), CircuitState::Open);
}

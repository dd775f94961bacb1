//! Instance A fails until its breaker opens. Calls move to B, and once the
//! open wait has passed a retry lands on A as the half-open trial call that
//! closes it again.
//!
//! Breakers keep wall-clock time, so this runs in real time.

use super::{two_instances, Behavior, Scripted, HOST_A, HOST_B};
use std::sync::Arc;
use std::time::Duration;
use steadycall::{Coordinator, Endpoint, OutboundRequest};
use steadycall_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
use steadycall_core::{InvocationError, ServiceInstance, TargetKey};
use steadycall_loadbalancer::StaticDirectory;
use steadycall_retry::RetryConfig;

const OPEN_WAIT: Duration = Duration::from_millis(150);

#[tokio::test]
async fn failing_instance_is_avoided_then_readmitted() {
    let breakers = Arc::new(CircuitBreakerRegistry::new(
        CircuitBreakerConfig::builder()
            .failure_rate_threshold(0.5)
            .minimum_number_of_calls(2)
            .sliding_window_size(10)
            .wait_duration_in_open(OPEN_WAIT)
            .build(),
    ));
    let transport = Scripted::new(Behavior::Status(200));
    transport.set(HOST_A, Behavior::Refused);

    // Two calls that can only reach A, sharing the breakers of the main client.
    let only_a = StaticDirectory::new()
        .with_service("orders", vec![ServiceInstance::new(HOST_A, 8080)]);
    let pinned = Coordinator::builder("orders", only_a)
        .circuit_breakers(Arc::clone(&breakers))
        .retry(RetryConfig::builder().max_attempts(1).build())
        .build(transport.clone());
    for _ in 0..2 {
        let err = pinned
            .invoke(OutboundRequest::empty("orders", Endpoint::get("/orders")))
            .await
            .unwrap_err();
        assert!(matches!(err, InvocationError::ConnectFailure { .. }));
    }

    let a = breakers
        .get(&TargetKey::method(HOST_A, 8080, "GET /orders"))
        .unwrap();
    assert_eq!(a.state(), CircuitState::Open);
    assert_eq!(transport.dispatched(), vec![HOST_A.to_string(), HOST_A.to_string()]);
    transport.set(HOST_A, Behavior::Status(200));

    let coordinator = Coordinator::builder("orders", two_instances())
        .circuit_breakers(Arc::clone(&breakers))
        .retry(
            RetryConfig::builder()
                .max_attempts(3)
                .wait_duration(Duration::from_millis(5))
                .build(),
        )
        .build(transport.clone());

    for _ in 0..20 {
        let status = coordinator
            .invoke(OutboundRequest::empty("orders", Endpoint::get("/orders")))
            .await
            .unwrap();
        assert_eq!(status, 200);
    }
    assert!(transport.dispatched()[2..].iter().all(|host| host == HOST_B));

    tokio::time::sleep(OPEN_WAIT + Duration::from_millis(50)).await;

    // B fails, so the retry within the call goes to the untried host.
    transport.set(HOST_B, Behavior::Status(503));
    let before = transport.dispatch_count();
    let status = coordinator
        .invoke(
            OutboundRequest::empty("orders", Endpoint::get("/orders"))
                .with_correlation_id("readmit-1"),
        )
        .await
        .unwrap();

    assert_eq!(status, 200);
    let tail: Vec<String> = transport.dispatched().split_off(before);
    assert_eq!(tail, vec![HOST_B.to_string(), HOST_A.to_string()]);
    assert_eq!(a.state(), CircuitState::Closed);
}

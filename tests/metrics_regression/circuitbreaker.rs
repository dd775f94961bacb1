use super::helpers::*;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use steadycall_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use steadycall_core::TargetKey;

#[test]
#[serial]
fn circuitbreaker_metrics_exist() {
    init_recorder();

    let config = CircuitBreakerConfig::builder()
        .minimum_number_of_calls(3)
        .slow_call_duration_threshold(Duration::from_millis(50))
        .build();
    let key = TargetKey::method("10.9.0.1", 8080, "GET /metrics");
    let breaker = CircuitBreaker::new(key.clone(), Arc::new(config));

    let permit = breaker.acquire_permission().unwrap();
    breaker.on_success(permit, Duration::from_millis(80));
    let permit = breaker.acquire_permission().unwrap();
    breaker.on_error(permit, Duration::from_millis(2));
    let permit = breaker.acquire_permission().unwrap();
    breaker.on_error(permit, Duration::from_millis(2));
    let _ = breaker.acquire_permission();

    let label = key.to_string();
    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", &label);
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    assert_counter_exists("circuitbreaker_slow_calls_total");

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "open");

    assert_gauge_exists("circuitbreaker_state");
    assert_histogram_exists("circuitbreaker_call_duration_seconds");
}

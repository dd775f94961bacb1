use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use steadycall_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use steadycall_core::TargetKey;

const D: Duration = Duration::from_millis(1);

fn breaker(config: CircuitBreakerConfig) -> CircuitBreaker {
    CircuitBreaker::new(TargetKey::method("10.0.0.1", 80, "GET /"), Arc::new(config))
}

#[tokio::test]
async fn opens_tries_again_and_closes() {
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&transitions);
    let breaker = breaker(
        CircuitBreakerConfig::builder()
            .failure_rate_threshold(0.5)
            .minimum_number_of_calls(2)
            .wait_duration_in_open(Duration::from_millis(50))
            .on_state_transition(move |_, from, to| seen.lock().unwrap().push((from, to)))
            .build(),
    );

    for _ in 0..2 {
        let permit = breaker.acquire_permission().unwrap();
        breaker.on_error(permit, D);
    }
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(breaker.acquire_permission().unwrap_err().is_circuit_open());

    tokio::time::sleep(Duration::from_millis(80)).await;
    // Still reported open until someone asks for a permission.
    assert_eq!(breaker.state(), CircuitState::Open);

    let trial = breaker.acquire_permission().unwrap();
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert!(breaker.try_acquire_permission().is_none(), "one trial call at a time");

    breaker.on_success(trial, D);
    assert_eq!(breaker.state(), CircuitState::Closed);

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

#[tokio::test]
async fn failed_trial_reopens() {
    let breaker = breaker(
        CircuitBreakerConfig::builder()
            .minimum_number_of_calls(1)
            .wait_duration_in_open(Duration::from_millis(30))
            .build(),
    );

    let permit = breaker.acquire_permission().unwrap();
    breaker.on_error(permit, D);
    assert!(breaker.is_open());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let permit = breaker.acquire_permission().unwrap();
    breaker.on_error(permit, D);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(breaker.try_acquire_permission().is_none());
}

#[test]
fn released_and_cancelled_permissions_leave_the_window_alone() {
    let cancelled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&cancelled);
    let breaker = breaker(
        CircuitBreakerConfig::builder()
            .minimum_number_of_calls(2)
            .on_call_cancelled(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build(),
    );

    let permit = breaker.acquire_permission().unwrap();
    breaker.release_permission(permit);
    let permit = breaker.acquire_permission().unwrap();
    breaker.on_cancelled(permit, D);

    let metrics = breaker.metrics();
    assert_eq!(metrics.total_calls, 0);
    assert_eq!(metrics.in_flight, 0);
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
}

#[test]
fn below_minimum_calls_never_opens() {
    let breaker = breaker(
        CircuitBreakerConfig::builder()
            .minimum_number_of_calls(10)
            .build(),
    );
    for _ in 0..9 {
        let permit = breaker.acquire_permission().unwrap();
        breaker.on_error(permit, D);
    }
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.metrics().failure_rate, 1.0);

    let permit = breaker.acquire_permission().unwrap();
    breaker.on_error(permit, D);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn calls_admitted_before_opening_do_not_decide_the_trial() {
    let breaker = breaker(
        CircuitBreakerConfig::builder()
            .minimum_number_of_calls(2)
            .sliding_window_size(2)
            .wait_duration_in_open(Duration::from_millis(30))
            .build(),
    );

    let lingering = breaker.acquire_permission().unwrap();
    for _ in 0..2 {
        let permit = breaker.acquire_permission().unwrap();
        breaker.on_error(permit, D);
    }
    assert!(breaker.is_open());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let trial = breaker.acquire_permission().unwrap();

    breaker.on_success(lingering, D);
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert_eq!(breaker.metrics().in_flight, 1);

    breaker.on_error(trial, D);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.metrics().in_flight, 0);
}

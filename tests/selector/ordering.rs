use super::spread_instances;
use std::time::Duration;
use steadycall_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
use steadycall_core::{CorrelationId, ServiceInstance};
use steadycall_loadbalancer::{BreakerHealth, InstanceHealth, NoHealth, Selector};

#[test]
fn open_instance_is_chosen_last() {
    let candidates = spread_instances(4);
    let open = candidates[2].clone();
    let health = |instance: &ServiceInstance| {
        if *instance == open {
            InstanceHealth {
                state: CircuitState::Open,
                ..InstanceHealth::HEALTHY
            }
        } else {
            InstanceHealth::HEALTHY
        }
    };

    for _ in 0..20 {
        let selector = Selector::new();
        let call = CorrelationId::generate();
        let picks: Vec<_> = (0..4)
            .map(|_| selector.select(&candidates, &call, &health).unwrap())
            .collect();
        assert!(!picks[..3].contains(&candidates[2]));
        assert_eq!(picks[3], candidates[2]);
    }
}

#[test]
fn lower_failure_rate_goes_first() {
    let candidates = spread_instances(3);
    let rates = [0.4, 0.1, 0.2];
    let health = |instance: &ServiceInstance| {
        let idx = candidates.iter().position(|c| c == instance).unwrap();
        InstanceHealth {
            failure_rate: rates[idx],
            ..InstanceHealth::HEALTHY
        }
    };

    let selector = Selector::new();
    let call = CorrelationId::generate();
    let order: Vec<_> = (0..3)
        .map(|_| selector.select(&candidates, &call, &health).unwrap())
        .collect();
    assert_eq!(order, vec![candidates[1].clone(), candidates[2].clone(), candidates[0].clone()]);
}

#[test]
fn half_open_ranks_between_closed_and_open() {
    let candidates = spread_instances(3);
    let states = [CircuitState::Open, CircuitState::HalfOpen, CircuitState::Closed];
    let health = |instance: &ServiceInstance| {
        let idx = candidates.iter().position(|c| c == instance).unwrap();
        InstanceHealth {
            state: states[idx],
            ..InstanceHealth::HEALTHY
        }
    };

    let selector = Selector::new();
    let call = CorrelationId::generate();
    let order: Vec<_> = (0..3)
        .map(|_| selector.select(&candidates, &call, &health).unwrap())
        .collect();
    assert_eq!(order, vec![candidates[2].clone(), candidates[1].clone(), candidates[0].clone()]);
}

#[test]
fn breaker_registry_drives_the_ordering() {
    let registry = CircuitBreakerRegistry::new(
        CircuitBreakerConfig::builder()
            .minimum_number_of_calls(2)
            .wait_duration_in_open(Duration::from_secs(30))
            .build(),
    );
    let candidates = spread_instances(2);
    let failing = registry.breaker("orders", &candidates[0].method_key("GET /orders"));
    for _ in 0..2 {
        let permit = failing.try_acquire_permission().unwrap();
        failing.on_error(permit, Duration::from_millis(5));
    }
    assert_eq!(failing.state(), CircuitState::Open);

    let selector = Selector::new();
    let health = BreakerHealth::new(&registry, "GET /orders");
    for _ in 0..10 {
        let call = CorrelationId::generate();
        assert_eq!(selector.select(&candidates, &call, &health).unwrap(), candidates[1]);
    }
}

#[test]
fn duplicate_candidates_count_once() {
    let a = ServiceInstance::new("10.0.0.1", 80);
    let b = ServiceInstance::new("10.0.1.1", 80);
    let candidates = vec![a.clone(), a.clone(), a.clone(), b.clone()];

    let selector = Selector::new();
    let call = CorrelationId::generate();
    let first = selector.select(&candidates, &call, &NoHealth).unwrap();
    let second = selector.select(&candidates, &call, &NoHealth).unwrap();
    assert_ne!(first, second);
}

#[test]
fn empty_candidates_are_an_error() {
    let selector = Selector::new();
    assert!(selector
        .select(&[], &CorrelationId::generate(), &NoHealth)
        .is_err());
}

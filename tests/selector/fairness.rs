use super::spread_instances;
use std::collections::{HashMap, HashSet};
use steadycall_core::CorrelationId;
use steadycall_loadbalancer::{NoHealth, SelectionMode, Selector};

#[test]
fn thousand_selections_visit_every_closed_instance_evenly() {
    for n in [2usize, 3, 5, 8] {
        let selector = Selector::new();
        let candidates = spread_instances(n);
        let call = CorrelationId::generate();

        let mut visits: HashMap<String, usize> = HashMap::new();
        for _ in 0..1000 {
            let chosen = selector.select(&candidates, &call, &NoHealth).unwrap();
            *visits.entry(chosen.host().to_string()).or_default() += 1;
        }

        let expected = 1000 / n;
        assert_eq!(visits.len(), n);
        for (host, count) in visits {
            assert!(
                count.abs_diff(expected) <= 2,
                "{host} visited {count} times, expected about {expected} (n = {n})"
            );
        }
    }
}

#[test]
fn round_robin_mode_is_exactly_even() {
    let selector = Selector::builder().mode(SelectionMode::RoundRobin).build();
    let candidates = spread_instances(4);
    let call = CorrelationId::new("rr");

    let mut visits: HashMap<String, usize> = HashMap::new();
    for _ in 0..1000 {
        let chosen = selector.select(&candidates, &call, &NoHealth).unwrap();
        *visits.entry(chosen.host().to_string()).or_default() += 1;
    }
    assert!(visits.values().all(|count| *count == 250), "{visits:?}");
}

#[test]
fn no_instance_repeats_while_another_is_untried() {
    for _ in 0..50 {
        let selector = Selector::new();
        let candidates = spread_instances(6);
        let call = CorrelationId::generate();

        let mut seen = HashSet::new();
        for _ in 0..candidates.len() {
            let chosen = selector.select(&candidates, &call, &NoHealth).unwrap();
            assert!(seen.insert(chosen.key()), "{chosen} chosen twice");
        }
    }
}

#[test]
fn retries_leave_the_subnet_of_the_failed_attempt() {
    let candidates = vec![
        steadycall_core::ServiceInstance::new("10.0.0.1", 80),
        steadycall_core::ServiceInstance::new("10.0.0.2", 80),
        steadycall_core::ServiceInstance::new("10.0.1.1", 80),
    ];
    for _ in 0..50 {
        let selector = Selector::new();
        let call = CorrelationId::generate();
        let first = selector.select(&candidates, &call, &NoHealth).unwrap();
        let second = selector.select(&candidates, &call, &NoHealth).unwrap();
        assert_ne!(first.subnet(), second.subnet());
    }
}

#[test]
fn calls_keep_separate_histories() {
    let selector = Selector::new();
    let candidates = spread_instances(3);
    let a = CorrelationId::new("call-a");
    let b = CorrelationId::new("call-b");

    selector.select(&candidates, &a, &NoHealth).unwrap();
    selector.select(&candidates, &a, &NoHealth).unwrap();
    selector.select(&candidates, &b, &NoHealth).unwrap();

    assert_eq!(selector.call_context(&a).unwrap().tried_counts(), (2, 2));
    assert_eq!(selector.call_context(&b).unwrap().tried_counts(), (1, 1));
    assert_eq!(selector.active_calls(), 2);
}

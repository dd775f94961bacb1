//! Property tests for instance selection.
//!
//! Invariants tested:
//! - Within one call, no host is repeated while an untried one remains
//! - Selection always returns one of the candidates
//! - Separate calls keep separate histories

use proptest::prelude::*;
use std::collections::HashSet;
use steadycall_core::{CorrelationId, ServiceInstance};
use steadycall_loadbalancer::{NoHealth, Selector};

fn instances() -> impl Strategy<Value = Vec<ServiceInstance>> {
    prop::collection::hash_set((any::<u8>(), any::<u8>()), 1..10).prop_map(|addresses| {
        addresses
            .into_iter()
            .map(|(a, b)| ServiceInstance::new(format!("10.{a}.{b}.1"), 8080))
            .collect()
    })
}

proptest! {
    #[test]
    fn untried_hosts_come_first(candidates in instances()) {
        let selector = Selector::new();
        let call = CorrelationId::generate();

        let mut seen = HashSet::new();
        for _ in 0..candidates.len() {
            let chosen = selector.select(&candidates, &call, &NoHealth).unwrap();
            prop_assert!(candidates.contains(&chosen));
            prop_assert!(seen.insert(chosen.host().to_string()));
        }
    }

    #[test]
    fn calls_do_not_share_history(candidates in instances(), calls in 2usize..6) {
        let selector = Selector::new();
        for _ in 0..calls {
            let call = CorrelationId::generate();
            let chosen = selector.select(&candidates, &call, &NoHealth).unwrap();
            let context = selector.call_context(&call).unwrap();
            prop_assert!(context.has_tried_host(&chosen));
            prop_assert_eq!(context.tried_counts().0, 1);
        }
        prop_assert_eq!(selector.active_calls(), calls);
    }
}

use std::sync::Arc;
use steadycall_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use steadycall_core::TargetKey;
use tokio::sync::Barrier;

/// 100 tasks racing on the first use of a key get the same breaker
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_first_uses_create_exactly_one_breaker() {
    let registry = Arc::new(CircuitBreakerRegistry::new(
        CircuitBreakerConfig::builder().build(),
    ));
    let key = TargetKey::method("10.0.0.1", 8080, "GET /orders");
    let barrier = Arc::new(Barrier::new(100));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            let key = key.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                registry.breaker("orders", &key)
            })
        })
        .collect();

    let mut breakers = Vec::with_capacity(100);
    for handle in handles {
        breakers.push(handle.await.unwrap());
    }

    assert_eq!(registry.len(), 1);
    assert!(breakers.iter().all(|b| Arc::ptr_eq(b, &breakers[0])));
}

#[test]
fn decoded_key_resolves_the_same_breaker() {
    let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::builder().build());
    let key = TargetKey::method("orders-1.internal", 8443, "POST /orders/{id}/cancel");
    let original = registry.breaker("orders", &key);

    let decoded = TargetKey::parse(&key.to_string()).unwrap();
    assert_eq!(decoded, key);
    assert!(Arc::ptr_eq(&original, &registry.breaker("orders", &decoded)));
    assert_eq!(registry.len(), 1);
}

#[test]
fn methods_of_one_instance_get_separate_breakers() {
    let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::builder().build());
    let list = registry.breaker("orders", &TargetKey::method("10.0.0.1", 80, "GET /orders"));
    let create = registry.breaker("orders", &TargetKey::method("10.0.0.1", 80, "POST /orders"));

    list.force_open();
    assert!(list.is_open());
    assert!(!create.is_open());
    assert_eq!(registry.len(), 2);
}

#[test]
fn client_configs_apply_to_breakers_they_create() {
    let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::builder().build())
        .with_client_config(
            "billing",
            CircuitBreakerConfig::builder()
                .name("billing")
                .minimum_number_of_calls(5)
                .build(),
        );

    let billing = registry.breaker("billing", &TargetKey::method("10.0.0.2", 80, "GET /invoices"));
    let orders = registry.breaker("orders", &TargetKey::method("10.0.0.3", 80, "GET /orders"));

    assert_eq!(billing.config().minimum_number_of_calls(), 5);
    assert_eq!(orders.config().minimum_number_of_calls(), 100);
}

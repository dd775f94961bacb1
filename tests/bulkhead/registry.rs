use std::sync::Arc;
use steadycall_bulkhead::{BulkheadConfig, BulkheadRegistry};
use steadycall_core::TargetKey;

#[test]
fn methods_share_their_instance_bulkhead() {
    let registry = BulkheadRegistry::new(BulkheadConfig::builder().max_concurrent_calls(2).build());

    let get = registry.bulkhead("orders", &TargetKey::method("10.4.0.1", 8080, "GET /orders"));
    let post = registry.bulkhead("orders", &TargetKey::method("10.4.0.1", 8080, "POST /orders"));
    let other = registry.bulkhead("orders", &TargetKey::instance("10.4.0.2", 8080));

    assert!(Arc::ptr_eq(&get, &post));
    assert!(!Arc::ptr_eq(&get, &other));
    assert_eq!(registry.len(), 2);

    let _a = get.try_acquire().unwrap();
    let _b = post.try_acquire().unwrap();
    assert!(get.try_acquire().is_err());
    assert_eq!(other.available_permits(), 2);
}

#[test]
fn first_client_configures_the_instance() {
    let registry = BulkheadRegistry::new(BulkheadConfig::builder().build()).with_client_config(
        "reports",
        BulkheadConfig::builder().max_concurrent_calls(1).build(),
    );

    let reports = registry.bulkhead("reports", &TargetKey::instance("10.4.0.9", 8080));
    let orders = registry.bulkhead("orders", &TargetKey::instance("10.4.1.9", 8080));

    assert_eq!(reports.config().max_concurrent_calls(), 1);
    assert_eq!(orders.config().max_concurrent_calls(), 25);
    assert!(registry
        .get(&TargetKey::instance("10.4.0.9", 8080))
        .is_some());
}

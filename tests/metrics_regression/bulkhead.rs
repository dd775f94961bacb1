use super::helpers::*;
use serial_test::serial;
use steadycall_bulkhead::{Bulkhead, BulkheadConfig};
use steadycall_core::TargetKey;

#[test]
#[serial]
fn bulkhead_metrics_exist() {
    init_recorder();

    let key = TargetKey::instance("10.9.0.2", 8080);
    let bulkhead = Bulkhead::new(
        key.clone(),
        BulkheadConfig::builder().max_concurrent_calls(1).build(),
    );

    let permit = bulkhead.try_acquire().unwrap();
    assert!(bulkhead.try_acquire().is_err());
    drop(permit);

    let label = key.to_string();
    assert_counter_exists("bulkhead_calls_permitted_total");
    assert_metric_has_label("bulkhead_calls_permitted_total", "bulkhead", &label);
    assert_counter_exists("bulkhead_calls_rejected_total");
    assert_metric_has_label("bulkhead_calls_rejected_total", "bulkhead", &label);
    assert_gauge_exists("bulkhead_concurrent_calls");
}

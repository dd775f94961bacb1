use super::helpers::*;
use serial_test::serial;
use steadycall::{Coordinator, Dispatch, Endpoint, OutboundRequest};
use steadycall_core::{ServiceInstance, TransportError};
use steadycall_loadbalancer::StaticDirectory;
use tower::service_fn;

#[tokio::test]
#[serial]
async fn coordinator_metrics_exist() {
    init_recorder();

    let directory = StaticDirectory::new()
        .with_service("ledger", vec![ServiceInstance::new("10.9.0.3", 8080)]);
    let coordinator = Coordinator::builder("ledger", directory).build(service_fn(
        |_: Dispatch<()>| async { Ok::<u16, TransportError>(200) },
    ));

    coordinator
        .invoke(OutboundRequest::empty("ledger", Endpoint::get("/balance")))
        .await
        .unwrap();

    assert_counter_exists("steadycall_calls_total");
    assert_metric_has_label("steadycall_calls_total", "client", "ledger");
    assert_metric_has_label("steadycall_calls_total", "outcome", "success");
    assert_histogram_exists("steadycall_call_duration_seconds");

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "ledger");
    assert_metric_has_label("retry_calls_total", "result", "success");
}

use super::{two_instances, Behavior, Scripted};
use std::time::Duration;
use steadycall::{ClientsSettings, Coordinator, Endpoint, OutboundRequest};
use steadycall_core::TargetKey;

const DOCUMENT: &str = r#"{
    "configs": {
        "orders": {
            "retryable_paths": ["/orders/*/cancel", "/search/**"],
            "connect_timeout_ms": 250,
            "response_timeout_ms": 1500,
            "retry": { "max_attempts": 4, "wait_duration_ms": 50 },
            "circuit_breaker": {
                "minimum_number_of_calls": 4,
                "wait_duration_in_open_ms": 30000
            },
            "bulkhead": { "max_concurrent_calls": 2 }
        },
        "billing": {
            "service_name": "billing-v2"
        }
    }
}"#;

fn clients() -> ClientsSettings {
    serde_json::from_str(DOCUMENT).unwrap()
}

fn orders(transport: Scripted) -> Coordinator<Scripted> {
    let clients = clients();
    Coordinator::builder("orders", two_instances())
        .settings(clients.client("orders").unwrap())
        .build(transport)
}

#[test]
fn clients_are_read_by_name() {
    let clients = clients();
    assert_eq!(clients.configs.len(), 2);
    assert!(clients.client("shipping").is_none());

    let billing = clients.client("billing").unwrap();
    assert_eq!(billing.service_name_or("billing"), "billing-v2");
    assert_eq!(billing.retry.max_attempts, 3);
    assert_eq!(billing.response_timeout_ms, 8_000);

    let orders = clients.client("orders").unwrap();
    assert_eq!(orders.service_name_or("orders"), "orders");
}

#[test]
fn timeouts_reach_the_transport_options() {
    let coordinator = orders(Scripted::new(Behavior::Status(200)));
    let options = coordinator.transport_options();
    assert_eq!(options.connect_timeout, Duration::from_millis(250));
    assert_eq!(options.response_timeout, Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn configured_paths_make_posts_retryable() {
    let transport = Scripted::new(Behavior::ResponseTimeout);
    let coordinator = orders(transport.clone());

    let _ = coordinator
        .invoke(OutboundRequest::empty("orders", Endpoint::post("/orders/9/cancel")))
        .await;
    assert_eq!(transport.dispatch_count(), 4);

    let _ = coordinator
        .invoke(OutboundRequest::empty("orders", Endpoint::post("/search/orders/recent")))
        .await;
    assert_eq!(transport.dispatch_count(), 8);

    let _ = coordinator
        .invoke(OutboundRequest::empty("orders", Endpoint::post("/orders")))
        .await;
    assert_eq!(transport.dispatch_count(), 9);
}

#[tokio::test(start_paused = true)]
async fn breaker_and_bulkhead_sections_configure_the_registries() {
    let coordinator = orders(Scripted::new(Behavior::Status(200)));
    coordinator
        .invoke(OutboundRequest::empty("orders", Endpoint::get("/orders")))
        .await
        .unwrap();

    let breaker_config = coordinator.circuit_breakers().config_for("orders");
    assert_eq!(breaker_config.minimum_number_of_calls(), 4);
    assert_eq!(breaker_config.wait_duration_in_open(), Duration::from_secs(30));

    let bulkhead = coordinator
        .bulkheads()
        .bulkhead("orders", &TargetKey::instance(super::HOST_A, 8080));
    assert_eq!(bulkhead.config().max_concurrent_calls(), 2);
}

use super::{two_instances, Behavior, Scripted};
use std::time::Duration;
use steadycall::{Coordinator, Endpoint, Fallback, FallbackLayer, InvocationError, OutboundRequest};
use steadycall_retry::RetryConfig;
use tower::{Service, ServiceBuilder, ServiceExt};

fn quick_retry() -> RetryConfig {
    RetryConfig::builder()
        .max_attempts(2)
        .wait_duration(Duration::from_millis(10))
        .build()
}

#[tokio::test(start_paused = true)]
async fn fallback_answers_exhausted_calls() {
    let transport = Scripted::new(Behavior::Refused);
    let mut service = ServiceBuilder::new()
        .layer(FallbackLayer::new(Fallback::from_error(|err: &InvocationError| {
            if err.is_circuit_open() { 503u16 } else { 502 }
        })))
        .layer(Coordinator::builder("orders", two_instances()).retry(quick_retry()).layer())
        .service(transport.clone());

    let status = ServiceExt::<OutboundRequest<()>>::ready(&mut service)
        .await
        .unwrap()
        .call(OutboundRequest::empty("orders", Endpoint::get("/orders")))
        .await
        .unwrap();

    assert_eq!(status, 502);
    assert_eq!(transport.dispatch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn declining_fallback_passes_the_error_through() {
    let service = ServiceBuilder::new()
        .layer(FallbackLayer::new(Fallback::new(|err: &InvocationError| {
            err.is_bulkhead_full().then_some(429u16)
        })))
        .layer(Coordinator::builder("orders", two_instances()).retry(quick_retry()).layer())
        .service(Scripted::new(Behavior::Refused));

    let err = service
        .oneshot(OutboundRequest::empty("orders", Endpoint::get("/orders")))
        .await
        .unwrap_err();
    assert!(matches!(err, InvocationError::ConnectFailure { .. }));
}

#[tokio::test(start_paused = true)]
async fn invoke_with_fallback_leaves_successes_alone() {
    let coordinator = Coordinator::builder("orders", two_instances())
        .retry(quick_retry())
        .build(Scripted::new(Behavior::Status(201)));
    let fallback = Fallback::value(599u16);

    let status = coordinator
        .invoke_with_fallback(
            OutboundRequest::empty("orders", Endpoint::post("/orders")),
            &fallback,
        )
        .await
        .unwrap();
    assert_eq!(status, 201);
}

#[tokio::test(start_paused = true)]
async fn layers_compose_with_tower_middleware() {
    let transport = Scripted::new(Behavior::Status(200));
    let service = ServiceBuilder::new()
        .concurrency_limit(4)
        .layer(Coordinator::builder("orders", two_instances()).layer())
        .service(transport.clone());

    let calls = (0..10).map(|i| {
        service.clone().oneshot(OutboundRequest::empty(
            "orders",
            Endpoint::get(format!("/orders/{i}")),
        ))
    });
    let results = futures::future::join_all(calls).await;

    assert!(results.into_iter().all(|status| status.unwrap() == 200));
    assert_eq!(transport.dispatch_count(), 10);
}

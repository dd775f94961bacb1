//! Calls a two-instance service where one instance refuses connections.
//! Run with: cargo run --example invoke
//! With more detail: RUST_LOG=debug cargo run --example invoke

use std::time::Duration;
use steadycall::{
    ClientSettings, Coordinator, Dispatch, Endpoint, Fallback, InvocationError, OutboundRequest,
};
use steadycall_core::{ServiceInstance, TransportError};
use steadycall_loadbalancer::StaticDirectory;
use tower::service_fn;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let directory = StaticDirectory::new().with_service(
        "inventory",
        vec![
            ServiceInstance::new("10.20.0.11", 8080),
            ServiceInstance::new("10.20.1.11", 8080),
        ],
    );

    let settings = ClientSettings {
        response_timeout_ms: 1_000,
        ..ClientSettings::default()
    };

    // 10.20.0.11 is down; the other instance answers after a short delay.
    let transport = service_fn(|dispatch: Dispatch<()>| async move {
        if dispatch.instance.host() == "10.20.0.11" {
            return Err(TransportError::connect("connection refused"));
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        println!(
            "{} served {} (attempt {})",
            dispatch.instance, dispatch.endpoint, dispatch.attempt
        );
        Ok::<u16, TransportError>(200)
    });

    let coordinator = Coordinator::builder("inventory", directory)
        .settings(&settings)
        .build(transport);

    for i in 1..=5 {
        let request = OutboundRequest::empty("inventory", Endpoint::get(format!("/items/{i}")));
        match coordinator.invoke(request).await {
            Ok(status) => println!("call {i}: status {status}"),
            Err(err) => println!("call {i}: failed: {err}"),
        }
    }

    for key in coordinator.circuit_breakers().keys() {
        if let Some(breaker) = coordinator.circuit_breakers().get(&key) {
            let metrics = breaker.metrics();
            println!(
                "{key}: {:?}, {} calls, failure rate {:.2}",
                metrics.state, metrics.total_calls, metrics.failure_rate
            );
        }
    }

    // Posting is not idempotent, but a refused connection sent nothing.
    let fallback = Fallback::from_error(|err: &InvocationError| {
        println!("fallback for: {err}");
        503u16
    });
    let status = coordinator
        .invoke_with_fallback(
            OutboundRequest::empty("inventory", Endpoint::post("/items")),
            &fallback,
        )
        .await;
    println!("post: {status:?}");
}

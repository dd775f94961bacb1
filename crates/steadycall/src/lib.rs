//! Resilient invocation of remote services.
//!
//! `steadycall` runs every logical call through one pipeline:
//!
//! 1. **Select** an instance from the service directory with the
//!    [`Selector`](steadycall_loadbalancer::Selector), spreading the attempts
//!    of a call over hosts and subnets and away from unhealthy instances.
//! 2. **Bulkhead** the instance: a bounded number of calls run against it at
//!    once.
//! 3. **Circuit break** per instance and method: failing targets are cut off
//!    for a while, then tried again.
//! 4. **Dispatch** through the transport, bounded by the connect and
//!    response timeouts.
//! 5. **Retry** by failure kind. Failures where nothing was sent (circuit
//!    open, bulkhead full, connection failed) are always retried. Failures
//!    after the request went out, non-2xx statuses included, only when the
//!    endpoint is retryable.
//!
//! The components live in their own crates and are usable alone:
//! [`steadycall_circuitbreaker`], [`steadycall_bulkhead`],
//! [`steadycall_retry`] and [`steadycall_loadbalancer`].
//!
//! # Paths
//!
//! - [`Coordinator::invoke`] for request/response transports, which are
//!   `tower::Service<Dispatch<B>>`. The coordinator is a tower service
//!   itself and [`InvocationLayer`] builds it inside a `ServiceBuilder`.
//! - [`Coordinator::invoke_stream`] for [`StreamTransport`]s.
//! - [`BlockingClient`] for synchronous callers.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use steadycall::{ClientSettings, Coordinator, Dispatch, Endpoint, OutboundRequest};
//! use steadycall_core::{ServiceInstance, TransportError};
//! use steadycall_loadbalancer::StaticDirectory;
//! use tower::service_fn;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let directory = StaticDirectory::new().with_service(
//!     "orders",
//!     vec![
//!         ServiceInstance::new("10.0.0.1", 8080),
//!         ServiceInstance::new("10.0.1.1", 8080),
//!     ],
//! );
//!
//! let settings: ClientSettings = serde_json::from_str(r#"{
//!     "response_timeout_ms": 2000,
//!     "retryable_paths": ["/orders/*/cancel"],
//!     "retry": { "max_attempts": 3, "wait_duration_ms": 100 }
//! }"#).unwrap();
//!
//! let transport = service_fn(|dispatch: Dispatch<String>| async move {
//!     if dispatch.instance.host() == "10.0.0.1" {
//!         Err(TransportError::connect("connection refused"))
//!     } else {
//!         Ok::<u16, TransportError>(202)
//!     }
//! });
//!
//! let coordinator = Coordinator::builder("orders", directory)
//!     .settings(&settings)
//!     .build(transport);
//!
//! let request = OutboundRequest::new(
//!     "orders",
//!     Endpoint::post("/orders/42/cancel"),
//!     String::from("{}"),
//! );
//! assert_eq!(coordinator.invoke(request).await.unwrap(), 202);
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `metrics`: call counters and latency histograms through the `metrics`
//!   facade, forwarded to every component crate.

mod blocking;
mod coordinator;
mod endpoint;
mod fallback;
mod layer;
mod paths;
mod settings;
mod stream;
mod transport;

pub use blocking::BlockingClient;
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use endpoint::{Endpoint, Method, OutboundRequest};
pub use fallback::{Fallback, FallbackLayer, FallbackService};
pub use layer::InvocationLayer;
pub use paths::{PathPattern, RetryablePaths};
pub use settings::{
    BulkheadSettings, CircuitBreakerSettings, ClientSettings, ClientsSettings, RetrySettings,
    WindowKind,
};
pub use transport::{
    Dispatch, StreamTransport, TransportOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT,
};

pub use steadycall_core::{CorrelationId, InvocationError, ServiceInstance, StatusResponse, TransportError};

#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_histogram};
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "steadycall_calls_total",
            "Total number of logical calls finished, by outcome"
        );
        describe_histogram!(
            "steadycall_call_duration_seconds",
            "Duration of logical calls including retries and waits"
        );
    });
}

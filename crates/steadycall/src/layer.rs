use crate::coordinator::{Coordinator, Shared};
use std::fmt;
use std::sync::Arc;
use tower_layer::Layer;

/// Wraps transports into [`Coordinator`]s.
///
/// Every coordinator produced by one layer shares the selector, breaker and
/// bulkhead registries and the retry configuration.
///
/// ```rust
/// use steadycall::{Coordinator, Dispatch, Endpoint, OutboundRequest};
/// use steadycall_core::{ServiceInstance, TransportError};
/// use steadycall_loadbalancer::StaticDirectory;
/// use tower::{service_fn, ServiceBuilder, ServiceExt};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let directory = StaticDirectory::new()
///     .with_service("orders", vec![ServiceInstance::new("10.0.0.1", 8080)]);
///
/// let service = ServiceBuilder::new()
///     .layer(Coordinator::builder("orders", directory).layer())
///     .service(service_fn(|_: Dispatch<()>| async { Ok::<u16, TransportError>(204) }));
///
/// let status = service
///     .oneshot(OutboundRequest::empty("orders", Endpoint::get("/orders")))
///     .await
///     .unwrap();
/// assert_eq!(status, 204);
/// # }
/// ```
#[derive(Clone)]
pub struct InvocationLayer {
    shared: Arc<Shared>,
}

impl InvocationLayer {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl<T> Layer<T> for InvocationLayer {
    type Service = Coordinator<T>;

    fn layer(&self, transport: T) -> Self::Service {
        Coordinator::from_shared(transport, Arc::clone(&self.shared))
    }
}

impl fmt::Debug for InvocationLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationLayer")
            .field("client", &self.shared.client)
            .finish_non_exhaustive()
    }
}

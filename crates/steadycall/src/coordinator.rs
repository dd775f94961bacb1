use crate::endpoint::{Endpoint, OutboundRequest};
use crate::fallback::Fallback;
use crate::layer::InvocationLayer;
use crate::paths::RetryablePaths;
use crate::settings::ClientSettings;
use crate::transport::{Dispatch, TransportOptions};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use steadycall_bulkhead::{BulkheadConfig, BulkheadRegistry};
use steadycall_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, Permit};
use steadycall_core::{
    CorrelationId, FailureKind, InvocationError, ServiceInstance, StatusResponse, TransportError,
};
use steadycall_loadbalancer::{prefer_version, BreakerHealth, InstanceDirectory, Selector};
use steadycall_retry::{Outcome, RetryConfig, RetryContext, RetryDecision};
use tokio::time::Instant;
use tower::ServiceExt;
use tower_service::Service;

#[cfg(feature = "metrics")]
use metrics::{counter, histogram};

/// Everything a coordinator shares with its clones.
pub(crate) struct Shared {
    pub(crate) client: String,
    pub(crate) directory: Arc<dyn InstanceDirectory>,
    pub(crate) selector: Arc<Selector>,
    pub(crate) breakers: Arc<CircuitBreakerRegistry>,
    pub(crate) bulkheads: Arc<BulkheadRegistry>,
    pub(crate) retry: Arc<RetryConfig>,
    pub(crate) options: TransportOptions,
    pub(crate) retryable_paths: RetryablePaths,
}

impl Shared {
    pub(crate) fn is_retryable(&self, endpoint: &Endpoint) -> bool {
        endpoint.is_retryable() || self.retryable_paths.matches(endpoint.path())
    }

    /// Picks the instance for the next attempt of a call.
    pub(crate) fn select(
        &self,
        service: &str,
        candidates: &[ServiceInstance],
        correlation_id: &CorrelationId,
        method: &str,
    ) -> Result<ServiceInstance, InvocationError> {
        let health = BreakerHealth::new(&self.breakers, method);
        self.selector
            .select(candidates, correlation_id, &health)
            .map_err(|err| err.for_service(service))
    }
}

/// Runs logical calls against a service through selection, bulkheading,
/// circuit breaking and retries.
///
/// Each call lists the service's instances once, then loops: select an
/// instance, take a bulkhead slot on it, take a permission from the breaker
/// of the instance and method, dispatch through the transport, classify the
/// outcome, and either return or wait and go again. Rejections by the
/// bulkhead or the breaker never reach the wire and are retried like
/// connection failures; the next selection moves away from the rejecting
/// instance.
///
/// The transport is a `tower::Service<Dispatch<B>>`. The coordinator is
/// itself a `tower::Service<OutboundRequest<B>>`.
///
/// ```rust
/// use steadycall::{Coordinator, Dispatch, Endpoint, OutboundRequest};
/// use steadycall_core::{ServiceInstance, TransportError};
/// use steadycall_loadbalancer::StaticDirectory;
/// use tower::service_fn;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let directory = StaticDirectory::new()
///     .with_service("orders", vec![ServiceInstance::new("10.0.0.1", 8080)]);
///
/// let transport = service_fn(|dispatch: Dispatch<()>| async move {
///     let _ = dispatch.instance;
///     Ok::<u16, TransportError>(200)
/// });
///
/// let coordinator = Coordinator::builder("orders", directory).build(transport);
/// let status = coordinator
///     .invoke(OutboundRequest::empty("orders", Endpoint::get("/orders")))
///     .await
///     .unwrap();
/// assert_eq!(status, 200);
/// # }
/// ```
pub struct Coordinator<T> {
    pub(crate) transport: T,
    pub(crate) shared: Arc<Shared>,
}

impl<T: Clone> Clone for Coordinator<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Coordinator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("client", &self.shared.client)
            .field("options", &self.shared.options)
            .field("retryable_paths", &self.shared.retryable_paths)
            .finish_non_exhaustive()
    }
}

impl Coordinator<()> {
    /// Starts configuring a coordinator for `client`, resolving instances
    /// through `directory`.
    pub fn builder<D>(client: impl Into<String>, directory: D) -> CoordinatorBuilder
    where
        D: InstanceDirectory + 'static,
    {
        CoordinatorBuilder::new(client, directory)
    }
}

impl<T> Coordinator<T> {
    pub(crate) fn from_shared(transport: T, shared: Arc<Shared>) -> Self {
        Self { transport, shared }
    }

    pub fn client(&self) -> &str {
        &self.shared.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn selector(&self) -> &Arc<Selector> {
        &self.shared.selector
    }

    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.shared.breakers
    }

    pub fn bulkheads(&self) -> &Arc<BulkheadRegistry> {
        &self.shared.bulkheads
    }

    pub fn transport_options(&self) -> TransportOptions {
        self.shared.options
    }

    /// True when response-phase failures of `endpoint` may be retried.
    pub fn is_retryable(&self, endpoint: &Endpoint) -> bool {
        self.shared.is_retryable(endpoint)
    }
}

impl<T> Coordinator<T> {
    /// Runs one logical call to completion.
    ///
    /// Non-success statuses surface as [`InvocationError::Application`].
    /// They are retried only for retryable calls.
    pub async fn invoke<B>(&self, request: OutboundRequest<B>) -> Result<T::Response, InvocationError>
    where
        T: Service<Dispatch<B>, Error = TransportError> + Clone,
        T::Response: StatusResponse,
        B: Clone,
    {
        let shared = &self.shared;
        let correlation_id = request
            .correlation_id()
            .cloned()
            .unwrap_or_else(CorrelationId::generate);
        let retryable = shared.is_retryable(request.endpoint());
        let method = request.endpoint().method_id();
        let started = Instant::now();

        let candidates = prefer_version(
            shared.directory.list_instances(request.service()).await,
            request.version(),
        );
        let mut retry = RetryContext::new(Arc::clone(&shared.retry), retryable);

        loop {
            let attempt = retry.attempts() + 1;
            let result = self
                .attempt(&request, &candidates, &correlation_id, &method, attempt)
                .await;

            match retry.on_outcome(Outcome::of(&result)) {
                RetryDecision::Retry { wait } => {
                    tracing::debug!(
                        client = %shared.client,
                        correlation_id = %correlation_id,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        outcome = outcome_label(&result),
                        "retrying call"
                    );
                    tokio::time::sleep(wait).await;
                }
                RetryDecision::DoNotRetry => {
                    if let Err(err) = &result {
                        tracing::info!(
                            client = %shared.client,
                            correlation_id = %correlation_id,
                            attempts = attempt,
                            error = %err,
                            "call failed"
                        );
                    }

                    #[cfg(feature = "metrics")]
                    {
                        counter!(
                            "steadycall_calls_total",
                            "client" => shared.client.clone(),
                            "outcome" => outcome_label(&result)
                        )
                        .increment(1);
                        histogram!("steadycall_call_duration_seconds", "client" => shared.client.clone())
                            .record(started.elapsed().as_secs_f64());
                    }
                    #[cfg(not(feature = "metrics"))]
                    let _ = started;

                    return result;
                }
            }
        }
    }

    /// Like [`invoke`](Self::invoke), handing a terminal error to `fallback`.
    pub async fn invoke_with_fallback<B>(
        &self,
        request: OutboundRequest<B>,
        fallback: &Fallback<T::Response>,
    ) -> Result<T::Response, InvocationError>
    where
        T: Service<Dispatch<B>, Error = TransportError> + Clone,
        T::Response: StatusResponse,
        B: Clone,
    {
        fallback.recover(self.invoke(request).await)
    }

    async fn attempt<B>(
        &self,
        request: &OutboundRequest<B>,
        candidates: &[ServiceInstance],
        correlation_id: &CorrelationId,
        method: &str,
        attempt: usize,
    ) -> Result<T::Response, InvocationError>
    where
        T: Service<Dispatch<B>, Error = TransportError> + Clone,
        T::Response: StatusResponse,
        B: Clone,
    {
        let shared = &self.shared;
        let instance = shared.select(request.service(), candidates, correlation_id, method)?;
        let target = instance.key();

        let bulkhead = shared.bulkheads.bulkhead(&shared.client, &target);
        let _slot = bulkhead.acquire().await.map_err(InvocationError::from)?;

        let breaker = shared
            .breakers
            .breaker(&shared.client, &instance.method_key(method));
        let permit = breaker.acquire_permission()?;
        let mut permission = Permission::new(Arc::clone(&breaker), permit);

        tracing::debug!(
            client = %shared.client,
            correlation_id = %correlation_id,
            target = %target,
            endpoint = %request.endpoint(),
            attempt,
            "dispatching"
        );

        let dispatch = Dispatch {
            instance,
            endpoint: request.endpoint().clone(),
            body: request.body().clone(),
            correlation_id: correlation_id.clone(),
            attempt,
            options: shared.options,
        };
        let limit = shared.options.attempt_timeout();
        let mut transport = self.transport.clone();

        let started = Instant::now();
        permission.dispatched(started);
        let exchange = async move {
            match transport.ready().await {
                Ok(ready) => ready.call(dispatch).await,
                Err(err) => Err(err),
            }
        };
        let result = tokio::time::timeout(limit, exchange).await;
        let elapsed = started.elapsed();
        let permit = permission.resolved();

        match result {
            Err(_) => {
                breaker.on_error(permit, elapsed);
                Err(InvocationError::ResponseFailure {
                    key: target,
                    source: TransportError::response_timeout(format!(
                        "no response within {}ms",
                        limit.as_millis()
                    )),
                })
            }
            Ok(Err(err)) => {
                breaker.on_error(permit, elapsed);
                Err(InvocationError::transport(target, err))
            }
            Ok(Ok(response)) => {
                breaker.on_result(permit, elapsed, &response);
                if !response.is_success() {
                    Err(InvocationError::Application {
                        key: target,
                        status: response.status(),
                    })
                } else {
                    Ok(response)
                }
            }
        }
    }
}

impl<T, B> Service<OutboundRequest<B>> for Coordinator<T>
where
    T: Service<Dispatch<B>, Error = TransportError> + Clone + Send + Sync + 'static,
    T::Response: StatusResponse + Send + 'static,
    T::Future: Send + 'static,
    B: Clone + Send + Sync + 'static,
{
    type Response = T::Response;
    type Error = InvocationError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    // Transport readiness is awaited per attempt, once the target is known.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: OutboundRequest<B>) -> Self::Future {
        let coordinator = self.clone();
        Box::pin(async move { coordinator.invoke(request).await })
    }
}

enum PermissionState {
    Held,
    InFlight(Instant),
    Resolved,
}

/// Returns an unresolved breaker permit when the attempt is dropped.
struct Permission {
    breaker: Arc<CircuitBreaker>,
    permit: Permit,
    state: PermissionState,
}

impl Permission {
    fn new(breaker: Arc<CircuitBreaker>, permit: Permit) -> Self {
        Self {
            breaker,
            permit,
            state: PermissionState::Held,
        }
    }

    fn dispatched(&mut self, at: Instant) {
        self.state = PermissionState::InFlight(at);
    }

    /// Hands the permit over for the outcome to be recorded.
    fn resolved(&mut self) -> Permit {
        self.state = PermissionState::Resolved;
        self.permit
    }
}

impl Drop for Permission {
    fn drop(&mut self) {
        match self.state {
            PermissionState::Held => self.breaker.release_permission(self.permit),
            PermissionState::InFlight(started) => {
                self.breaker.on_cancelled(self.permit, started.elapsed())
            }
            PermissionState::Resolved => {}
        }
    }
}

pub(crate) fn outcome_label<R>(result: &Result<R, InvocationError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(err) => match err.kind() {
            FailureKind::NoInstances => "no_instances",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::BulkheadFull => "bulkhead_full",
            FailureKind::ConnectFailure => "connect_failure",
            FailureKind::ResponseFailure => "response_failure",
            FailureKind::Application => "application",
        },
    }
}

/// Builder for [`Coordinator`] and [`InvocationLayer`].
pub struct CoordinatorBuilder {
    client: String,
    directory: Arc<dyn InstanceDirectory>,
    selector: Option<Arc<Selector>>,
    breakers: Option<Arc<CircuitBreakerRegistry>>,
    bulkheads: Option<Arc<BulkheadRegistry>>,
    breaker_config: Option<CircuitBreakerConfig>,
    bulkhead_config: Option<BulkheadConfig>,
    retry: Option<RetryConfig>,
    options: TransportOptions,
    retryable_paths: RetryablePaths,
}

impl CoordinatorBuilder {
    /// Defaults:
    /// - a fresh [`Selector`] in health-aware mode
    /// - fresh breaker and bulkhead registries with default configs
    /// - default retry config, named after the client
    /// - 500ms connect and 8s response timeouts
    /// - no retryable paths beyond `GET` and marked endpoints
    pub fn new<D>(client: impl Into<String>, directory: D) -> Self
    where
        D: InstanceDirectory + 'static,
    {
        Self {
            client: client.into(),
            directory: Arc::new(directory),
            selector: None,
            breakers: None,
            bulkheads: None,
            breaker_config: None,
            bulkhead_config: None,
            retry: None,
            options: TransportOptions::default(),
            retryable_paths: RetryablePaths::default(),
        }
    }

    /// Shares a selector with other coordinators.
    pub fn selector(mut self, selector: Arc<Selector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Shares a breaker registry with other coordinators.
    ///
    /// A shared registry keeps its own configs, so
    /// [`circuit_breaker_config`](Self::circuit_breaker_config) and the
    /// breaker section of [`settings`](Self::settings) no longer apply.
    pub fn circuit_breakers(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(registry);
        self
    }

    /// Shares a bulkhead registry with other coordinators.
    pub fn bulkheads(mut self, registry: Arc<BulkheadRegistry>) -> Self {
        self.bulkheads = Some(registry);
        self
    }

    /// Config of the breakers created for this client's own registry.
    pub fn circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = Some(config);
        self
    }

    /// Config of the bulkheads created for this client's own registry.
    pub fn bulkhead_config(mut self, config: BulkheadConfig) -> Self {
        self.bulkhead_config = Some(config);
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    pub fn transport_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn retryable_paths(mut self, paths: RetryablePaths) -> Self {
        self.retryable_paths = paths;
        self
    }

    /// Applies every section of `settings`.
    pub fn settings(self, settings: &ClientSettings) -> Self {
        let name = self.client.clone();
        self.transport_options(settings.transport_options())
            .retryable_paths(settings.retryable_paths())
            .retry(settings.retry.config(&name))
            .circuit_breaker_config(settings.circuit_breaker.config(&name))
            .bulkhead_config(settings.bulkhead.config(&name))
    }

    fn into_shared(self) -> Arc<Shared> {
        let client = self.client;
        let breakers = self.breakers.unwrap_or_else(|| {
            let config = self
                .breaker_config
                .unwrap_or_else(|| CircuitBreakerConfig::builder().name(client.as_str()).build());
            Arc::new(CircuitBreakerRegistry::new(config))
        });
        let bulkheads = self.bulkheads.unwrap_or_else(|| {
            let config = self
                .bulkhead_config
                .unwrap_or_else(|| BulkheadConfig::builder().name(client.as_str()).build());
            Arc::new(BulkheadRegistry::new(config))
        });
        let retry = self
            .retry
            .unwrap_or_else(|| RetryConfig::builder().name(client.as_str()).build());

        crate::describe_metrics();

        Arc::new(Shared {
            directory: self.directory,
            selector: self.selector.unwrap_or_else(|| Arc::new(Selector::new())),
            breakers,
            bulkheads,
            retry: Arc::new(retry),
            options: self.options,
            retryable_paths: self.retryable_paths,
            client,
        })
    }

    /// Builds a coordinator over `transport`.
    pub fn build<T>(self, transport: T) -> Coordinator<T> {
        Coordinator::from_shared(transport, self.into_shared())
    }

    /// Builds a layer that wraps transports into coordinators sharing this
    /// configuration and state.
    pub fn layer(self) -> InvocationLayer {
        InvocationLayer::new(self.into_shared())
    }
}

//! The streaming call path.
//!
//! Each attempt opens a fresh stream through a [`StreamTransport`], guarded
//! by the breaker of the chosen instance and holding a bulkhead slot while
//! it is alive. The retry operator drops a failed attempt's stream and
//! opens the next one after the wait.

use crate::coordinator::{Coordinator, Shared};
use crate::endpoint::OutboundRequest;
use crate::transport::{Dispatch, StreamTransport};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use steadycall_circuitbreaker::CircuitBreakerStreamExt;
use steadycall_core::{CorrelationId, InvocationError, ServiceInstance, StatusResponse};
use steadycall_loadbalancer::prefer_version;
use steadycall_retry::RetryStream;

type AttemptStream<R> = BoxStream<'static, Result<R, InvocationError>>;

#[derive(Clone)]
struct Attempts<T, B> {
    shared: Arc<Shared>,
    transport: T,
    request: OutboundRequest<B>,
    correlation_id: CorrelationId,
    method: String,
    candidates: Vec<ServiceInstance>,
    attempt: usize,
}

impl<T, B> Attempts<T, B>
where
    T: StreamTransport<B> + Clone + 'static,
    B: Clone + Send + 'static,
{
    fn next(&mut self) -> AttemptStream<T::Response> {
        self.attempt += 1;
        let shared = &self.shared;

        let instance = match shared.select(
            self.request.service(),
            &self.candidates,
            &self.correlation_id,
            &self.method,
        ) {
            Ok(instance) => instance,
            Err(err) => return stream::iter([Err(err)]).boxed(),
        };
        let target = instance.key();

        let slot = match shared.bulkheads.bulkhead(&shared.client, &target).try_acquire() {
            Ok(slot) => slot,
            Err(err) => return stream::iter([Err(InvocationError::from(err))]).boxed(),
        };
        let breaker = shared
            .breakers
            .breaker(&shared.client, &instance.method_key(&self.method));

        tracing::debug!(
            client = %shared.client,
            correlation_id = %self.correlation_id,
            target = %target,
            attempt = self.attempt,
            "opening stream"
        );

        let dispatch = Dispatch {
            instance,
            endpoint: self.request.endpoint().clone(),
            body: self.request.body().clone(),
            correlation_id: self.correlation_id.clone(),
            attempt: self.attempt,
            options: shared.options,
        };
        let transport = self.transport.clone();
        let failed_target = target.clone();

        // Opened on first poll, after the breaker granted permission.
        stream::once(async move { transport.open(dispatch) })
            .flatten()
            .map_err(move |err| InvocationError::transport(failed_target.clone(), err))
            .circuit_breaker(breaker)
            .map(move |item| {
                let _slot = &slot;
                match item {
                    Ok(response) if !response.is_success() => {
                        Err(InvocationError::Application {
                            key: target.clone(),
                            status: response.status(),
                        })
                    }
                    Ok(response) => Ok(response),
                    Err(err) => Err(InvocationError::from(err)),
                }
            })
            .boxed()
    }
}

impl<T> Coordinator<T> {
    /// Runs a streaming call.
    ///
    /// Failed attempts are retried under the same rules as
    /// [`invoke`](Self::invoke), and non-success items become
    /// [`InvocationError::Application`] errors. Items of an attempt are forwarded as they
    /// arrive; an error item either triggers the next attempt or ends the
    /// stream.
    pub fn invoke_stream<B>(&self, request: OutboundRequest<B>) -> AttemptStream<T::Response>
    where
        T: StreamTransport<B> + Clone + 'static,
        B: Clone + Send + Sync + 'static,
    {
        let retryable = self.shared.is_retryable(request.endpoint());
        let retry = Arc::clone(&self.shared.retry);
        let directory = Arc::clone(&self.shared.directory);
        let service = request.service().to_string();
        let version = request.version().map(str::to_string);
        let template = Attempts {
            shared: Arc::clone(&self.shared),
            transport: self.transport.clone(),
            correlation_id: request
                .correlation_id()
                .cloned()
                .unwrap_or_else(CorrelationId::generate),
            method: request.endpoint().method_id(),
            request,
            candidates: Vec::new(),
            attempt: 0,
        };

        stream::once(async move {
            prefer_version(directory.list_instances(&service).await, version.as_deref())
        })
            .flat_map(move |candidates| {
                let mut attempts = Attempts {
                    candidates,
                    ..template.clone()
                };
                RetryStream::new(Arc::clone(&retry), retryable, move || attempts.next())
            })
            .boxed()
    }
}

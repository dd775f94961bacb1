//! The seam between the coordinator and the wire.
//!
//! A request/response transport is any `tower::Service<Dispatch<B>>` whose
//! error is a [`TransportError`] and whose response exposes a status
//! through [`StatusResponse`]. Streaming transports implement
//! [`StreamTransport`] instead.

use crate::endpoint::Endpoint;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use steadycall_core::{CorrelationId, ServiceInstance, StatusResponse, TransportError};

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default time allowed for the response once connected.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(8);

/// Timeouts handed to the transport with every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

impl TransportOptions {
    pub fn new(connect_timeout: Duration, response_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            response_timeout,
        }
    }

    /// Upper bound of one attempt: connect plus response.
    pub fn attempt_timeout(&self) -> Duration {
        self.connect_timeout.saturating_add(self.response_timeout)
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT)
    }
}

/// One attempt of a call, aimed at a chosen instance.
#[derive(Debug, Clone)]
pub struct Dispatch<B> {
    pub instance: ServiceInstance,
    pub endpoint: Endpoint,
    pub body: B,
    pub correlation_id: CorrelationId,
    /// 1-based attempt number within the call.
    pub attempt: usize,
    pub options: TransportOptions,
}

/// A transport that answers a dispatch with a stream of results.
pub trait StreamTransport<B>: Send + Sync {
    type Response: StatusResponse + Send + 'static;

    /// Opens the exchange for `dispatch`.
    ///
    /// Nothing should be sent before the returned stream is first polled.
    fn open(&self, dispatch: Dispatch<B>) -> BoxStream<'static, Result<Self::Response, TransportError>>;
}

impl<B, T> StreamTransport<B> for Arc<T>
where
    T: StreamTransport<B> + ?Sized,
{
    type Response = T::Response;

    fn open(&self, dispatch: Dispatch<B>) -> BoxStream<'static, Result<Self::Response, TransportError>> {
        (**self).open(dispatch)
    }
}

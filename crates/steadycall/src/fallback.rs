//! Substitute responses for calls that failed for good.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use steadycall_core::InvocationError;
use tower_layer::Layer;
use tower_service::Service;

type Handler<R> = Arc<dyn Fn(&InvocationError) -> Option<R> + Send + Sync>;

/// Turns a terminal [`InvocationError`] into a substitute response.
///
/// The handler runs once, after retries are exhausted. Returning `None`
/// keeps the error.
///
/// ```rust
/// use steadycall::Fallback;
/// use steadycall_core::InvocationError;
///
/// let fallback = Fallback::new(|err: &InvocationError| {
///     err.is_circuit_open().then_some(503u16)
/// });
///
/// let open = InvocationError::CircuitOpen { key: "10.0.0.1:80#GET /".parse().unwrap() };
/// assert_eq!(fallback.recover(Err(open)).unwrap(), 503);
/// ```
pub struct Fallback<R> {
    handler: Handler<R>,
}

impl<R> Fallback<R> {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&InvocationError) -> Option<R> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Answers every failure with a response computed from the error.
    pub fn from_error<F>(f: F) -> Self
    where
        F: Fn(&InvocationError) -> R + Send + Sync + 'static,
    {
        Self::new(move |err| Some(f(err)))
    }

    /// Answers every failure with a clone of `value`.
    pub fn value(value: R) -> Self
    where
        R: Clone + Send + Sync + 'static,
    {
        Self::new(move |_| Some(value.clone()))
    }

    /// Applies the handler to a failed result.
    pub fn recover(&self, result: Result<R, InvocationError>) -> Result<R, InvocationError> {
        match result {
            Ok(response) => Ok(response),
            Err(err) => match (self.handler)(&err) {
                Some(substitute) => {
                    tracing::debug!(error = %err, "fallback substituted a response");
                    Ok(substitute)
                }
                None => Err(err),
            },
        }
    }
}

impl<R> Clone for Fallback<R> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<R> fmt::Debug for Fallback<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fallback").finish_non_exhaustive()
    }
}

/// Applies a [`Fallback`] to every call of the wrapped service.
#[derive(Debug, Clone)]
pub struct FallbackLayer<R> {
    fallback: Fallback<R>,
}

impl<R> FallbackLayer<R> {
    pub fn new(fallback: Fallback<R>) -> Self {
        Self { fallback }
    }
}

impl<S, R> Layer<S> for FallbackLayer<R> {
    type Service = FallbackService<S, R>;

    fn layer(&self, inner: S) -> Self::Service {
        FallbackService {
            inner,
            fallback: self.fallback.clone(),
        }
    }
}

/// Service produced by [`FallbackLayer`].
#[derive(Debug, Clone)]
pub struct FallbackService<S, R> {
    inner: S,
    fallback: Fallback<R>,
}

impl<S, Req, R> Service<Req> for FallbackService<S, R>
where
    S: Service<Req, Response = R, Error = InvocationError>,
    S::Future: Send + 'static,
    R: Send + 'static,
{
    type Response = R;
    type Error = InvocationError;
    type Future = BoxFuture<'static, Result<R, InvocationError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let fallback = self.fallback.clone();
        let future = self.inner.call(req);
        Box::pin(async move { fallback.recover(future.await) })
    }
}

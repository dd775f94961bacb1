//! Breaker gate for response streams.

use crate::{CircuitBreaker, CircuitBreakerError, Permit};
use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use steadycall_core::StatusResponse;

#[derive(Debug, Clone, Copy)]
enum Phase {
    Unpolled,
    Active { started: Instant, permit: Option<Permit> },
    Finished,
}

pin_project! {
    /// Stream returned by [`CircuitBreakerStreamExt::circuit_breaker`].
    ///
    /// Permission is requested on the first poll; the wrapped stream is not
    /// polled at all when it is denied. The first value is classified by its
    /// status; an error counts as a failure; completion without any value
    /// counts as a success. Dropping the stream before any outcome returns
    /// the permission.
    pub struct CircuitBreakerStream<S> {
        #[pin]
        inner: S,
        breaker: Arc<CircuitBreaker>,
        phase: Phase,
    }

    impl<S> PinnedDrop for CircuitBreakerStream<S> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Phase::Active { started, permit: Some(permit) } = *this.phase {
                this.breaker.on_cancelled(permit, started.elapsed());
            }
        }
    }
}

impl<S> CircuitBreakerStream<S> {
    pub fn new(inner: S, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            inner,
            breaker,
            phase: Phase::Unpolled,
        }
    }
}

impl<S, T, E> Stream for CircuitBreakerStream<S>
where
    S: Stream<Item = Result<T, E>>,
    T: StatusResponse,
{
    type Item = Result<T, CircuitBreakerError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        let (started, permit) = match *this.phase {
            Phase::Finished => return Poll::Ready(None),
            Phase::Unpolled => {
                let Some(permit) = this.breaker.try_acquire_permission() else {
                    *this.phase = Phase::Finished;
                    return Poll::Ready(Some(Err(CircuitBreakerError::OpenCircuit {
                        key: this.breaker.key().clone(),
                    })));
                };
                let started = Instant::now();
                *this.phase = Phase::Active {
                    started,
                    permit: Some(permit),
                };
                (started, Some(permit))
            }
            Phase::Active { started, permit } => (started, permit),
        };

        match this.inner.poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(value))) => {
                if let Some(permit) = permit {
                    this.breaker.on_result(permit, started.elapsed(), &value);
                    *this.phase = Phase::Active {
                        started,
                        permit: None,
                    };
                }
                Poll::Ready(Some(Ok(value)))
            }
            Poll::Ready(Some(Err(err))) => {
                if let Some(permit) = permit {
                    this.breaker.on_error(permit, started.elapsed());
                    *this.phase = Phase::Active {
                        started,
                        permit: None,
                    };
                }
                Poll::Ready(Some(Err(CircuitBreakerError::Inner(err))))
            }
            Poll::Ready(None) => {
                if let Some(permit) = permit {
                    this.breaker.on_success(permit, started.elapsed());
                }
                *this.phase = Phase::Finished;
                Poll::Ready(None)
            }
        }
    }
}

/// Adds [`circuit_breaker`](CircuitBreakerStreamExt::circuit_breaker) to
/// response streams.
pub trait CircuitBreakerStreamExt: Stream + Sized {
    /// Guards this stream with `breaker`.
    fn circuit_breaker(self, breaker: Arc<CircuitBreaker>) -> CircuitBreakerStream<Self> {
        CircuitBreakerStream::new(self, breaker)
    }
}

impl<S: Stream> CircuitBreakerStreamExt for S {}

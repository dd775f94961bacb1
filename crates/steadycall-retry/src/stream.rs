use crate::config::RetryConfig;
use crate::context::RetryContext;
use crate::policy::{Outcome, RetryDecision};
use futures::Stream;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use steadycall_core::{InvocationError, StatusResponse};
use tokio::time::Sleep;

pin_project! {
    /// Re-subscribes to a stream of attempt results until one may be
    /// handed to the caller.
    ///
    /// Every item is classified and run through the retry decision. A retry
    /// drops the current stream, waits, and opens a fresh one from the
    /// factory. An error that is not retried is forwarded and ends the
    /// stream; a response that is not retried is forwarded and the stream
    /// keeps flowing.
    #[must_use = "streams do nothing unless polled"]
    pub struct RetryStream<F, S> {
        factory: F,
        #[pin]
        current: Option<S>,
        #[pin]
        delay: Option<Sleep>,
        context: RetryContext,
        finished: bool,
    }
}

impl<F, S> RetryStream<F, S>
where
    F: FnMut() -> S,
{
    /// Wraps `factory`, which opens one attempt each time it is called.
    ///
    /// The first attempt is opened on the first poll.
    pub fn new(config: Arc<RetryConfig>, retryable: bool, factory: F) -> Self {
        Self {
            factory,
            current: None,
            delay: None,
            context: RetryContext::new(config, retryable),
            finished: false,
        }
    }

    /// Attempts opened so far.
    pub fn attempts(&self) -> usize {
        self.context.attempts()
    }
}

impl<F, S, T> Stream for RetryStream<F, S>
where
    F: FnMut() -> S,
    S: Stream<Item = Result<T, InvocationError>>,
    T: StatusResponse,
{
    type Item = Result<T, InvocationError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if *this.finished {
                return Poll::Ready(None);
            }

            if let Some(delay) = this.delay.as_mut().as_pin_mut() {
                ready!(delay.poll(cx));
                this.delay.set(None);
            }

            if this.current.is_none() {
                this.current.set(Some((this.factory)()));
            }
            let Some(current) = this.current.as_mut().as_pin_mut() else {
                continue;
            };

            let Some(item) = ready!(current.poll_next(cx)) else {
                *this.finished = true;
                return Poll::Ready(None);
            };

            match this.context.on_outcome(Outcome::of(&item)) {
                RetryDecision::Retry { wait } => {
                    this.current.set(None);
                    this.delay.set(Some(tokio::time::sleep(wait)));
                }
                RetryDecision::DoNotRetry => {
                    if item.is_err() {
                        *this.finished = true;
                    }
                    return Poll::Ready(Some(item));
                }
            }
        }
    }
}

/// Builds a [`RetryStream`] from an attempt factory.
pub fn retry_stream<F, S>(config: Arc<RetryConfig>, retryable: bool, factory: F) -> RetryStream<F, S>
where
    F: FnMut() -> S,
{
    RetryStream::new(config, retryable, factory)
}

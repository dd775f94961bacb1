//! Synchronous facade over a [`Coordinator`].

use crate::coordinator::Coordinator;
use crate::endpoint::OutboundRequest;
use crate::transport::Dispatch;
use std::io;
use steadycall_core::{InvocationError, StatusResponse, TransportError};
use tokio::runtime::{Builder, Runtime};
use tower_service::Service;

/// Drives calls to completion on the calling thread.
///
/// The client owns a small multi-threaded tokio runtime that runs the
/// retry timers and the transport. Any number of threads may call
/// [`invoke`](Self::invoke) at once; threads working on the same correlation
/// id spread their attempts over the instances together.
///
/// Must not be used from inside an async context.
pub struct BlockingClient<T> {
    coordinator: Coordinator<T>,
    runtime: Runtime,
}

impl<T> BlockingClient<T> {
    /// Wraps `coordinator` with a dedicated two-worker runtime.
    pub fn new(coordinator: Coordinator<T>) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("steadycall-blocking")
            .enable_all()
            .build()?;
        Ok(Self::with_runtime(coordinator, runtime))
    }

    pub fn with_runtime(coordinator: Coordinator<T>, runtime: Runtime) -> Self {
        Self {
            coordinator,
            runtime,
        }
    }

    pub fn coordinator(&self) -> &Coordinator<T> {
        &self.coordinator
    }

    /// Runs one logical call, blocking until it finishes.
    pub fn invoke<B>(&self, request: OutboundRequest<B>) -> Result<T::Response, InvocationError>
    where
        T: Service<Dispatch<B>, Error = TransportError> + Clone,
        T::Response: StatusResponse,
        B: Clone,
    {
        self.runtime.block_on(self.coordinator.invoke(request))
    }
}

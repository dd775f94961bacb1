//! Configuration for bulkheads.

use crate::events::BulkheadEvent;
use std::time::Duration;
use steadycall_core::events::{EventListeners, FnListener};

/// Configuration shared by every bulkhead created from it.
#[derive(Clone, Debug)]
pub struct BulkheadConfig {
    pub(crate) max_concurrent_calls: usize,
    pub(crate) max_queue_depth: usize,
    pub(crate) max_wait_duration: Option<Duration>,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    pub fn max_queue_depth(&self) -> usize {
        self.max_queue_depth
    }

    pub fn max_wait_duration(&self) -> Option<Duration> {
        self.max_wait_duration
    }

    /// Name of the client this configuration belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        BulkheadConfigBuilder::new().build()
    }
}

/// Builder for bulkhead configuration.
pub struct BulkheadConfigBuilder {
    max_concurrent_calls: usize,
    max_queue_depth: usize,
    max_wait_duration: Option<Duration>,
    name: String,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_concurrent_calls: 25,
            max_queue_depth: 0,
            max_wait_duration: None,
            name: "default".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Maximum number of calls running at once.
    ///
    /// Default: 25
    pub fn max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max.max(1);
        self
    }

    /// Maximum number of calls waiting for a slot. With `0` a saturated
    /// bulkhead rejects immediately.
    ///
    /// Default: 0
    pub fn max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    /// Longest time a queued call waits for a slot.
    ///
    /// If `None`, queued calls wait until a slot frees up.
    /// Default: None
    pub fn max_wait_duration(mut self, duration: Option<Duration>) -> Self {
        self.max_wait_duration = duration;
        self
    }

    /// Name of the client, used in logs and metrics labels.
    ///
    /// Default: "default"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a call obtains a slot.
    ///
    /// The callback receives the number of calls running, this one included.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallPermitted {
                concurrent_calls, ..
            } = event
            {
                f(*concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a call joins the wait queue.
    pub fn on_call_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallQueued { queue_depth, .. } = event {
                f(*queue_depth);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected.
    ///
    /// The callback receives the configured capacity.
    ///
    /// ```rust,no_run
    /// use steadycall_bulkhead::BulkheadConfig;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let rejections = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&rejections);
    ///
    /// let config = BulkheadConfig::builder()
    ///     .max_concurrent_calls(8)
    ///     .on_call_rejected(move |_| {
    ///         counter.fetch_add(1, Ordering::Relaxed);
    ///     })
    ///     .build();
    /// ```
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallRejected {
                max_concurrent_calls,
                ..
            } = event
            {
                f(*max_concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a slot is returned.
    pub fn on_call_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFinished { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BulkheadConfig {
        crate::describe_metrics();
        BulkheadConfig {
            max_concurrent_calls: self.max_concurrent_calls,
            max_queue_depth: self.max_queue_depth,
            max_wait_duration: self.max_wait_duration,
            name: self.name,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

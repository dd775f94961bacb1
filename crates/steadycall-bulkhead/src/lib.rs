//! Per-instance bulkheads.
//!
//! A bulkhead caps how many calls may be running against one instance at a
//! time, so a slow instance ties up a bounded share of the caller's
//! capacity instead of all of it. Calls beyond the cap wait in a bounded
//! queue; once the queue is full they are rejected with
//! [`BulkheadError::BulkheadFull`], which the retry engine treats as
//! "not sent, try elsewhere".
//!
//! # Example
//!
//! ```rust
//! use steadycall_bulkhead::{Bulkhead, BulkheadConfig};
//! use steadycall_core::TargetKey;
//!
//! # async fn example() {
//! let bulkhead = Bulkhead::new(
//!     TargetKey::instance("10.0.0.7", 8080),
//!     BulkheadConfig::builder()
//!         .max_concurrent_calls(10)
//!         .max_queue_depth(5)
//!         .build(),
//! );
//!
//! let answer = bulkhead.submit(async { 42 }).await.unwrap();
//! assert_eq!(answer, 42);
//! # }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;
use steadycall_core::TargetKey;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};

mod config;
mod error;
mod events;
mod registry;

pub use config::{BulkheadConfig, BulkheadConfigBuilder};
pub use error::{BulkheadError, Result};
pub use events::BulkheadEvent;
pub use registry::BulkheadRegistry;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "bulkhead_calls_permitted_total",
            "Total number of calls admitted by bulkheads"
        );
        describe_counter!(
            "bulkhead_calls_rejected_total",
            "Total number of calls rejected by bulkheads"
        );
        describe_gauge!(
            "bulkhead_concurrent_calls",
            "Calls currently holding a bulkhead slot"
        );
        describe_gauge!(
            "bulkhead_queue_depth",
            "Calls currently waiting for a bulkhead slot"
        );
    });
}

/// Bounded concurrency for one instance.
pub struct Bulkhead {
    key: TargetKey,
    label: String,
    semaphore: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    config: Arc<BulkheadConfig>,
}

impl Bulkhead {
    /// Creates a bulkhead for `key`.
    pub fn new(key: TargetKey, config: BulkheadConfig) -> Self {
        Self::with_shared_config(key, Arc::new(config))
    }

    pub(crate) fn with_shared_config(key: TargetKey, config: Arc<BulkheadConfig>) -> Self {
        Self {
            label: key.to_string(),
            key,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_calls)),
            queued: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// The instance this bulkhead guards.
    pub fn key(&self) -> &TargetKey {
        &self.key
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    /// Free slots right now.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Calls currently holding a slot.
    pub fn concurrent_calls(&self) -> usize {
        self.config.max_concurrent_calls - self.semaphore.available_permits()
    }

    /// Calls currently waiting for a slot.
    pub fn queued_calls(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Takes a slot if one is free, without queueing.
    pub fn try_acquire(&self) -> Result<BulkheadPermit> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(self.admitted(permit)),
            Err(_) => Err(self.rejected()),
        }
    }

    /// Takes a slot, waiting in the queue while there is room in it.
    ///
    /// Rejects immediately when every slot is busy and the queue is full.
    /// A queued caller that exceeds `max_wait_duration` gets
    /// [`BulkheadError::Timeout`].
    pub async fn acquire(&self) -> Result<BulkheadPermit> {
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(self.admitted(permit));
        }

        let Some(_slot) = QueueSlot::join(&self.queued, self.config.max_queue_depth) else {
            return Err(self.rejected());
        };

        let depth = self.queued.load(Ordering::Acquire);
        self.config.event_listeners.emit(&BulkheadEvent::CallQueued {
            bulkhead: self.label.clone(),
            timestamp: Instant::now(),
            queue_depth: depth,
        });

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queue_depth", "bulkhead" => self.label.clone()).set(depth as f64);

        let waiting = Arc::clone(&self.semaphore).acquire_owned();
        let acquired = match self.config.max_wait_duration {
            Some(max_wait) => match tokio::time::timeout(max_wait, waiting).await {
                Ok(acquired) => acquired,
                Err(_) => {
                    self.emit_rejected();
                    return Err(BulkheadError::Timeout {
                        key: self.key.clone(),
                        waited: max_wait,
                        max_concurrent_calls: self.config.max_concurrent_calls,
                    });
                }
            },
            None => waiting.await,
        };

        match acquired {
            Ok(permit) => Ok(self.admitted(permit)),
            // the semaphore is never closed while the bulkhead is alive
            Err(_) => Err(self.rejected()),
        }
    }

    /// Runs `task` while holding a slot.
    pub async fn submit<F>(&self, task: F) -> Result<F::Output>
    where
        F: Future,
    {
        let permit = self.acquire().await?;
        let output = task.await;
        drop(permit);
        Ok(output)
    }

    fn admitted(&self, permit: OwnedSemaphorePermit) -> BulkheadPermit {
        let concurrent_calls = self.concurrent_calls();
        self.config
            .event_listeners
            .emit(&BulkheadEvent::CallPermitted {
                bulkhead: self.label.clone(),
                timestamp: Instant::now(),
                concurrent_calls,
            });

        #[cfg(feature = "tracing")]
        tracing::trace!(bulkhead = %self.label, concurrent_calls, "bulkhead admitted call");

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_permitted_total", "bulkhead" => self.label.clone())
                .increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => self.label.clone())
                .set(concurrent_calls as f64);
        }

        BulkheadPermit {
            _permit: permit,
            label: self.label.clone(),
            acquired_at: Instant::now(),
            config: Arc::clone(&self.config),
        }
    }

    fn rejected(&self) -> BulkheadError {
        self.emit_rejected();
        BulkheadError::BulkheadFull {
            key: self.key.clone(),
            max_concurrent_calls: self.config.max_concurrent_calls,
        }
    }

    fn emit_rejected(&self) {
        self.config
            .event_listeners
            .emit(&BulkheadEvent::CallRejected {
                bulkhead: self.label.clone(),
                timestamp: Instant::now(),
                max_concurrent_calls: self.config.max_concurrent_calls,
            });

        #[cfg(feature = "tracing")]
        tracing::debug!(bulkhead = %self.label, "bulkhead rejected call");

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_rejected_total", "bulkhead" => self.label.clone()).increment(1);
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("key", &self.key)
            .field("concurrent_calls", &self.concurrent_calls())
            .field("queued_calls", &self.queued_calls())
            .finish()
    }
}

/// A held bulkhead slot. Dropping it frees the slot.
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
    label: String,
    acquired_at: Instant,
    config: Arc<BulkheadConfig>,
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.config
            .event_listeners
            .emit(&BulkheadEvent::CallFinished {
                bulkhead: std::mem::take(&mut self.label),
                timestamp: Instant::now(),
                duration: self.acquired_at.elapsed(),
            });
    }
}

impl std::fmt::Debug for BulkheadPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadPermit")
            .field("bulkhead", &self.label)
            .finish()
    }
}

/// Reservation in the wait queue, released on drop.
struct QueueSlot<'a> {
    queued: &'a AtomicUsize,
}

impl<'a> QueueSlot<'a> {
    fn join(queued: &'a AtomicUsize, max_depth: usize) -> Option<Self> {
        queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < max_depth).then_some(current + 1)
            })
            .ok()
            .map(|_| Self { queued })
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.queued.fetch_sub(1, Ordering::AcqRel);
    }
}

//! Per-call selection state.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use steadycall_core::ServiceInstance;

/// Exclusive upper bound of the random cursor seed.
pub const CURSOR_SEED_BOUND: u64 = 1000;

#[derive(Debug, Default)]
struct Tried {
    hosts: HashSet<String>,
    subnets: HashSet<String>,
}

/// Selection state of one logical call, shared by its retries and by every
/// thread working on it.
#[derive(Debug)]
pub struct CallContext {
    cursor: AtomicU64,
    tried: Mutex<Tried>,
}

impl CallContext {
    /// A context whose cursor starts at a random position in
    /// `0..CURSOR_SEED_BOUND`.
    pub fn new() -> Self {
        Self::with_cursor(rand::rng().random_range(0..CURSOR_SEED_BOUND))
    }

    pub fn with_cursor(cursor: u64) -> Self {
        Self {
            cursor: AtomicU64::new(cursor),
            tried: Mutex::new(Tried::default()),
        }
    }

    /// Current cursor position.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Moves the cursor one step and returns the position before the step.
    pub(crate) fn advance(&self) -> u64 {
        self.cursor.fetch_add(1, Ordering::AcqRel)
    }

    /// True when `instance`'s host was already chosen for this call.
    pub fn has_tried_host(&self, instance: &ServiceInstance) -> bool {
        self.tried
            .lock()
            .hosts
            .contains(&instance.host().to_ascii_lowercase())
    }

    /// True when a host in `instance`'s subnet was already chosen.
    pub fn has_tried_subnet(&self, instance: &ServiceInstance) -> bool {
        self.tried.lock().subnets.contains(instance.subnet())
    }

    /// Hosts and subnets tried so far, as `(hosts, subnets)` counts.
    pub fn tried_counts(&self) -> (usize, usize) {
        let tried = self.tried.lock();
        (tried.hosts.len(), tried.subnets.len())
    }

    pub(crate) fn tried_flags(&self, instance: &ServiceInstance) -> (bool, bool) {
        let tried = self.tried.lock();
        (
            tried.hosts.contains(&instance.host().to_ascii_lowercase()),
            tried.subnets.contains(instance.subnet()),
        )
    }

    pub(crate) fn record(&self, instance: &ServiceInstance) {
        let mut tried = self.tried.lock();
        tried.hosts.insert(instance.host().to_ascii_lowercase());
        tried.subnets.insert(instance.subnet().to_string());
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

/// How many times an instance was handed out by the selector.
#[derive(Debug, Default)]
pub(crate) struct ReturnCount(AtomicU64);

impl ReturnCount {
    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Counts one more selection, starting over from zero on overflow.
    pub(crate) fn increment(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                Some(count.checked_add(1).unwrap_or(0))
            });
    }
}

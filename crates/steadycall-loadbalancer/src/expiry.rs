use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Slot<V> {
    value: Arc<V>,
    last_access: Instant,
}

/// Concurrent map whose entries expire after a period without access.
///
/// Expired entries are replaced on access and swept opportunistically, at
/// most once per `sweep_interval`.
pub(crate) struct ExpiringMap<K, V> {
    entries: DashMap<K, Slot<V>>,
    ttl: Duration,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            sweep_interval,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Returns the live value for `key`, creating a fresh one when it is
    /// absent or expired.
    pub(crate) fn get_or_insert_with<F>(&self, key: K, init: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        let now = Instant::now();
        self.maybe_sweep(now);

        match self.entries.entry(key) {
            MapEntry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if now.saturating_duration_since(slot.last_access) >= self.ttl {
                    slot.value = Arc::new(init());
                }
                slot.last_access = now;
                Arc::clone(&slot.value)
            }
            MapEntry::Vacant(vacant) => {
                let value = Arc::new(init());
                vacant.insert(Slot {
                    value: Arc::clone(&value),
                    last_access: now,
                });
                value
            }
        }
    }

    /// Returns the live value for `key` without creating one.
    pub(crate) fn get(&self, key: &K) -> Option<Arc<V>> {
        let slot = self.entries.get(key)?;
        if slot.last_access.elapsed() >= self.ttl {
            return None;
        }
        Some(Arc::clone(&slot.value))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drops every expired entry.
    pub(crate) fn sweep(&self) {
        let now = Instant::now();
        let ttl = self.ttl;
        self.entries
            .retain(|_, slot| now.saturating_duration_since(slot.last_access) < ttl);
    }

    fn maybe_sweep(&self, now: Instant) {
        let Some(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if now.saturating_duration_since(*last_sweep) < self.sweep_interval {
            return;
        }
        *last_sweep = now;
        drop(last_sweep);
        self.sweep();
    }
}

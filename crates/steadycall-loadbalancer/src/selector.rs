//! Instance selection.
//!
//! The selector picks one instance per attempt. In the default
//! [`SelectionMode::HealthAware`] mode, every candidate gets a rank computed
//! once up front, compared field by field:
//!
//! 1. hosts this call has not tried yet come first
//! 2. then subnets this call has not tried yet
//! 3. then breaker state: closed, half-open, open
//! 4. then the lower failure rate
//! 5. then the instance handed out least often recently
//! 6. then the fewest calls in flight
//!
//! Candidates are shuffled before a stable sort, so ties break randomly.
//! Retries of a call therefore move to a different host, and if possible a
//! different subnet, before coming back. An instance whose breaker is open
//! is only chosen when nothing better exists. Selection never fails because
//! every instance has been tried; that only lowers their rank.

use crate::context::{CallContext, ReturnCount};
use crate::error::NoInstancesError;
use crate::expiry::ExpiringMap;
use crate::health::{HealthLookup, InstanceHealth};
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use steadycall_circuitbreaker::CircuitState;
use steadycall_core::{CorrelationId, ServiceInstance, TargetKey};

/// How long per-call and per-instance selection state survives without
/// access.
pub const DEFAULT_CONTEXT_TTL: Duration = Duration::from_secs(180);

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Rank candidates by retry spreading and breaker health.
    #[default]
    HealthAware,
    /// Plain round robin over candidates ordered by identity, ignoring
    /// health.
    RoundRobin,
}

#[derive(Debug, Clone, Copy)]
struct Rank {
    host_tried: bool,
    subnet_tried: bool,
    state: CircuitState,
    failure_rate: f64,
    returned: u64,
    in_flight: usize,
}

impl Rank {
    fn compare(&self, other: &Self) -> Ordering {
        self.host_tried
            .cmp(&other.host_tried)
            .then(self.subnet_tried.cmp(&other.subnet_tried))
            .then(self.state.cmp(&other.state))
            .then(self.failure_rate.total_cmp(&other.failure_rate))
            .then(self.returned.cmp(&other.returned))
            .then(self.in_flight.cmp(&other.in_flight))
    }
}

/// Chooses instances for attempts of logical calls.
///
/// One selector is shared by every call of a client. Per-call state is keyed
/// by [`CorrelationId`] and expires after [`DEFAULT_CONTEXT_TTL`] without
/// access; it is never closed explicitly.
pub struct Selector {
    mode: SelectionMode,
    contexts: ExpiringMap<CorrelationId, CallContext>,
    returned: ExpiringMap<TargetKey, ReturnCount>,
}

impl Selector {
    /// A health-aware selector with default expiry.
    pub fn new() -> Self {
        SelectorBuilder::new().build()
    }

    pub fn builder() -> SelectorBuilder {
        SelectorBuilder::new()
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Picks the instance for the next attempt of the call `correlation_id`.
    ///
    /// Returns [`NoInstancesError`] when `candidates` is empty.
    pub fn select<H>(
        &self,
        candidates: &[ServiceInstance],
        correlation_id: &CorrelationId,
        health: &H,
    ) -> Result<ServiceInstance, NoInstancesError>
    where
        H: HealthLookup + ?Sized,
    {
        let mut instances = dedup(candidates);
        if instances.is_empty() {
            tracing::warn!(correlation_id = %correlation_id, "no instances available");
            return Err(NoInstancesError);
        }

        let context = self
            .contexts
            .get_or_insert_with(correlation_id.clone(), CallContext::new);

        let chosen = match self.mode {
            SelectionMode::HealthAware => self.rank_and_pick(instances, &context, health),
            SelectionMode::RoundRobin => {
                instances.sort_by(|a, b| (a.host(), a.port()).cmp(&(b.host(), b.port())));
                let position = context.advance();
                let index = (position % instances.len() as u64) as usize;
                instances.swap_remove(index)
            }
        };

        self.returned
            .get_or_insert_with(chosen.key(), ReturnCount::default)
            .increment();

        tracing::debug!(
            correlation_id = %correlation_id,
            instance = %chosen,
            mode = ?self.mode,
            cursor = context.cursor(),
            "selected instance"
        );

        Ok(chosen)
    }

    fn rank_and_pick<H>(
        &self,
        mut instances: Vec<ServiceInstance>,
        context: &CallContext,
        health: &H,
    ) -> ServiceInstance
    where
        H: HealthLookup + ?Sized,
    {
        instances.shuffle(&mut rand::rng());

        let mut ranked: Vec<(Rank, ServiceInstance)> = instances
            .into_iter()
            .map(|instance| (self.rank(&instance, context, health), instance))
            .collect();
        ranked.sort_by(|(a, _), (b, _)| a.compare(b));

        let (rank, chosen) = ranked.swap_remove(0);
        tracing::trace!(instance = %chosen, ?rank, "best ranked instance");

        context.record(&chosen);
        context.advance();
        chosen
    }

    fn rank<H>(&self, instance: &ServiceInstance, context: &CallContext, health: &H) -> Rank
    where
        H: HealthLookup + ?Sized,
    {
        let (host_tried, subnet_tried) = context.tried_flags(instance);
        let InstanceHealth {
            state,
            failure_rate,
            in_flight,
        } = health.health(instance);
        Rank {
            host_tried,
            subnet_tried,
            state,
            failure_rate,
            returned: self.returned_count(instance),
            in_flight,
        }
    }

    /// Times `instance` was handed out within the current expiry window.
    pub fn returned_count(&self, instance: &ServiceInstance) -> u64 {
        self.returned
            .get(&instance.key())
            .map_or(0, |count| count.get())
    }

    /// Selection state of a call, if it is still alive.
    pub fn call_context(&self, correlation_id: &CorrelationId) -> Option<Arc<CallContext>> {
        self.contexts.get(correlation_id)
    }

    /// Calls with live selection state.
    pub fn active_calls(&self) -> usize {
        self.contexts.len()
    }

    /// Drops expired selection state now instead of waiting for the next
    /// opportunistic sweep.
    pub fn sweep(&self) {
        self.contexts.sweep();
        self.returned.sweep();
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("mode", &self.mode)
            .field("active_calls", &self.contexts.len())
            .finish()
    }
}

fn dedup(candidates: &[ServiceInstance]) -> Vec<ServiceInstance> {
    let mut seen = HashSet::with_capacity(candidates.len());
    candidates
        .iter()
        .filter(|instance| seen.insert(*instance))
        .cloned()
        .collect()
}

/// Builder for [`Selector`].
#[derive(Debug, Clone)]
pub struct SelectorBuilder {
    mode: SelectionMode,
    context_ttl: Duration,
    sweep_interval: Duration,
}

impl SelectorBuilder {
    pub fn new() -> Self {
        Self {
            mode: SelectionMode::HealthAware,
            context_ttl: DEFAULT_CONTEXT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Default: [`SelectionMode::HealthAware`]
    pub fn mode(mut self, mode: SelectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// How long selection state lives without access.
    ///
    /// A call that is still retrying after this long starts over with a
    /// fresh cursor and empty tried sets.
    ///
    /// Default: 3 minutes
    pub fn context_ttl(mut self, ttl: Duration) -> Self {
        self.context_ttl = ttl;
        self
    }

    /// Minimum time between sweeps of expired state.
    ///
    /// Default: 30 seconds
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn build(self) -> Selector {
        Selector {
            mode: self.mode,
            contexts: ExpiringMap::new(self.context_ttl, self.sweep_interval),
            returned: ExpiringMap::new(self.context_ttl, self.sweep_interval),
        }
    }
}

impl Default for SelectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

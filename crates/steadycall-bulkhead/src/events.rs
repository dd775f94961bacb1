use std::time::{Duration, Instant};
use steadycall_core::InvocationEvent;

/// Events emitted by a bulkhead.
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call obtained a slot.
    CallPermitted {
        bulkhead: String,
        timestamp: Instant,
        concurrent_calls: usize,
    },
    /// A call found every slot busy and joined the wait queue.
    CallQueued {
        bulkhead: String,
        timestamp: Instant,
        queue_depth: usize,
    },
    /// A call was turned away.
    CallRejected {
        bulkhead: String,
        timestamp: Instant,
        max_concurrent_calls: usize,
    },
    /// A slot was returned.
    CallFinished {
        bulkhead: String,
        timestamp: Instant,
        duration: Duration,
    },
}

impl InvocationEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallFinished { .. } => "call_finished",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallQueued { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallFinished { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { bulkhead, .. }
            | BulkheadEvent::CallQueued { bulkhead, .. }
            | BulkheadEvent::CallRejected { bulkhead, .. }
            | BulkheadEvent::CallFinished { bulkhead, .. } => bulkhead,
        }
    }
}

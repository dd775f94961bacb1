//! Event plumbing shared by every steadycall component.
//!
//! Breakers, bulkheads, the retry engine and the coordinator all publish
//! typed events through [`EventListeners`]. Listeners are plain callbacks;
//! a panicking listener never takes the call path down with it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// An event published by one of the invocation components.
pub trait InvocationEvent: Send + Sync + fmt::Debug {
    /// Short machine-friendly kind, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When the event happened.
    fn timestamp(&self) -> Instant;

    /// Name of the component instance that published the event.
    ///
    /// For keyed components this is the target key (`host:port#method`).
    fn source(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: InvocationEvent>: Send + Sync {
    /// Called synchronously on the publishing task.
    fn on_event(&self, event: &E);
}

/// Shared, type-erased listener.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// Ordered set of listeners for one event type.
#[derive(Clone)]
pub struct EventListeners<E: InvocationEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: InvocationEvent> EventListeners<E> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Appends a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Appends every listener of `other`, keeping their order.
    pub fn extend(&mut self, other: &EventListeners<E>) {
        self.listeners.extend(other.listeners.iter().cloned());
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// A panic inside one listener is swallowed so the remaining listeners
    /// still run.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: InvocationEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: InvocationEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: InvocationEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

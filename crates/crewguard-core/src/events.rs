//! Event system shared by all crewguard components.
//!
//! Circuit breakers, retry policies, workers and the error log all emit typed
//! events through an [`EventListeners`] collection. Persistence and monitoring
//! collaborators subscribe by adding listeners; the core itself never stores
//! emitted events.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event a component reports to its listeners.
pub trait CrewEvent: Send + Sync + fmt::Debug {
    /// Stable snake_case name, such as `"task_dispatched"`.
    fn event_type(&self) -> &'static str;

    fn timestamp(&self) -> Instant;

    /// Name of the worker, breaker, policy or check that emitted the event.
    fn source_name(&self) -> &str;
}

/// Receives events of one type.
pub trait EventListener<E: CrewEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// The listeners attached to one component.
///
/// Cloning shares the listeners themselves.
#[derive(Clone)]
pub struct EventListeners<E: CrewEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: CrewEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers a closure, wrapped in a [`FnListener`].
    pub fn add_fn<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
        E: 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Hands `event` to each listener in registration order.
    ///
    /// A listener that panics is skipped; the rest still see the event.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// Appends every listener of `other` to this collection.
    pub fn extend(&mut self, other: &EventListeners<E>) {
        self.listeners.extend(other.listeners.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: CrewEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CrewEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure to [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: CrewEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

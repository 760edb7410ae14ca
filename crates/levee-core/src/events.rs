//! Lifecycle event plumbing.
//!
//! A breaker publishes what happens to each call (attempted, rejected, timed out, ...)
//! through an [`EventListeners`] registry. Observers either register a closure with
//! [`FnListener`] or receive owned copies of every event through a [`ChannelListener`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// An event published by a levee component.
pub trait Event: Send + Sync + fmt::Debug {
    /// Short, stable name of the event kind (e.g. `"rejected"`, `"state_transition"`).
    fn kind(&self) -> &'static str;

    /// When the event was produced.
    fn timestamp(&self) -> Instant;

    /// Name of the component instance that produced the event.
    fn source(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: Event>: Send + Sync {
    /// Called synchronously for every published event.
    fn on_event(&self, event: &E);
}

/// Shared, type-erased listener.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered set of listeners for one event type.
///
/// Cloning is cheap; clones share the listeners themselves.
pub struct EventListeners<E: Event> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: Event> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: Event> EventListeners<E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener. Listeners are notified in registration order.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers an already shared listener.
    pub fn add_shared(&mut self, listener: BoxedEventListener<E>) {
        self.listeners.push(listener);
    }

    /// Moves every listener of `other` to the end of this registry.
    pub fn extend(&mut self, other: EventListeners<E>) {
        self.listeners.extend(other.listeners);
    }

    /// Publishes `event` to every listener.
    ///
    /// A panicking listener is isolated: the panic is caught and the remaining
    /// listeners still see the event.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: Event> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Listener backed by a closure.
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: std::marker::PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f` so it is called for every event.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: std::marker::PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: Event,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

/// Listener that forwards a clone of every event into an unbounded channel.
///
/// Sending never blocks. Once the receiver is dropped the listener silently
/// discards further events.
pub struct ChannelListener<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> ChannelListener<E> {
    /// Creates a listener together with the receiving half of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Returns true once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<E> EventListener<E> for ChannelListener<E>
where
    E: Event + Clone + 'static,
{
    fn on_event(&self, event: &E) {
        let _ = self.tx.send(event.clone());
    }
}

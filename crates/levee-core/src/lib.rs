//! Core infrastructure for levee.
//!
//! This crate holds the pieces shared by the breaker and the stats collector:
//! - Lifecycle events and the [`Event`] trait
//! - Listener registries with panic isolation
//! - Closure-backed and channel-backed listeners

pub mod events;

pub use events::{ChannelListener, Event, EventListener, EventListeners, FnListener};

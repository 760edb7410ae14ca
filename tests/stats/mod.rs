//! Stats tests.
//!
//! Test organization:
//! - collector.rs: counters, samples, resets and snapshots
//! - wiring.rs: counters fed by a breaker's events

mod collector;

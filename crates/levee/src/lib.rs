//! Circuit breaker with fallback chains and rolling stats.
//!
//! `levee` ties together the pieces of the workspace:
//!
//! - **Circuit Breaker** ([`circuitbreaker`]): guards a callback-style command,
//!   opens after consecutive failures, probes recovery with a single trial call
//!   and hands failed calls to an optional fallback breaker
//! - **Callback Guard** ([`contain`]): makes inline and deferred completions
//!   indistinguishable to the caller
//! - **Stats** ([`stats_collector`]): named counters and samples with snapshots,
//!   wired to a breaker with [`stats()`]
//!
//! # Example
//!
//! ```rust
//! use levee::{CircuitBreakerConfig, Completion};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let breaker = levee::breaker(
//!     |id: u64, done: Completion<String, std::io::Error>| done.succeed(format!("user-{id}")),
//!     CircuitBreakerConfig::builder()
//!         .name("users")
//!         .timeout(Duration::from_secs(1))
//!         .build(),
//! );
//! let stats = levee::stats(&breaker);
//!
//! assert_eq!(breaker.run_async(7).await.unwrap(), "user-7");
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.counts["executions"], 1);
//! assert_eq!(snapshot.counts["successes"], 1);
//! assert_eq!(snapshot.samples["duration"].count, 1);
//! # }
//! ```
//!
//! # Individual Crates
//!
//! - `levee-circuitbreaker`
//! - `levee-stats`
//! - `levee-core` (shared event infrastructure)
//!
//! # Feature Flags
//! - `tracing`: logging via the `tracing` crate
//! - `metrics`: breaker metrics via the `metrics` crate
//! - `serde`: serialization for circuit states and stats snapshots

pub use levee_circuitbreaker as circuitbreaker;
pub use levee_core as core;
pub use levee_stats as stats_collector;

pub use levee_circuitbreaker::{
    command_fn, contain, contain_fn, from_async_fn, from_service, Breaker, BreakerError,
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerEvent, CircuitState, Command,
    Completion, FnCommand,
};
pub use levee_stats::{SharedStats, Snapshot, Stats};

use levee_core::FnListener;

/// Wraps a callback-style closure in a circuit breaker.
///
/// Shorthand for `CircuitBreaker::new(command_fn(f), config)`.
pub fn breaker<Req, Res, Err, F, C>(
    f: F,
    config: CircuitBreakerConfig<C>,
) -> CircuitBreaker<FnCommand<F, Req, Res, Err>, C>
where
    F: Fn(Req, Completion<Res, Err>) + Send + Sync + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    Err: Send + 'static,
{
    CircuitBreaker::new(command_fn(f), config)
}

/// Counter incremented for every call, admitted or not.
pub const EXECUTIONS: &str = "executions";
/// Counter incremented for every rejected call.
pub const REJECTIONS: &str = "rejections";
/// Counter incremented for every answer that was not a tripping failure.
pub const SUCCESSES: &str = "successes";
/// Counter incremented for every tripping failure.
pub const FAILURES: &str = "failures";
/// Counter incremented for every timed out call.
pub const TIMEOUTS: &str = "timeouts";
/// Sample of answered call durations, in milliseconds.
pub const DURATION: &str = "duration";

/// Collects a breaker's events into a fresh stats collector.
///
/// See [`stats_with`] for the counters and samples maintained.
pub fn stats<Cmd, C>(breaker: &CircuitBreaker<Cmd, C>) -> SharedStats
where
    Cmd: Command,
{
    stats_with(breaker, Stats::new())
}

/// Collects a breaker's events into `stats`.
///
/// Maintains the counters [`EXECUTIONS`], [`REJECTIONS`], [`SUCCESSES`],
/// [`FAILURES`] and [`TIMEOUTS`], and the [`DURATION`] sample in
/// milliseconds. The returned handle shares `stats` with the listener.
pub fn stats_with<Cmd, C>(breaker: &CircuitBreaker<Cmd, C>, stats: Stats) -> SharedStats
where
    Cmd: Command,
{
    let shared = SharedStats::new(stats);
    let sink = shared.clone();
    breaker.subscribe(FnListener::new(move |event: &CircuitBreakerEvent| {
        match event {
            CircuitBreakerEvent::CallAttempted { .. } => sink.increment(EXECUTIONS),
            CircuitBreakerEvent::CallRejected { .. } => sink.increment(REJECTIONS),
            CircuitBreakerEvent::CallSucceeded { .. } => sink.increment(SUCCESSES),
            CircuitBreakerEvent::CallFailed { .. } => sink.increment(FAILURES),
            CircuitBreakerEvent::CallTimedOut { .. } => sink.increment(TIMEOUTS),
            CircuitBreakerEvent::CallDuration { elapsed, .. } => {
                sink.sample(DURATION, elapsed.as_secs_f64() * 1000.0)
            }
            CircuitBreakerEvent::StateTransition { .. } => {}
        }
    }));
    shared
}

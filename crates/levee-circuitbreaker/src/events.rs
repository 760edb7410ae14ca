use crate::circuit::CircuitState;
use levee_core::Event;
use std::time::{Duration, Instant};

/// Lifecycle events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// `run` was entered, before admission is decided.
    CallAttempted {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// The call was refused without invoking the command.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// The command responded and the result was not a tripping failure.
    CallSucceeded {
        pattern_name: String,
        timestamp: Instant,
    },
    /// The command responded with a tripping failure.
    CallFailed {
        pattern_name: String,
        timestamp: Instant,
        error: String,
    },
    /// The command did not respond before the deadline.
    CallTimedOut {
        pattern_name: String,
        timestamp: Instant,
        timeout: Duration,
    },
    /// Wall time between invoking the command and its response.
    CallDuration {
        pattern_name: String,
        timestamp: Instant,
        elapsed: Duration,
    },
    /// The breaker changed state.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
}

impl Event for CircuitBreakerEvent {
    fn kind(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallAttempted { .. } => "attempted",
            CircuitBreakerEvent::CallRejected { .. } => "rejected",
            CircuitBreakerEvent::CallSucceeded { .. } => "succeeded",
            CircuitBreakerEvent::CallFailed { .. } => "failed",
            CircuitBreakerEvent::CallTimedOut { .. } => "timeout",
            CircuitBreakerEvent::CallDuration { .. } => "duration",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallAttempted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::CallSucceeded { timestamp, .. }
            | CircuitBreakerEvent::CallFailed { timestamp, .. }
            | CircuitBreakerEvent::CallTimedOut { timestamp, .. }
            | CircuitBreakerEvent::CallDuration { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallAttempted { pattern_name, .. }
            | CircuitBreakerEvent::CallRejected { pattern_name, .. }
            | CircuitBreakerEvent::CallSucceeded { pattern_name, .. }
            | CircuitBreakerEvent::CallFailed { pattern_name, .. }
            | CircuitBreakerEvent::CallTimedOut { pattern_name, .. }
            | CircuitBreakerEvent::CallDuration { pattern_name, .. }
            | CircuitBreakerEvent::StateTransition { pattern_name, .. } => pattern_name,
        }
    }
}

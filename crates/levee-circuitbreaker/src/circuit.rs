use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Healthy; calls pass through.
    Closed = 0,
    /// Tripped; calls are rejected immediately.
    Open = 1,
    /// Probation; exactly one trial call is admitted.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Upper-case name, as used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSE",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change that actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
}

/// Mutable breaker state. Lives behind the breaker's mutex; nothing in here
/// runs user code.
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    failure_count: usize,
    trial_pending: bool,
    reset_timer: Option<JoinHandle<()>>,
    reset_epoch: u64,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            failure_count: 0,
            trial_pending: false,
            reset_timer: None,
            reset_epoch: 0,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn failure_count(&self) -> usize {
        self.failure_count
    }

    pub(crate) fn trial_pending(&self) -> bool {
        self.trial_pending
    }

    /// Decides whether a new call may invoke the command.
    ///
    /// Open rejects; half-open admits one trial and rejects everything else
    /// until that trial resolves.
    pub(crate) fn try_admit(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if self.trial_pending {
                    false
                } else {
                    self.trial_pending = true;
                    true
                }
            }
        }
    }

    /// Marks the in-flight trial (if any) as resolved.
    pub(crate) fn clear_trial(&mut self) {
        self.trial_pending = false;
    }

    /// Counts a tripping failure. Returns true if the breaker must open.
    pub(crate) fn record_failure(&mut self, max_failures: usize) -> bool {
        self.failure_count += 1;
        self.state == CircuitState::HalfOpen || self.failure_count >= max_failures
    }

    /// Zeroes the failure counter and moves to closed.
    pub(crate) fn close(&mut self) -> Option<Transition> {
        self.failure_count = 0;
        self.transition_to(CircuitState::Closed)
    }

    /// The single state setter. A no-op when `to` is the current state.
    ///
    /// Leaving open cancels the reset timer; entering closed clears the
    /// failure counter and trial flag. Arming the timer on entering open is up
    /// to the caller, which owns the runtime handle.
    pub(crate) fn transition_to(&mut self, to: CircuitState) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }

        if from == CircuitState::Open {
            self.cancel_reset_timer();
        }
        if to == CircuitState::Closed {
            self.failure_count = 0;
            self.trial_pending = false;
        }

        self.state = to;
        self.state_atomic.store(to as u8, Ordering::Release);
        Some(Transition { from, to })
    }

    /// Starts a new reset-timer generation and returns its epoch.
    pub(crate) fn next_reset_epoch(&mut self) -> u64 {
        self.reset_epoch += 1;
        self.reset_epoch
    }

    pub(crate) fn set_reset_timer(&mut self, handle: JoinHandle<()>) {
        if let Some(stale) = self.reset_timer.replace(handle) {
            stale.abort();
        }
    }

    /// Claims a fired reset timer. Returns false if the timer was canceled or
    /// superseded after it woke, in which case it must not act.
    pub(crate) fn claim_reset_timer(&mut self, epoch: u64) -> bool {
        if self.reset_epoch != epoch || self.state != CircuitState::Open {
            return false;
        }
        // The firing task is the one holding this handle; drop it rather than abort.
        self.reset_timer = None;
        true
    }

    fn cancel_reset_timer(&mut self) {
        self.reset_epoch += 1;
        if let Some(timer) = self.reset_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Circuit {
    fn drop(&mut self) {
        if let Some(timer) = self.reset_timer.take() {
            timer.abort();
        }
    }
}

impl fmt::Debug for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Circuit")
            .field("state", &self.state())
            .field("failure_count", &self.failure_count)
            .field("trial_pending", &self.trial_pending())
            .field("reset_timer_armed", &self.reset_timer.is_some())
            .finish()
    }
}

//! Circuit breaker behavior tests.
//!
//! Test organization:
//! - states.rs: state machine, manual controls, reset timer
//! - thresholds.rs: failure counting and threshold precision
//! - half_open.rs: single-trial admission and its outcomes
//! - timeout.rs: command deadlines and late responses
//! - fallback.rs: fallback chains
//! - classifier.rs: non-tripping errors
//! - events.rs: builder hooks, subscribers and event order
//! - contain.rs: deferred delivery through the breaker
//! - service.rs: future and tower::Service adapters

mod events;
mod timeout;

use levee_circuitbreaker::{command_fn, Command, Completion};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// A command that answers inline and whose outcome can be flipped mid-test.
#[derive(Clone, Default)]
pub(crate) struct Toggle {
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl Toggle {
    pub(crate) fn failing() -> Self {
        let toggle = Self::default();
        toggle.set_failing(true);
        toggle
    }

    pub(crate) fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn command(
        &self,
    ) -> impl Command<Request = u32, Response = u32, Error = String> + use<> {
        let fail = Arc::clone(&self.fail);
        let calls = Arc::clone(&self.calls);
        command_fn(move |req: u32, done: Completion<u32, String>| {
            calls.fetch_add(1, Ordering::SeqCst);
            if fail.load(Ordering::SeqCst) {
                done.fail(format!("failed {req}"));
            } else {
                done.succeed(req);
            }
        })
    }
}

/// A command that never answers on its own; the test answers for it.
#[derive(Clone, Default)]
pub(crate) struct Parked {
    pending: Arc<Mutex<VecDeque<Completion<u32, String>>>>,
}

impl Parked {
    pub(crate) fn command(
        &self,
    ) -> impl Command<Request = u32, Response = u32, Error = String> + use<> {
        let pending = Arc::clone(&self.pending);
        command_fn(move |_req: u32, done: Completion<u32, String>| {
            pending.lock().unwrap().push_back(done);
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    fn next(&self) -> Completion<u32, String> {
        self.pending
            .lock()
            .unwrap()
            .pop_front()
            .expect("no parked call")
    }

    pub(crate) fn succeed_next(&self, value: u32) {
        self.next().succeed(value);
    }

    pub(crate) fn fail_next(&self, error: &str) {
        self.next().fail(error.to_string());
    }
}

/// A callback that forwards the outcome into a oneshot channel.
pub(crate) fn capture<T: Send + 'static>()
-> (impl FnOnce(T) + Send + 'static, oneshot::Receiver<T>) {
    let (tx, rx) = oneshot::channel();
    (
        move |result| {
            let _ = tx.send(result);
        },
        rx,
    )
}

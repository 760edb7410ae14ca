//! Callback guard ("contain").
//!
//! Some commands complete before `execute` returns (a cache hit, a validation
//! error), others complete later. Code that issues a call must not have to care:
//! a contained command always delivers its result *after* `execute` has
//! returned. An inline completion is parked and delivered on a fresh Tokio task
//! once the call returns; a late completion is delivered immediately, on
//! whatever thread produced it.
//!
//! ```rust
//! use levee_circuitbreaker::{command_fn, contain, Command, Completion};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let command = contain(command_fn(|req: u32, done: Completion<u32, ()>| done.succeed(req)));
//!
//! let returned = Arc::new(AtomicBool::new(false));
//! let seen = Arc::clone(&returned);
//! let (tx, rx) = tokio::sync::oneshot::channel();
//! command.execute(7, Completion::new(move |result| {
//!     let _ = tx.send((seen.load(Ordering::SeqCst), result));
//! }));
//! returned.store(true, Ordering::SeqCst);
//!
//! // Delivered after `execute` returned, even though the command completed inline.
//! assert_eq!(rx.await.unwrap(), (true, Ok(7)));
//! # }
//! ```

use crate::command::{Command, Completion};
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

/// A command whose completions never run before `execute` returns.
///
/// Created with [`contain`]. Containing an already contained command is
/// harmless: the inner guard sees a contained completion and steps aside.
#[derive(Debug, Clone)]
pub struct Contained<C> {
    inner: C,
}

/// Wraps `command` in the callback guard.
pub fn contain<C: Command>(command: C) -> Contained<C> {
    Contained { inner: command }
}

impl<C> Contained<C> {
    /// Returns a reference to the wrapped command.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// Unwraps the guard.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Command> Command for Contained<C> {
    type Request = C::Request;
    type Response = C::Response;
    type Error = C::Error;

    fn execute(&self, request: C::Request, done: Completion<C::Response, C::Error>) {
        guard(done, |done| self.inner.execute(request, done))
    }
}

/// Contains a plain callback-style function, forwarding its return value.
///
/// Whatever `f` returns synchronously (a handle, a future, a status code) is
/// handed back untouched; only completion delivery is normalized.
pub fn contain_fn<Req, T, E, R, F>(f: F) -> impl Fn(Req, Completion<T, E>) -> R
where
    F: Fn(Req, Completion<T, E>) -> R,
    T: Send + 'static,
    E: Send + 'static,
{
    move |request, done| guard(done, |done| f(request, done))
}

enum Phase<T, E> {
    /// `invoke` has not returned yet.
    Calling,
    /// Completed inline; waiting for `invoke` to return.
    Parked(Result<T, E>),
    /// `invoke` returned; completions go straight through.
    Returned,
}

struct Slot<T, E> {
    phase: Phase<T, E>,
    done: Option<Completion<T, E>>,
}

/// Runs `invoke` with a completion that cannot fire before `invoke` returns.
pub(crate) fn guard<T, E, R, I>(done: Completion<T, E>, invoke: I) -> R
where
    T: Send + 'static,
    E: Send + 'static,
    I: FnOnce(Completion<T, E>) -> R,
{
    if done.is_contained() {
        return invoke(done);
    }

    let slot = Arc::new(Mutex::new(Slot {
        phase: Phase::Calling,
        done: Some(done),
    }));

    let container = {
        let slot = Arc::clone(&slot);
        Completion::contained(move |result| {
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(slot.phase, Phase::Calling) {
                slot.phase = Phase::Parked(result);
                return;
            }
            let done = slot.done.take();
            drop(slot);
            if let Some(done) = done {
                done.complete(result);
            }
        })
    };

    let output = invoke(container);

    let deferred = {
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        match mem::replace(&mut slot.phase, Phase::Returned) {
            Phase::Parked(result) => slot.done.take().map(|done| (done, result)),
            _ => None,
        }
    };

    if let Some((done, result)) = deferred {
        tokio::spawn(async move { done.complete(result) });
    }

    output
}

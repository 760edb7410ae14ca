//! Callback-driven circuit breaker.
//!
//! A circuit breaker sits in front of a fallible, possibly slow operation (the
//! [`Command`]) and tracks its outcomes. Once consecutive failures reach a
//! threshold it stops invoking the command and rejects calls immediately,
//! giving the dependency room to recover.
//!
//! ## States
//! - **Closed**: normal operation, every call reaches the command
//! - **Open**: tripped, calls are rejected without invoking the command
//! - **Half-Open**: after the reset timeout, exactly one trial call is admitted;
//!   its outcome closes or reopens the breaker
//!
//! ## Usage
//!
//! ```rust
//! use levee_circuitbreaker::{command_fn, CircuitBreaker, CircuitBreakerConfig, Completion};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let command = command_fn(|name: String, done: Completion<String, std::io::Error>| {
//!     done.succeed(format!("hello, {name}"))
//! });
//!
//! let config = CircuitBreakerConfig::builder()
//!     .name("greeter")
//!     .max_failures(3)
//!     .timeout(Duration::from_millis(500))
//!     .reset_timeout(Duration::from_secs(5))
//!     .build();
//!
//! let breaker = CircuitBreaker::new(command, config);
//! let greeting = breaker.run_async("levee".to_string()).await.unwrap();
//! assert_eq!(greeting, "hello, levee");
//! # }
//! ```
//!
//! ## Callbacks
//!
//! [`CircuitBreaker::run`] takes a callback that receives the outcome exactly
//! once. The command runs behind the callback guard ([`contain`]), so the
//! callback never fires before `run` has returned, no matter how quickly the
//! command completes.
//!
//! ## Fallback Chains
//!
//! A breaker can hand failed calls to another breaker with the same request
//! and response types. Each link keeps its own state:
//!
//! ```rust
//! use levee_circuitbreaker::{command_fn, CircuitBreaker, CircuitBreakerConfig, Completion};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let primary = CircuitBreaker::new(
//!     command_fn(|_: u32, done: Completion<&'static str, &'static str>| done.fail("down")),
//!     CircuitBreakerConfig::default(),
//! );
//! let cache = CircuitBreaker::new(
//!     command_fn(|_: u32, done: Completion<&'static str, &'static str>| done.succeed("cached")),
//!     CircuitBreakerConfig::default(),
//! );
//!
//! let breaker = primary.with_fallback(cache);
//! assert_eq!(breaker.run_async(1).await, Ok("cached"));
//! assert_eq!(breaker.failure_count(), 1);
//! # }
//! ```
//!
//! ## Errors
//!
//! Every call resolves to `Result<Response, BreakerError<Error>>`:
//! [`BreakerError::OpenCircuit`] for rejections, [`BreakerError::Timeout`] when
//! the command missed its deadline and [`BreakerError::Inner`] for the
//! command's own error. The failure classifier only decides whether an error
//! counts toward opening; the error is delivered either way.
//!
//! ## Feature Flags
//! - `metrics`: call outcomes, transitions, state gauge and latency histogram via the `metrics` crate
//! - `tracing`: logging via the `tracing` crate
//! - `serde`: `Serialize`/`Deserialize` for [`CircuitState`]

use crate::circuit::{Circuit, Transition};
use futures::future::BoxFuture;
use levee_core::{ChannelListener, EventListener, EventListeners};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower::Service;
#[cfg(feature = "tracing")]
use tracing::{debug, info, trace, warn};

pub use circuit::CircuitState;
pub use classifier::{DefaultClassifier, FailureClassifier, FnClassifier};
pub use command::{
    command_fn, from_async_fn, from_service, Command, Completion, FnCommand, ServiceCommand,
};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use contain::{contain, contain_fn, Contained};
pub use error::{BreakerError, DEFAULT_OPEN_MESSAGE, DEFAULT_TIMEOUT_MESSAGE};
pub use events::CircuitBreakerEvent;

mod circuit;
pub mod classifier;
mod command;
mod config;
mod contain;
mod error;
mod events;

/// The callback a breaker delivers its outcome to.
pub type Callback<Res, Err> = Box<dyn FnOnce(Result<Res, BreakerError<Err>>) + Send>;

/// Internal outcome handler. The flag is set when the call failed in a way a
/// fallback may take over: rejected, timed out, or a tripping command error.
type Settle<Res, Err> = Box<dyn FnOnce(Result<Res, BreakerError<Err>>, bool) + Send>;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "levee_calls_total",
            "Total number of calls through the circuit breaker, by outcome"
        );
        describe_counter!(
            "levee_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_gauge!(
            "levee_state",
            "Current state of the circuit breaker (0 = closed, 1 = open, 2 = half-open)"
        );
        describe_histogram!(
            "levee_call_duration_seconds",
            "Time between invoking the command and its response"
        );
    });
}

/// Object-safe view of a breaker, used to link fallback chains.
///
/// Implemented by every [`CircuitBreaker`]; implement it yourself to put
/// something other than a breaker at the end of a chain.
pub trait Breaker<Req, Res, Err>: Send + Sync {
    /// Runs `request`, delivering the outcome to `callback` exactly once.
    fn run_boxed(&self, request: Req, callback: Callback<Res, Err>);
}

struct Fallback<Req, Res, Err> {
    breaker: Arc<dyn Breaker<Req, Res, Err>>,
    clone_request: fn(&Req) -> Req,
}

impl<Req, Res, Err> Clone for Fallback<Req, Res, Err> {
    fn clone(&self) -> Self {
        Self {
            breaker: Arc::clone(&self.breaker),
            clone_request: self.clone_request,
        }
    }
}

/// A circuit breaker guarding one [`Command`].
///
/// Cloning is cheap; clones share state, listeners and timers. A fallback
/// set with [`with_fallback`](Self::with_fallback) belongs to the handle it
/// was set on.
///
/// # Type Parameters
///
/// - `Cmd`: the guarded command
/// - `C`: the failure classifier type (e.g. `DefaultClassifier` or `FnClassifier<F>`)
pub struct CircuitBreaker<Cmd: Command, C = DefaultClassifier> {
    shared: Arc<Shared<Cmd, C>>,
    fallback: Option<Fallback<Cmd::Request, Cmd::Response, Cmd::Error>>,
}

struct Shared<Cmd, C> {
    command: Contained<Cmd>,
    config: CircuitBreakerConfig<C>,
    circuit: Mutex<Circuit>,
    state: Arc<AtomicU8>,
    subscribers: RwLock<EventListeners<CircuitBreakerEvent>>,
}

/// Book-keeping for one admitted call. Whichever of the response or the
/// timeout timer takes the callback first settles the call.
///
/// Commands may answer from threads outside the runtime, so the call keeps
/// a handle to the runtime it was issued on for any timer it has to arm.
struct PendingCall<Res, Err> {
    callback: Mutex<Option<Settle<Res, Err>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    started: tokio::time::Instant,
    runtime: Handle,
}

impl<Res, Err> PendingCall<Res, Err> {
    fn new(callback: Settle<Res, Err>, runtime: Handle) -> Self {
        Self {
            callback: Mutex::new(Some(callback)),
            timer: Mutex::new(None),
            started: tokio::time::Instant::now(),
            runtime,
        }
    }

    fn settle(&self) -> Option<Settle<Res, Err>> {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn arm(&self, timer: JoinHandle<()>) {
        *self.timer.lock().unwrap_or_else(PoisonError::into_inner) = Some(timer);
    }

    fn cancel_timer(&self) {
        let timer = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(timer) = timer {
            timer.abort();
        }
    }
}

impl<Cmd, C> CircuitBreaker<Cmd, C>
where
    Cmd: Command,
{
    /// Creates a closed breaker guarding `command`.
    ///
    /// The command is wrapped in the callback guard, so it may complete
    /// inline or later without affecting the caller.
    pub fn new(command: Cmd, config: CircuitBreakerConfig<C>) -> Self {
        let state = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            shared: Arc::new(Shared {
                command: contain(command),
                config,
                circuit: Mutex::new(Circuit::new(Arc::clone(&state))),
                state,
                subscribers: RwLock::new(EventListeners::new()),
            }),
            fallback: None,
        }
    }

    /// Routes failed calls to `fallback`, with the same request.
    ///
    /// Rejections, timeouts and errors the classifier counts as failures
    /// engage the fallback. Errors the classifier ignores go straight to the
    /// caller.
    ///
    /// The fallback sees the request only after this breaker has recorded the
    /// failure, so its outcome never affects this breaker's state. Fallbacks
    /// chain: a fallback may itself have a fallback.
    pub fn with_fallback<B>(mut self, fallback: B) -> Self
    where
        B: Breaker<Cmd::Request, Cmd::Response, Cmd::Error> + 'static,
        Cmd::Request: Clone,
    {
        self.fallback = Some(Fallback {
            breaker: Arc::new(fallback),
            clone_request: <Cmd::Request as Clone>::clone,
        });
        self
    }

    /// Registers a listener for this breaker's events.
    pub fn subscribe<L>(&self, listener: L)
    where
        L: EventListener<CircuitBreakerEvent> + 'static,
    {
        self.shared
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(listener);
    }

    /// Returns a channel receiving a copy of every event from now on.
    pub fn events(&self) -> mpsc::UnboundedReceiver<CircuitBreakerEvent> {
        let (listener, rx) = ChannelListener::channel();
        self.subscribe(listener);
        rx
    }

    /// Returns the current state without locking.
    pub fn state(&self) -> CircuitState {
        self.shared.state()
    }

    /// Returns true if the breaker is open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns true if the breaker is half-open.
    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    /// Returns true if the breaker is closed.
    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Tripping failures counted since the breaker last closed.
    pub fn failure_count(&self) -> usize {
        self.shared.lock_circuit().failure_count()
    }

    /// The breaker's name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// The configuration the breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig<C> {
        &self.shared.config
    }

    /// Forces the breaker half-open, canceling a pending reset timer.
    pub fn half_open(&self) {
        let transition = self
            .shared
            .lock_circuit()
            .transition_to(CircuitState::HalfOpen);
        if let Some(transition) = transition {
            self.shared.notify_transition(transition);
        }
    }

    /// Forces the breaker closed. Always clears the failure counter, even if
    /// the breaker was already closed.
    pub fn close(&self) {
        let transition = self.shared.lock_circuit().close();
        if let Some(transition) = transition {
            self.shared.notify_transition(transition);
        }
    }
}

impl<Cmd, C> CircuitBreaker<Cmd, C>
where
    Cmd: Command,
    Cmd::Error: fmt::Display,
    C: FailureClassifier<Cmd::Error> + 'static,
{
    /// Forces the breaker open and arms the reset timer.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn open(&self) {
        let transition = {
            let mut circuit = self.shared.lock_circuit();
            self.shared.trip(&mut circuit, &Handle::current())
        };
        if let Some(transition) = transition {
            self.shared.notify_transition(transition);
        }
    }

    /// Runs the command, delivering the outcome to `callback` exactly once.
    ///
    /// The callback is never invoked before `run` returns unless the call is
    /// rejected outright. Must be called inside a Tokio runtime.
    pub fn run<F>(&self, request: Cmd::Request, callback: F)
    where
        F: FnOnce(Result<Cmd::Response, BreakerError<Cmd::Error>>) + Send + 'static,
    {
        self.run_boxed(request, Box::new(callback));
    }

    /// Runs the command and resolves to its outcome.
    ///
    /// The call starts immediately; the returned future only waits for it.
    pub fn run_async(
        &self,
        request: Cmd::Request,
    ) -> BoxFuture<'static, Result<Cmd::Response, BreakerError<Cmd::Error>>> {
        let (tx, rx) = oneshot::channel();
        self.run(request, move |result| {
            let _ = tx.send(result);
        });
        Box::pin(async move { rx.await.unwrap_or(Err(BreakerError::Canceled)) })
    }
}

impl<Cmd, C> Breaker<Cmd::Request, Cmd::Response, Cmd::Error> for CircuitBreaker<Cmd, C>
where
    Cmd: Command,
    Cmd::Error: fmt::Display,
    C: FailureClassifier<Cmd::Error> + 'static,
{
    fn run_boxed(&self, request: Cmd::Request, callback: Callback<Cmd::Response, Cmd::Error>) {
        let Some(fallback) = self.fallback.clone() else {
            self.shared.execute(request, Box::new(move |result, _| callback(result)));
            return;
        };

        let retry = (fallback.clone_request)(&request);
        #[cfg(feature = "tracing")]
        let name = self.shared.config.name.clone();
        self.shared.execute(
            request,
            Box::new(move |result, fall_back| match result {
                Err(_error) if fall_back => {
                    #[cfg(feature = "tracing")]
                    debug!(breaker = %name, error = %_error, "call failed, engaging fallback");
                    fallback.breaker.run_boxed(retry, callback);
                }
                result => callback(result),
            }),
        );
    }
}

impl<Cmd, C> Service<Cmd::Request> for CircuitBreaker<Cmd, C>
where
    Cmd: Command,
    Cmd::Error: fmt::Display,
    C: FailureClassifier<Cmd::Error> + 'static,
{
    type Response = Cmd::Response;
    type Error = BreakerError<Cmd::Error>;
    type Future = BoxFuture<'static, Result<Cmd::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Rejection is a per-call outcome, not backpressure.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Cmd::Request) -> Self::Future {
        self.run_async(request)
    }
}

impl<Cmd: Command, C> Clone for CircuitBreaker<Cmd, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            fallback: self.fallback.clone(),
        }
    }
}

impl<Cmd: Command, C> fmt::Debug for CircuitBreaker<Cmd, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.config.name)
            .field("circuit", &*self.shared.lock_circuit())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl<Cmd, C> Shared<Cmd, C> {
    fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CircuitBreakerEvent) {
        self.config.event_listeners.emit(&event);
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        subscribers.emit(&event);
    }

    fn notify_transition(&self, transition: Transition) {
        #[cfg(feature = "tracing")]
        info!(
            breaker = %self.config.name,
            from = %transition.from,
            to = %transition.to,
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "levee_transitions_total",
                "breaker" => self.config.name.clone(),
                "from" => transition.from.as_str(),
                "to" => transition.to.as_str()
            )
            .increment(1);
            gauge!("levee_state", "breaker" => self.config.name.clone())
                .set(transition.to as u8 as f64);
        }

        self.emit(CircuitBreakerEvent::StateTransition {
            pattern_name: self.config.name.clone(),
            timestamp: Instant::now(),
            from_state: transition.from,
            to_state: transition.to,
        });
    }
}

impl<Cmd, C> Shared<Cmd, C>
where
    Cmd: Command,
    C: Send + Sync + 'static,
{
    /// Opens the breaker and arms the reset timer. Arms nothing if the
    /// breaker was already open.
    fn trip(self: &Arc<Self>, circuit: &mut Circuit, runtime: &Handle) -> Option<Transition> {
        let transition = circuit.transition_to(CircuitState::Open)?;
        let epoch = circuit.next_reset_epoch();
        let delay = self.config.reset_timeout;
        let shared = Arc::downgrade(self);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.on_reset_timer(epoch);
            }
        });
        circuit.set_reset_timer(timer);
        Some(transition)
    }

    fn on_reset_timer(&self, epoch: u64) {
        let transition = {
            let mut circuit = self.lock_circuit();
            if !circuit.claim_reset_timer(epoch) {
                return;
            }
            circuit.transition_to(CircuitState::HalfOpen)
        };
        if let Some(transition) = transition {
            self.notify_transition(transition);
        }
    }
}

impl<Cmd, C> Shared<Cmd, C>
where
    Cmd: Command,
    Cmd::Error: fmt::Display,
    C: FailureClassifier<Cmd::Error> + 'static,
{
    fn execute(
        self: &Arc<Self>,
        request: Cmd::Request,
        callback: Settle<Cmd::Response, Cmd::Error>,
    ) {
        let name = &self.config.name;
        self.emit(CircuitBreakerEvent::CallAttempted {
            pattern_name: name.clone(),
            timestamp: Instant::now(),
            state: self.state(),
        });

        #[cfg(feature = "tracing")]
        debug!(breaker = %name, "checking if call is permitted");

        let admitted = self.lock_circuit().try_admit();
        if !admitted {
            let state = self.state();
            #[cfg(feature = "tracing")]
            debug!(breaker = %name, state = %state, "call rejected");
            #[cfg(feature = "metrics")]
            counter!("levee_calls_total", "breaker" => name.clone(), "outcome" => "rejected")
                .increment(1);

            self.emit(CircuitBreakerEvent::CallRejected {
                pattern_name: name.clone(),
                timestamp: Instant::now(),
                state,
            });
            let message = self
                .config
                .open_error_message
                .clone()
                .unwrap_or_else(|| DEFAULT_OPEN_MESSAGE.to_string());
            callback(Err(BreakerError::OpenCircuit { message }), true);
            return;
        }

        #[cfg(feature = "tracing")]
        trace!(breaker = %name, "call permitted");

        let runtime = Handle::current();
        let pending = Arc::new(PendingCall::new(callback, runtime.clone()));
        let timer = {
            let shared = Arc::clone(self);
            let pending = Arc::clone(&pending);
            let timeout = self.config.timeout;
            runtime.spawn(async move {
                tokio::time::sleep(timeout).await;
                shared.on_timeout(&pending);
            })
        };
        pending.arm(timer);

        let shared = Arc::clone(self);
        self.command.execute(
            request,
            Completion::new(move |result| shared.on_response(&pending, result)),
        );
    }

    fn on_response(
        self: &Arc<Self>,
        pending: &PendingCall<Cmd::Response, Cmd::Error>,
        result: Result<Cmd::Response, Cmd::Error>,
    ) {
        let name = &self.config.name;
        let Some(callback) = pending.settle() else {
            #[cfg(feature = "tracing")]
            trace!(breaker = %name, "discarding response that arrived after the timeout");
            return;
        };
        pending.cancel_timer();

        let elapsed = pending.started.elapsed();
        #[cfg(feature = "metrics")]
        histogram!("levee_call_duration_seconds", "breaker" => name.clone())
            .record(elapsed.as_secs_f64());
        self.emit(CircuitBreakerEvent::CallDuration {
            pattern_name: name.clone(),
            timestamp: Instant::now(),
            elapsed,
        });

        let tripping = match &result {
            Err(error) => self.config.failure_classifier.classify(error),
            Ok(_) => false,
        };
        let transition = match &result {
            Err(error) if tripping => {
                #[cfg(feature = "metrics")]
                counter!("levee_calls_total", "breaker" => name.clone(), "outcome" => "failure")
                    .increment(1);
                self.emit(CircuitBreakerEvent::CallFailed {
                    pattern_name: name.clone(),
                    timestamp: Instant::now(),
                    error: error.to_string(),
                });

                let mut circuit = self.lock_circuit();
                circuit.clear_trial();
                if circuit.record_failure(self.config.max_failures) {
                    self.trip(&mut circuit, &pending.runtime)
                } else {
                    None
                }
            }
            _ => {
                #[cfg(feature = "metrics")]
                counter!("levee_calls_total", "breaker" => name.clone(), "outcome" => "success")
                    .increment(1);
                self.emit(CircuitBreakerEvent::CallSucceeded {
                    pattern_name: name.clone(),
                    timestamp: Instant::now(),
                });

                let mut circuit = self.lock_circuit();
                circuit.clear_trial();
                circuit.close()
            }
        };

        if let Some(transition) = transition {
            self.notify_transition(transition);
        }
        callback(result.map_err(BreakerError::Inner), tripping);
    }

    fn on_timeout(self: &Arc<Self>, pending: &PendingCall<Cmd::Response, Cmd::Error>) {
        let Some(callback) = pending.settle() else {
            return;
        };
        let name = &self.config.name;
        let timeout = self.config.timeout;

        #[cfg(feature = "tracing")]
        warn!(breaker = %name, timeout = ?timeout, "call timed out");
        #[cfg(feature = "metrics")]
        counter!("levee_calls_total", "breaker" => name.clone(), "outcome" => "timeout")
            .increment(1);

        self.emit(CircuitBreakerEvent::CallTimedOut {
            pattern_name: name.clone(),
            timestamp: Instant::now(),
            timeout,
        });

        let transition = {
            let mut circuit = self.lock_circuit();
            circuit.clear_trial();
            if circuit.record_failure(self.config.max_failures) {
                self.trip(&mut circuit, &pending.runtime)
            } else {
                None
            }
        };
        if let Some(transition) = transition {
            self.notify_transition(transition);
        }

        let message = self
            .config
            .timeout_error_message
            .clone()
            .unwrap_or_else(|| DEFAULT_TIMEOUT_MESSAGE.to_string());
        callback(Err(BreakerError::Timeout { message }), true);
    }
}

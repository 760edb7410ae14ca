use crate::circuit::CircuitState;
use crate::classifier::{DefaultClassifier, FnClassifier};
use crate::events::CircuitBreakerEvent;
use levee_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// Resolved once at construction and never mutated afterwards.
pub struct CircuitBreakerConfig<C = DefaultClassifier> {
    pub(crate) max_failures: usize,
    pub(crate) timeout: Duration,
    pub(crate) reset_timeout: Duration,
    pub(crate) failure_classifier: C,
    pub(crate) open_error_message: Option<String>,
    pub(crate) timeout_error_message: Option<String>,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig<DefaultClassifier> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<DefaultClassifier> {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();
        CircuitBreakerConfigBuilder::new()
    }
}

impl<C> CircuitBreakerConfig<C> {
    /// Consecutive tripping failures that open a closed breaker.
    pub fn max_failures(&self) -> usize {
        self.max_failures
    }

    /// Deadline for a single command invocation.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// How long the breaker stays open before admitting a trial call.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Message carried by rejections, if customized.
    pub fn open_error_message(&self) -> Option<&str> {
        self.open_error_message.as_deref()
    }

    /// Message carried by timeouts, if customized.
    pub fn timeout_error_message(&self) -> Option<&str> {
        self.timeout_error_message.as_deref()
    }

    /// The breaker's name, used to label events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for CircuitBreakerConfig<DefaultClassifier> {
    fn default() -> Self {
        CircuitBreakerConfig::builder().build()
    }
}

impl<C> std::fmt::Debug for CircuitBreakerConfig<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("max_failures", &self.max_failures)
            .field("timeout", &self.timeout)
            .field("reset_timeout", &self.reset_timeout)
            .field("open_error_message", &self.open_error_message)
            .field("timeout_error_message", &self.timeout_error_message)
            .field("listeners", &self.event_listeners.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`CircuitBreakerConfig`].
///
/// The classifier type is part of the builder's type: calling
/// [`failure_classifier`](Self::failure_classifier) switches it from
/// [`DefaultClassifier`] to an [`FnClassifier`].
pub struct CircuitBreakerConfigBuilder<C = DefaultClassifier> {
    max_failures: usize,
    timeout: Duration,
    reset_timeout: Duration,
    failure_classifier: C,
    open_error_message: Option<String>,
    timeout_error_message: Option<String>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder<DefaultClassifier> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_failures: 5,
            timeout: Duration::from_secs(10),
            reset_timeout: Duration::from_secs(60),
            failure_classifier: DefaultClassifier,
            open_error_message: None,
            timeout_error_message: None,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }
}

impl Default for CircuitBreakerConfigBuilder<DefaultClassifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CircuitBreakerConfigBuilder<C> {
    /// Sets how many consecutive tripping failures open a closed breaker.
    ///
    /// Values below 1 are raised to 1.
    ///
    /// Default: 5
    pub fn max_failures(mut self, n: usize) -> Self {
        self.max_failures = n;
        self
    }

    /// Sets the deadline for a single command invocation.
    ///
    /// Default: 10 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets how long the breaker stays open before moving to half-open.
    ///
    /// Default: 60 seconds
    pub fn reset_timeout(mut self, duration: Duration) -> Self {
        self.reset_timeout = duration;
        self
    }

    /// Sets the predicate deciding which command errors count toward opening.
    ///
    /// Errors the predicate rejects are still delivered to the caller; they
    /// just don't move the failure counter.
    ///
    /// Default: every error trips
    ///
    /// ```rust
    /// use levee_circuitbreaker::CircuitBreakerConfig;
    /// use std::io::{Error, ErrorKind};
    ///
    /// let config = CircuitBreakerConfig::builder()
    ///     .failure_classifier(|e: &Error| e.kind() != ErrorKind::NotFound)
    ///     .build();
    /// # let _ = config;
    /// ```
    pub fn failure_classifier<E, F>(self, f: F) -> CircuitBreakerConfigBuilder<FnClassifier<F>>
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        CircuitBreakerConfigBuilder {
            max_failures: self.max_failures,
            timeout: self.timeout,
            reset_timeout: self.reset_timeout,
            failure_classifier: FnClassifier::new(f),
            open_error_message: self.open_error_message,
            timeout_error_message: self.timeout_error_message,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }

    /// Sets the message carried by calls rejected while open.
    ///
    /// Default: `"Command not available."`
    pub fn open_error_message<M: Into<String>>(mut self, message: M) -> Self {
        self.open_error_message = Some(message.into());
        self
    }

    /// Sets the message carried by calls that time out.
    ///
    /// Default: `"Command timeout."`
    pub fn timeout_error_message<M: Into<String>>(mut self, message: M) -> Self {
        self.timeout_error_message = Some(message.into());
        self
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Registers a callback when the breaker changes state.
    ///
    /// Called with the previous state first, then the new one. Never called
    /// for a transition to the state the breaker is already in.
    ///
    /// ```rust
    /// use levee_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let config = CircuitBreakerConfig::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("breaker tripped ({from} -> {to})");
    ///         }
    ///     })
    ///     .build();
    /// # let _ = config;
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback for every call, before admission is decided.
    ///
    /// Receives the state the breaker was in when the call arrived.
    pub fn on_call_attempted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallAttempted { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback when a call is rejected without invoking the command.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback when the command responds with anything other
    /// than a tripping failure.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallSucceeded { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback when the command responds with a tripping failure.
    ///
    /// Receives the error's display text.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallFailed { error, .. } = event {
                    f(error);
                }
            }));
        self
    }

    /// Registers a callback when a call outlives the configured timeout.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallTimedOut { timeout, .. } = event {
                    f(*timeout);
                }
            }));
        self
    }

    /// Registers a callback with the elapsed time of every answered call.
    ///
    /// Calls that timed out or were rejected produce no duration.
    pub fn on_duration<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallDuration { elapsed, .. } = event {
                    f(*elapsed);
                }
            }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CircuitBreakerConfig<C> {
        CircuitBreakerConfig {
            max_failures: self.max_failures.max(1),
            timeout: self.timeout,
            reset_timeout: self.reset_timeout,
            failure_classifier: self.failure_classifier,
            open_error_message: self.open_error_message,
            timeout_error_message: self.timeout_error_message,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}

use thiserror::Error;

/// Default message for calls rejected by an open breaker.
pub const DEFAULT_OPEN_MESSAGE: &str = "Command not available.";

/// Default message for calls that outlived the configured timeout.
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "Command timeout.";

/// Errors delivered by a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerError<E> {
    /// The breaker is open, or half-open with its trial call in flight.
    /// The command was not invoked.
    #[error("{message}")]
    OpenCircuit {
        /// Configured rejection message.
        message: String,
    },

    /// The command did not respond before the deadline.
    #[error("{message}")]
    Timeout {
        /// Configured timeout message.
        message: String,
    },

    /// The command itself reported an error.
    #[error("{0}")]
    Inner(E),

    /// The callback was dropped before the call completed, e.g. because the
    /// runtime driving the breaker shut down.
    #[error("call was canceled before completing")]
    Canceled,
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected without invoking the command.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, BreakerError::OpenCircuit { .. })
    }

    /// Returns true if the call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// Returns true if the error came from the command.
    pub fn is_inner(&self) -> bool {
        matches!(self, BreakerError::Inner(_))
    }

    /// Errno-style code for the synthetic error kinds.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            BreakerError::OpenCircuit { .. } => Some("EUNAVAILABLE"),
            BreakerError::Timeout { .. } => Some("ETIMEDOUT"),
            BreakerError::Inner(_) | BreakerError::Canceled => None,
        }
    }

    /// Returns a reference to the command's error, if that is what this is.
    pub fn inner(&self) -> Option<&E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the command's error, if that is what this is.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the command's error, leaving the synthetic kinds untouched.
    pub fn map_inner<F, U>(self, f: F) -> BreakerError<U>
    where
        F: FnOnce(E) -> U,
    {
        match self {
            BreakerError::OpenCircuit { message } => BreakerError::OpenCircuit { message },
            BreakerError::Timeout { message } => BreakerError::Timeout { message },
            BreakerError::Inner(e) => BreakerError::Inner(f(e)),
            BreakerError::Canceled => BreakerError::Canceled,
        }
    }
}

impl<E> From<E> for BreakerError<E> {
    fn from(err: E) -> Self {
        BreakerError::Inner(err)
    }
}

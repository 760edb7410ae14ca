//! Failure classification.
//!
//! A classifier decides whether an error reported by the command counts toward
//! tripping the breaker. The error is delivered to the caller either way; the
//! classifier only controls the failure counter.

use std::sync::Arc;

/// Decides whether an error is a tripping failure.
pub trait FailureClassifier<E>: Send + Sync {
    /// Returns `true` if `error` should count toward opening the breaker.
    fn classify(&self, error: &E) -> bool;
}

/// Treats every error as a tripping failure.
///
/// ```rust
/// use levee_circuitbreaker::classifier::{DefaultClassifier, FailureClassifier};
///
/// assert!(FailureClassifier::<std::io::Error>::classify(
///     &DefaultClassifier,
///     &std::io::Error::other("fail"),
/// ));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<E> FailureClassifier<E> for DefaultClassifier {
    fn classify(&self, _error: &E) -> bool {
        true
    }
}

/// A classifier backed by a predicate.
///
/// ```rust
/// use levee_circuitbreaker::classifier::{FailureClassifier, FnClassifier};
/// use std::io::{Error, ErrorKind};
///
/// // Not-found is the caller's problem, not the dependency's.
/// let classifier = FnClassifier::new(|e: &Error| e.kind() != ErrorKind::NotFound);
///
/// assert!(!classifier.classify(&Error::new(ErrorKind::NotFound, "missing")));
/// assert!(classifier.classify(&Error::new(ErrorKind::ConnectionReset, "reset")));
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, E> FailureClassifier<E> for FnClassifier<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn classify(&self, error: &E) -> bool {
        (self.f)(error)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}

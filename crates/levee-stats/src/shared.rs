use crate::collector::Stats;
use crate::snapshot::Snapshot;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A [`Stats`] collector that can be shared across threads and tasks.
///
/// Clones share the same collector.
#[derive(Debug, Clone, Default)]
pub struct SharedStats {
    inner: Arc<Mutex<Stats>>,
}

impl SharedStats {
    /// Wraps `stats`.
    pub fn new(stats: Stats) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stats)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Stats> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`Stats::increment`].
    pub fn increment(&self, name: &str) {
        self.lock().increment(name);
    }

    /// See [`Stats::decrement`].
    pub fn decrement(&self, name: &str) {
        self.lock().decrement(name);
    }

    /// See [`Stats::sample`].
    pub fn sample(&self, name: &str, value: f64) {
        self.lock().sample(name, value);
    }

    /// See [`Stats::count`].
    pub fn count(&self, name: &str) -> i64 {
        self.lock().count(name)
    }

    /// See [`Stats::reset`].
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// See [`Stats::reset_counts`].
    pub fn reset_counts(&self, name: Option<&str>) {
        self.lock().reset_counts(name);
    }

    /// See [`Stats::reset_samples`].
    pub fn reset_samples(&self, name: Option<&str>) {
        self.lock().reset_samples(name);
    }

    /// See [`Stats::snapshot`].
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Runs `f` with exclusive access to the collector.
    pub fn with<R>(&self, f: impl FnOnce(&mut Stats) -> R) -> R {
        f(&mut self.lock())
    }
}

impl From<Stats> for SharedStats {
    fn from(stats: Stats) -> Self {
        Self::new(stats)
    }
}

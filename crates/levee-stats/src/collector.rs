use crate::snapshot::{SampleSummary, Snapshot};
use std::collections::{BTreeMap, VecDeque};

/// Named counters and named numeric samples.
///
/// Names spring into existence on first use: incrementing, decrementing or
/// sampling an unknown name creates it at zero (or empty) first. Resets
/// clear values but never forget names.
///
/// ```rust
/// use levee_stats::Stats;
///
/// let mut stats = Stats::new();
/// stats.increment("executions");
/// stats.sample("duration", 10.0);
/// stats.sample("duration", 30.0);
///
/// let snapshot = stats.snapshot();
/// assert_eq!(snapshot.count("executions"), Some(1));
/// assert_eq!(snapshot.sample("duration").unwrap().average, 20.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Stats {
    counts: BTreeMap<String, i64>,
    samples: BTreeMap<String, VecDeque<f64>>,
    max_samples: Option<usize>,
}

impl Stats {
    /// Creates an empty collector that retains every sample.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new builder.
    pub fn builder() -> StatsBuilder {
        StatsBuilder::new()
    }

    /// Adds one to counter `name`.
    pub fn increment(&mut self, name: &str) {
        *self.counter(name) += 1;
    }

    /// Subtracts one from counter `name`.
    pub fn decrement(&mut self, name: &str) {
        *self.counter(name) -= 1;
    }

    /// Appends `value` to sample `name`, dropping the oldest observation
    /// once the retention limit is exceeded.
    pub fn sample(&mut self, name: &str, value: f64) {
        let max = self.max_samples;
        let values = self.samples.entry(name.to_owned()).or_default();
        values.push_back(value);
        if let Some(max) = max {
            while values.len() > max {
                values.pop_front();
            }
        }
    }

    /// Current value of counter `name`, or zero if it was never referenced.
    pub fn count(&self, name: &str) -> i64 {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// Zeroes every counter and empties every sample.
    pub fn reset(&mut self) {
        self.reset_counts(None);
        self.reset_samples(None);
    }

    /// Zeroes counter `name`, or every counter when `name` is `None`.
    ///
    /// Resetting a name that does not exist yet creates it.
    pub fn reset_counts(&mut self, name: Option<&str>) {
        match name {
            Some(name) => *self.counter(name) = 0,
            None => self.counts.values_mut().for_each(|count| *count = 0),
        }
    }

    /// Empties sample `name`, or every sample when `name` is `None`.
    ///
    /// Resetting a name that does not exist yet creates it.
    pub fn reset_samples(&mut self, name: Option<&str>) {
        match name {
            Some(name) => self.samples.entry(name.to_owned()).or_default().clear(),
            None => self.samples.values_mut().for_each(VecDeque::clear),
        }
    }

    /// The retention limit per sample, if any.
    pub fn max_samples(&self) -> Option<usize> {
        self.max_samples
    }

    /// Copies the current counters and summarizes the current samples.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            counts: self.counts.clone(),
            samples: self
                .samples
                .iter()
                .map(|(name, values)| (name.clone(), SampleSummary::of(values.iter().copied())))
                .collect(),
        }
    }

    fn counter(&mut self, name: &str) -> &mut i64 {
        self.counts.entry(name.to_owned()).or_insert(0)
    }
}

/// Builder for [`Stats`].
#[derive(Debug, Clone, Default)]
pub struct StatsBuilder {
    max_samples: Option<usize>,
}

impl StatsBuilder {
    /// Creates a builder with unbounded sample retention.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retains at most `n` observations per sample, oldest dropped first.
    ///
    /// Default: unbounded
    pub fn max_samples(mut self, n: usize) -> Self {
        self.max_samples = Some(n);
        self
    }

    /// Builds an empty collector.
    pub fn build(self) -> Stats {
        Stats {
            max_samples: self.max_samples,
            ..Stats::default()
        }
    }
}

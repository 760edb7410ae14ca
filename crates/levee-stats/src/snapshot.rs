use std::collections::BTreeMap;

/// Summary of one sample sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleSummary {
    /// Number of retained observations.
    pub count: usize,
    /// Arithmetic mean of the retained observations. Infinite when there are none.
    pub average: f64,
}

impl SampleSummary {
    pub(crate) fn of(values: impl IntoIterator<Item = f64>) -> Self {
        let (count, total) = values
            .into_iter()
            .fold((0usize, 0.0), |(count, total), value| (count + 1, total + value));
        let average = if count == 0 {
            f64::INFINITY
        } else {
            total / count as f64
        };
        Self { count, average }
    }
}

/// A point-in-time copy of a [`Stats`](crate::Stats) collector.
///
/// Later changes to the collector are not reflected here.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Counter values by name.
    pub counts: BTreeMap<String, i64>,
    /// Sample summaries by name.
    pub samples: BTreeMap<String, SampleSummary>,
}

impl Snapshot {
    /// Value of counter `name`, if it has ever been referenced.
    pub fn count(&self, name: &str) -> Option<i64> {
        self.counts.get(name).copied()
    }

    /// Summary of sample `name`, if it has ever been referenced.
    pub fn sample(&self, name: &str) -> Option<&SampleSummary> {
        self.samples.get(name)
    }
}

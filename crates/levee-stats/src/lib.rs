//! Named counters and samples with point-in-time snapshots.
//!
//! [`Stats`] is a plain, synchronous collector: counters are integers that
//! can go up or down, samples are sequences of numeric observations that can
//! be bounded to the most recent `n`. A [`Snapshot`] copies the counters and
//! reduces every sample to its count and mean.
//!
//! [`SharedStats`] wraps a collector for use from event listeners running on
//! arbitrary threads.
//!
//! ```rust
//! use levee_stats::Stats;
//!
//! let mut stats = Stats::builder().max_samples(100).build();
//! stats.increment("executions");
//! stats.sample("duration", 12.5);
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.counts["executions"], 1);
//! assert_eq!(snapshot.samples["duration"].count, 1);
//! ```
//!
//! ## Feature Flags
//! - `serde`: `Serialize`/`Deserialize` for [`Snapshot`] and [`SampleSummary`]

pub use collector::{Stats, StatsBuilder};
pub use shared::SharedStats;
pub use snapshot::{SampleSummary, Snapshot};

mod collector;
mod shared;
mod snapshot;

//! Group-wide min/max/mean of per-rank samples, materialized at the root.

use serde::Serialize;
use tracing::debug;

use crate::comm::{Communicator, ReduceOp};
use crate::error::Result;

use super::exchange::Sample;

/// Partial reduction of one metric: min, max, sum and sample count.
///
/// `merge` is associative and commutative, so partials can be combined in any
/// order. The mean is only formed at the end, from the total sum and count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl Summary {
    pub const EMPTY: Summary = Summary {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
        sum: 0.0,
        count: 0,
    };

    pub fn of(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    pub fn from_values(values: &[f64]) -> Self {
        values
            .iter()
            .fold(Self::EMPTY, |acc, &v| acc.merge(&Self::of(v)))
    }

    pub fn merge(&self, other: &Summary) -> Summary {
        Summary {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
            count: self.count + other.count,
        }
    }

    /// `None` when no sample contributed.
    pub fn finish(&self) -> Option<Aggregate> {
        (self.count > 0).then(|| Aggregate {
            min: self.min,
            max: self.max,
            avg: self.sum / self.count as f64,
        })
    }
}

/// Group-wide statistic for one metric in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aggregate {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl Aggregate {
    pub fn scaled(&self, factor: f64) -> Aggregate {
        Aggregate {
            min: self.min * factor,
            max: self.max * factor,
            avg: self.avg * factor,
        }
    }
}

/// Both metrics for one iteration, as seen by the root.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationStats {
    pub bandwidth_gbps: Aggregate,
    pub duration_secs: Aggregate,
}

/// Per-rank contribution to one iteration's reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalStats {
    pub bandwidth: Summary,
    pub duration: Summary,
}

impl LocalStats {
    pub const EMPTY: LocalStats = LocalStats {
        bandwidth: Summary::EMPTY,
        duration: Summary::EMPTY,
    };

    pub fn from_samples(samples: &[Sample]) -> Self {
        samples.iter().fold(Self::EMPTY, |acc, s| LocalStats {
            bandwidth: acc.bandwidth.merge(&Summary::of(s.bandwidth_gbps)),
            duration: acc.duration.merge(&Summary::of(s.duration_secs)),
        })
    }
}

impl From<Sample> for LocalStats {
    fn from(sample: Sample) -> Self {
        Self::from_samples(&[sample])
    }
}

fn reduce_summary<C: Communicator + ?Sized>(
    comm: &C,
    local: &Summary,
    count: Option<f64>,
    root: usize,
) -> Result<Option<Summary>> {
    let min = comm.reduce(local.min, ReduceOp::Min, root)?;
    let max = comm.reduce(local.max, ReduceOp::Max, root)?;
    let sum = comm.reduce(local.sum, ReduceOp::Sum, root)?;
    Ok(match (min, max, sum, count) {
        (Some(min), Some(max), Some(sum), Some(count)) => Some(Summary {
            min,
            max,
            sum,
            count: count as u64,
        }),
        _ => None,
    })
}

/// Reduce every rank's contribution to `root`. Returns `Some` only at `root`.
///
/// Collective: every rank must call this once per iteration.
pub fn aggregate<C: Communicator + ?Sized>(
    comm: &C,
    local: &LocalStats,
    root: usize,
) -> Result<Option<IterationStats>> {
    // Bandwidth and duration always carry the same number of samples.
    let count = comm.reduce(local.duration.count as f64, ReduceOp::Sum, root)?;
    let bandwidth = reduce_summary(comm, &local.bandwidth, count, root)?;
    let duration = reduce_summary(comm, &local.duration, count, root)?;

    let bandwidth = bandwidth.and_then(|s| s.finish());
    let duration = duration.and_then(|s| s.finish());
    let stats = match (bandwidth, duration) {
        (Some(bandwidth_gbps), Some(duration_secs)) => Some(IterationStats {
            bandwidth_gbps,
            duration_secs,
        }),
        _ => None,
    };
    if let Some(stats) = &stats {
        debug!(rank = comm.rank(), ?stats, "iteration aggregated");
    }
    Ok(stats)
}

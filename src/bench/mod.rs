//! 基准测试核心
//!
//! Exchange engine, statistics aggregation, reporting and the run loop.

pub mod exchange;
pub mod report;
pub mod run;
pub mod stats;

pub use exchange::{ExchangeMode, Sample, bandwidth_gbps, exchange, timed_transfer};
pub use report::{Reporter, banner, format_json, format_text};
pub use run::{
    CancelToken, Phase, RunLoop, RunSummary, check_device_count, preflight, run_rank,
};
pub use stats::{Aggregate, IterationStats, LocalStats, Summary, aggregate};

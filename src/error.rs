//! Error types
//!
//! Every error here is fatal: the binary turns any of them into a group-wide abort.

use thiserror::Error;

use crate::comm::CommError;
use crate::mem::MemError;

/// Top-level benchmark error.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("GPU mode requested but binary not built with the `cuda` feature")]
    DeviceUnsupported,

    #[error(
        "device/process mismatch: {devices} device(s) visible but {processes} process(es) on this node"
    )]
    DeviceCountMismatch { devices: usize, processes: usize },

    #[error("pre-flight failed on another rank")]
    PeerFailed,

    #[error(transparent)]
    Comm(#[from] CommError),

    #[error(transparent)]
    Mem(#[from] MemError),

    #[error("report output failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = BenchError> = std::result::Result<T, E>;

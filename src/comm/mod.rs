//! 进程组通信
//!
//! Boundary to the process group runtime. Every method is collective or paired:
//! all live members must call it in the same order, and it blocks until its
//! completion condition holds.

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi_comm;

pub use local::{LocalComm, LocalGroup};
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

use thiserror::Error;

/// Rank that collects reductions and prints reports.
pub const ROOT: usize = 0;

/// Runtime failures of the process group.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("rank {peer} disconnected")]
    Disconnected { peer: usize },

    #[error("rank {peer} sent {got} where {expected} was expected")]
    Protocol {
        peer: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("rank {rank} out of range for group of {size}")]
    InvalidRank { rank: usize, size: usize },

    #[error("payload from rank {peer} has {actual} bytes, receive buffer holds {expected}")]
    Truncated {
        peer: usize,
        expected: usize,
        actual: usize,
    },
}

/// Reduction operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Min,
    Max,
    Sum,
}

impl ReduceOp {
    /// Combine two values. Associative and commutative for every operator.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Sum => a + b,
        }
    }
}

/// Process group runtime used by the benchmark core.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Rank among the processes sharing this node, and how many there are.
    fn node_local(&self) -> (usize, usize);

    fn barrier(&self) -> Result<(), CommError>;

    /// Send `send` to `dest` while receiving `recv.len()` bytes from `source`.
    /// Returns once both directions have completed.
    fn sendrecv(
        &self,
        send: &[u8],
        dest: usize,
        recv: &mut [u8],
        source: usize,
    ) -> Result<(), CommError>;

    /// Reduce one value per rank to `root`. Only `root` gets `Some`.
    fn reduce(&self, value: f64, op: ReduceOp, root: usize) -> Result<Option<f64>, CommError>;

    /// Distribute `value` from `root`; every rank returns root's value.
    fn broadcast(&self, value: f64, root: usize) -> Result<f64, CommError>;

    fn all_reduce(&self, value: f64, op: ReduceOp) -> Result<f64, CommError> {
        let reduced = self.reduce(value, op, ROOT)?;
        self.broadcast(reduced.unwrap_or(value), ROOT)
    }

    /// Terminate every member of the group.
    fn abort(&self, code: i32) -> !;
}

pub(crate) fn check_rank(rank: usize, size: usize) -> Result<(), CommError> {
    if rank < size {
        Ok(())
    } else {
        Err(CommError::InvalidRank { rank, size })
    }
}

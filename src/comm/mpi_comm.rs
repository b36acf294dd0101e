//! MPI group runtime.
//!
//! Requires the `mpi` feature and an MPI installation. MPI's default error
//! handler aborts the job on any failed call, which is the policy the benchmark
//! wants anyway.

use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::point_to_point;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use tracing::debug;

use super::{CommError, Communicator, ReduceOp, check_rank};

pub struct MpiComm {
    // Dropping the universe finalizes MPI, so it lives as long as the communicator.
    _universe: Universe,
    world: SimpleCommunicator,
    node_rank: usize,
    node_size: usize,
}

impl MpiComm {
    /// Initialize MPI. Returns `None` if MPI was already initialized.
    pub fn init() -> Option<Self> {
        let universe = mpi::initialize()?;
        let world = universe.world();
        let node = world.split_shared(world.rank());
        let node_rank = node.rank() as usize;
        let node_size = node.size() as usize;
        debug!(
            rank = world.rank(),
            size = world.size(),
            node_rank,
            node_size,
            "MPI initialized"
        );
        Some(Self {
            _universe: universe,
            world,
            node_rank,
            node_size,
        })
    }
}

fn system_op(op: ReduceOp) -> SystemOperation {
    match op {
        ReduceOp::Min => SystemOperation::min(),
        ReduceOp::Max => SystemOperation::max(),
        ReduceOp::Sum => SystemOperation::sum(),
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn node_local(&self) -> (usize, usize) {
        (self.node_rank, self.node_size)
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.world.barrier();
        Ok(())
    }

    fn sendrecv(
        &self,
        send: &[u8],
        dest: usize,
        recv: &mut [u8],
        source: usize,
    ) -> Result<(), CommError> {
        check_rank(dest, self.size())?;
        check_rank(source, self.size())?;
        let dest_proc = self.world.process_at_rank(dest as i32);
        let source_proc = self.world.process_at_rank(source as i32);
        let status = point_to_point::send_receive_into(send, &dest_proc, recv, &source_proc);
        let got = status.count(u8::equivalent_datatype()) as usize;
        if got != recv.len() {
            return Err(CommError::Truncated {
                peer: source,
                expected: recv.len(),
                actual: got,
            });
        }
        Ok(())
    }

    fn reduce(&self, value: f64, op: ReduceOp, root: usize) -> Result<Option<f64>, CommError> {
        check_rank(root, self.size())?;
        let root_proc = self.world.process_at_rank(root as i32);
        if self.rank() == root {
            let mut out = 0.0f64;
            root_proc.reduce_into_root(&value, &mut out, system_op(op));
            Ok(Some(out))
        } else {
            root_proc.reduce_into(&value, system_op(op));
            Ok(None)
        }
    }

    fn broadcast(&self, value: f64, root: usize) -> Result<f64, CommError> {
        check_rank(root, self.size())?;
        let mut v = value;
        self.world.process_at_rank(root as i32).broadcast_into(&mut v);
        Ok(v)
    }

    fn all_reduce(&self, value: f64, op: ReduceOp) -> Result<f64, CommError> {
        let mut out = 0.0f64;
        self.world.all_reduce_into(&value, &mut out, system_op(op));
        Ok(out)
    }

    fn abort(&self, code: i32) -> ! {
        self.world.abort(code)
    }
}

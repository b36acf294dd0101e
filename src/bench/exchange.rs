//! Timed bidirectional exchange between ring neighbors.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::comm::Communicator;
use crate::error::Result;
use crate::mem::BufferPair;
use crate::topo::RingTopology;

/// How the payload travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMode {
    /// Send to `next` and receive from `prev` through the group runtime.
    Transfer,
    /// Copy send into recv directly. Only chosen for a single-rank group.
    LocalCopy,
}

impl ExchangeMode {
    pub fn select(topo: &RingTopology, mem_copy_local: bool) -> Self {
        if mem_copy_local && topo.is_self_loop() {
            Self::LocalCopy
        } else {
            Self::Transfer
        }
    }
}

/// One rank's measurement for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Seconds from barrier release until both directions completed.
    pub duration_secs: f64,
    pub bandwidth_gbps: f64,
}

impl Sample {
    pub fn new(msg_size: usize, elapsed: Duration) -> Self {
        let duration_secs = elapsed.as_secs_f64();
        Self {
            duration_secs,
            bandwidth_gbps: bandwidth_gbps(msg_size, duration_secs),
        }
    }
}

/// Bytes moved in both directions per second, in GB/s (1e9).
pub fn bandwidth_gbps(msg_size: usize, duration_secs: f64) -> f64 {
    (2 * msg_size) as f64 / duration_secs / 1e9
}

/// Send/receive (or local copy), timed with a monotonic clock.
///
/// The caller is expected to have just left a group barrier so that every
/// rank starts its clock at the same point.
pub fn timed_transfer<C: Communicator + ?Sized>(
    comm: &C,
    topo: &RingTopology,
    buffers: &mut BufferPair,
    mode: ExchangeMode,
) -> Result<Sample> {
    let msg_size = buffers.len();
    let BufferPair { send, recv } = buffers;

    let t0 = Instant::now();
    match mode {
        ExchangeMode::Transfer => {
            let out = send.wire_out()?;
            comm.sendrecv(out, topo.next, recv.wire_in(), topo.prev)?;
            recv.commit_wire()?;
        }
        ExchangeMode::LocalCopy => recv.copy_from(send)?,
    }
    let elapsed = t0.elapsed();

    Ok(Sample::new(msg_size, elapsed))
}

/// One full exchange step: group barrier, then [`timed_transfer`].
pub fn exchange<C: Communicator + ?Sized>(
    comm: &C,
    topo: &RingTopology,
    buffers: &mut BufferPair,
    mode: ExchangeMode,
) -> Result<Sample> {
    comm.barrier()?;
    timed_transfer(comm, topo, buffers, mode)
}

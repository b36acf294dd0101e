//! Pre-flight validation and the perpetual measurement loop.

use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, error, info, trace};

use crate::comm::{Communicator, ROOT, ReduceOp};
use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::mem::BufferPair;
use crate::topo::RingTopology;

use super::exchange::{ExchangeMode, Sample, timed_transfer};
use super::report::Reporter;
use super::stats::{IterationStats, LocalStats, aggregate};

/// Cancellation request shared with whoever wants the loop to stop.
///
/// Only observed once per iteration, after reporting.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Loop phases, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Sleeping,
    Synchronizing,
    Exchanging,
    Aggregating,
    Reporting,
}

impl Phase {
    /// Successor in the cycle. `Sleeping` is skipped when there is no interval.
    pub fn next(self, sleeps: bool) -> Phase {
        match self {
            Phase::Sleeping => Phase::Synchronizing,
            Phase::Synchronizing => Phase::Exchanging,
            Phase::Exchanging => Phase::Aggregating,
            Phase::Aggregating => Phase::Reporting,
            Phase::Reporting if sleeps => Phase::Sleeping,
            Phase::Reporting => Phase::Synchronizing,
        }
    }

    /// Entered straight from the barrier; nothing may run before its clock starts.
    pub fn is_timed(self) -> bool {
        self == Phase::Exchanging
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Sleeping => "sleeping",
            Phase::Synchronizing => "synchronizing",
            Phase::Exchanging => "exchanging",
            Phase::Aggregating => "aggregating",
            Phase::Reporting => "reporting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
}

/// One device per process on the node: `devices` must equal `local_size`.
pub fn check_device_count(devices: usize, local_size: usize) -> Result<()> {
    if devices != local_size {
        return Err(BenchError::DeviceCountMismatch {
            devices,
            processes: local_size,
        });
    }
    Ok(())
}

fn device_ordinal<C: Communicator + ?Sized>(comm: &C, cfg: &BenchConfig) -> Result<usize> {
    if !cfg.gpu() {
        return Ok(0);
    }
    #[cfg(not(feature = "cuda"))]
    {
        let _ = comm;
        Err(BenchError::DeviceUnsupported)
    }
    #[cfg(feature = "cuda")]
    {
        let (local_rank, local_size) = comm.node_local();
        check_device_count(crate::mem::device_count()?, local_size)?;
        Ok(local_rank)
    }
}

/// Validate the configuration and allocate buffers, then agree on the verdict
/// with every other rank. Either all ranks get `Ok` or all get `Err`.
///
/// The rank that detected a problem gets its own error; the others get
/// [`BenchError::PeerFailed`].
#[tracing::instrument(skip_all, fields(rank = comm.rank(), size = comm.size()))]
pub fn preflight<C: Communicator + ?Sized>(
    comm: &C,
    cfg: &BenchConfig,
) -> Result<(RingTopology, BufferPair)> {
    let topo = RingTopology::resolve(comm.rank(), comm.size());
    let local = cfg
        .validate()
        .and_then(|()| device_ordinal(comm, cfg))
        .and_then(|ordinal| BufferPair::allocate(cfg.memory, cfg.msg_size, ordinal));
    // Report before agreeing: once the verdict is out, peers may abort the group.
    if let Err(e) = &local {
        error!(error = %e, "pre-flight check failed");
    }

    let failed = comm.all_reduce(if local.is_err() { 1.0 } else { 0.0 }, ReduceOp::Max)?;
    match local {
        Err(e) => Err(e),
        Ok(_) if failed > 0.0 => Err(BenchError::PeerFailed),
        Ok(buffers) => {
            debug!(next = topo.next, prev = topo.prev, "pre-flight passed");
            Ok((topo, buffers))
        }
    }
}

/// The measurement loop of one rank.
pub struct RunLoop<'a, C: Communicator + ?Sized, W: Write> {
    comm: &'a C,
    cfg: BenchConfig,
    topo: RingTopology,
    buffers: BufferPair,
    mode: ExchangeMode,
    /// Present only at the root.
    reporter: Option<Reporter<W>>,
    cancel: CancelToken,
}

impl<'a, C: Communicator + ?Sized, W: Write> RunLoop<'a, C, W> {
    pub fn new(
        comm: &'a C,
        cfg: BenchConfig,
        topo: RingTopology,
        buffers: BufferPair,
        reporter: Option<Reporter<W>>,
        cancel: CancelToken,
    ) -> Self {
        let mode = ExchangeMode::select(&topo, cfg.mem_copy_local);
        let reporter = reporter.filter(|_| comm.rank() == ROOT);
        Self {
            comm,
            cfg,
            topo,
            buffers,
            mode,
            reporter,
            cancel,
        }
    }

    /// Run until the cancellation token fires on any rank.
    ///
    /// Without a token or `max_iterations` this never returns `Ok`. Every
    /// collective happens in the same phase on every rank; the cancellation
    /// flags are combined right after `Reporting`, outside the timed region.
    pub fn run(mut self) -> Result<(RunSummary, BufferPair, Option<Reporter<W>>)> {
        let rank = self.comm.rank();
        let interval = self.cfg.interval();
        let sleeps = interval.is_some();
        info!(rank, mode = ?self.mode, msg_size = self.cfg.msg_size, "entering loop");

        let mut iterations: u64 = 0;
        let mut phase = if sleeps {
            Phase::Sleeping
        } else {
            Phase::Synchronizing
        };
        let mut sample: Option<Sample> = None;
        let mut stats: Option<IterationStats> = None;
        loop {
            if !phase.is_timed() {
                trace!(rank, iteration = iterations, %phase);
            }
            match phase {
                Phase::Sleeping => {
                    if let Some(d) = interval {
                        thread::sleep(d);
                    }
                }
                Phase::Synchronizing => self.comm.barrier()?,
                Phase::Exchanging => {
                    sample = Some(timed_transfer(
                        self.comm,
                        &self.topo,
                        &mut self.buffers,
                        self.mode,
                    )?);
                }
                Phase::Aggregating => {
                    let local = sample
                        .take()
                        .map(LocalStats::from)
                        .unwrap_or(LocalStats::EMPTY);
                    stats = aggregate(self.comm, &local, ROOT)?;
                }
                Phase::Reporting => {
                    if let (Some(stats), Some(reporter)) =
                        (stats.take(), self.reporter.as_mut())
                    {
                        reporter.report(iterations, &stats)?;
                    }
                    iterations += 1;
                    if self.cfg.max_iterations.is_some_and(|max| iterations >= max) {
                        self.cancel.cancel();
                    }
                    let local_stop = if self.cancel.is_cancelled() { 1.0 } else { 0.0 };
                    if self.comm.all_reduce(local_stop, ReduceOp::Max)? > 0.0 {
                        break;
                    }
                }
            }
            phase = phase.next(sleeps);
        }

        info!(rank, iterations, "loop stopped");
        Ok((RunSummary { iterations }, self.buffers, self.reporter))
    }
}

/// Full lifecycle of one rank: banner, pre-flight, loop, release.
pub fn run_rank<C: Communicator + ?Sized, W: Write>(
    comm: &C,
    cfg: &BenchConfig,
    out: W,
    cancel: CancelToken,
) -> Result<RunSummary> {
    let mut reporter = (comm.rank() == ROOT).then(|| Reporter::new(out, cfg.format));
    if let Some(r) = reporter.as_mut() {
        r.banner(cfg)?;
    }

    let (topo, buffers) = preflight(comm, cfg)?;
    let (summary, buffers, _reporter) =
        RunLoop::new(comm, cfg.clone(), topo, buffers, reporter, cancel).run()?;
    buffers.release();
    Ok(summary)
}

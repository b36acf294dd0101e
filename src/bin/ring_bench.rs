//! Ring 通信基准
//!
//! Every rank sends to its successor and receives from its predecessor once per
//! iteration; rank 0 prints group-wide bandwidth and duration statistics.

use clap::Parser;
use ring_bench::bench::{CancelToken, run_rank};
use ring_bench::comm::Communicator;
use ring_bench::config::{
    BenchConfig, DEFAULT_INTERVAL_SECS, DEFAULT_MSG_SIZE, ReportFormat, parse_msg_size,
};
use ring_bench::error::BenchError;
use ring_bench::mem::MemorySpace;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "ring_bench", about = "Ring point-to-point bandwidth benchmark")]
struct Args {
    /// Exchange payload in bytes; float notation such as 64e6 is accepted
    #[arg(long, default_value_t = DEFAULT_MSG_SIZE, value_parser = parse_msg_size)]
    msg_size: usize,

    /// Seconds to sleep between iterations; 0 disables sleeping
    #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS, allow_negative_numbers = true)]
    interval: f64,

    /// Use device memory buffers
    #[arg(long)]
    gpu: bool,

    /// With a single rank, copy locally instead of sending to self
    #[arg(long)]
    mem_copy_local: bool,

    /// Number of ranks in the in-process group (ignored with the `mpi` feature)
    #[arg(
        long,
        default_value_t = 1,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    ranks: usize,

    /// Stop after this many iterations instead of running until killed
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Statistics line format: text or json
    #[arg(long, default_value = "text", value_parser = ReportFormat::parse)]
    format: ReportFormat,
}

impl Args {
    fn config(&self) -> BenchConfig {
        BenchConfig {
            msg_size: self.msg_size,
            interval_secs: self.interval,
            memory: if self.gpu {
                MemorySpace::Device
            } else {
                MemorySpace::Host
            },
            mem_copy_local: self.mem_copy_local,
            max_iterations: self.max_iterations,
            format: self.format,
        }
    }
}

fn rank_main<C: Communicator + ?Sized>(comm: &C, cfg: &BenchConfig, cancel: CancelToken) {
    match run_rank(comm, cfg, std::io::stdout(), cancel) {
        Ok(summary) => {
            info!(rank = comm.rank(), iterations = summary.iterations, "done");
        }
        Err(BenchError::PeerFailed) => comm.abort(1),
        Err(e) => {
            error!(rank = comm.rank(), error = %e, "aborting process group");
            comm.abort(1)
        }
    }
}

fn main() {
    // Logs go to stderr; stdout carries only the banner and statistics.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    let cfg = args.config();
    let cancel = CancelToken::new();

    #[cfg(feature = "mpi")]
    {
        let _ = args.ranks;
        let Some(comm) = ring_bench::comm::MpiComm::init() else {
            error!("MPI was already initialized");
            std::process::exit(1);
        };
        info!(rank = comm.rank(), size = comm.size(), "MPI group formed");
        rank_main(&comm, &cfg, cancel);
    }

    #[cfg(not(feature = "mpi"))]
    {
        info!(ranks = args.ranks, "starting in-process group");
        ring_bench::comm::LocalGroup::run(args.ranks, |comm| {
            rank_main(&comm, &cfg, cancel.clone())
        });
    }
}

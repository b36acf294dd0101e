//! Root-only output: startup banner and one statistics line per iteration.

use std::io::{self, Write};

use serde::Serialize;

use crate::config::{BenchConfig, ReportFormat};

use super::stats::{Aggregate, IterationStats};

pub fn banner(cfg: &BenchConfig) -> String {
    format!(
        "Ring comm benchmark.\n\
         Message size: {} bytes (~{} GB).\n\
         Interval:     {} seconds.\n\
         GPU mode:     {}\n",
        cfg.msg_size,
        cfg.msg_size as f64 / 1e9,
        cfg.interval_secs,
        if cfg.gpu() {
            "on (transfers staged through host memory)"
        } else {
            "off"
        },
    )
}

/// Fixed-width text line: bandwidth in GB/s, then duration in ms.
pub fn format_text(stats: &IterationStats) -> String {
    let bw = stats.bandwidth_gbps;
    let ms = stats.duration_secs.scaled(1e3);
    format!(
        "Bandwidth (send + recv): min = {:>10.3} GB/s | max = {:>10.3} GB/s | avg = {:>10.3} GB/s \
         || Duration (send + recv): min = {:>10.3} ms | max = {:>10.3} ms | avg = {:>10.3} ms",
        bw.min, bw.max, bw.avg, ms.min, ms.max, ms.avg
    )
}

#[derive(Serialize)]
struct JsonLine {
    iteration: u64,
    bandwidth_gbps: Aggregate,
    duration_ms: Aggregate,
}

pub fn format_json(iteration: u64, stats: &IterationStats) -> String {
    let round3 = |a: Aggregate| Aggregate {
        min: (a.min * 1e3).round() / 1e3,
        max: (a.max * 1e3).round() / 1e3,
        avg: (a.avg * 1e3).round() / 1e3,
    };
    let line = JsonLine {
        iteration,
        bandwidth_gbps: round3(stats.bandwidth_gbps),
        duration_ms: round3(stats.duration_secs.scaled(1e3)),
    };
    // Serializing plain numbers cannot fail.
    serde_json::to_string(&line).unwrap_or_default()
}

/// Writes report lines. Does no synchronization of its own.
pub struct Reporter<W: Write> {
    out: W,
    format: ReportFormat,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self { out, format }
    }

    pub fn banner(&mut self, cfg: &BenchConfig) -> io::Result<()> {
        if self.format == ReportFormat::Text {
            self.out.write_all(banner(cfg).as_bytes())?;
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn report(&mut self, iteration: u64, stats: &IterationStats) -> io::Result<()> {
        let line = match self.format {
            ReportFormat::Text => format_text(stats),
            ReportFormat::Json => format_json(iteration, stats),
        };
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

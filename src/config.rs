//! Benchmark configuration.

use std::time::Duration;

use serde::Serialize;

use crate::error::{BenchError, Result};
use crate::mem::MemorySpace;

pub const DEFAULT_MSG_SIZE: usize = 1024 * 1024;
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// How the per-iteration statistics line is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl ReportFormat {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_lowercase().as_str() {
            "" | "text" | "txt" => Ok(Self::Text),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!("unknown report format: {raw}")),
        }
    }
}

/// Parse a message size in bytes. Float notation (`64e6`, `1.5e3`) is accepted
/// and truncated toward zero.
pub fn parse_msg_size(raw: &str) -> Result<usize, String> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<usize>() {
        return Ok(n);
    }
    let v: f64 = raw
        .parse()
        .map_err(|_| format!("invalid message size: {raw}"))?;
    if !v.is_finite() || v < 0.0 {
        return Err(format!("invalid message size: {raw}"));
    }
    Ok(v as usize)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchConfig {
    pub msg_size: usize,
    /// Seconds to sleep before each iteration; 0 disables sleeping.
    pub interval_secs: f64,
    pub memory: MemorySpace,
    /// Single-rank groups copy locally instead of sending to themselves.
    pub mem_copy_local: bool,
    /// Fire the cancellation signal after this many iterations.
    pub max_iterations: Option<u64>,
    pub format: ReportFormat,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            msg_size: DEFAULT_MSG_SIZE,
            interval_secs: DEFAULT_INTERVAL_SECS,
            memory: MemorySpace::Host,
            mem_copy_local: false,
            max_iterations: None,
            format: ReportFormat::Text,
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.msg_size == 0 {
            return Err(BenchError::InvalidConfig(
                "message size must be at least 1 byte".into(),
            ));
        }
        Duration::try_from_secs_f64(self.interval_secs).map_err(|e| {
            BenchError::InvalidConfig(format!(
                "interval must be a non-negative number of seconds, got {}: {e}",
                self.interval_secs
            ))
        })?;
        Ok(())
    }

    /// `None` when sleeping is disabled or the interval does not validate.
    pub fn interval(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
    }

    pub fn gpu(&self) -> bool {
        self.memory == MemorySpace::Device
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_msg_size_accepts_float_notation() {
        assert_eq!(parse_msg_size("1048576").unwrap(), 1_048_576);
        assert_eq!(parse_msg_size("64e6").unwrap(), 64_000_000);
        assert_eq!(parse_msg_size(" 1.9 ").unwrap(), 1);
        assert!(parse_msg_size("-5").is_err());
        assert!(parse_msg_size("lots").is_err());
        assert!(parse_msg_size("inf").is_err());
    }

    #[test]
    fn parse_report_format_aliases() {
        assert_eq!(ReportFormat::parse("TEXT").unwrap(), ReportFormat::Text);
        assert_eq!(ReportFormat::parse(" json ").unwrap(), ReportFormat::Json);
        assert_eq!(ReportFormat::parse("").unwrap(), ReportFormat::Text);
        assert!(ReportFormat::parse("xml").is_err());
    }

    #[test]
    fn validate_rejects_zero_size_and_bad_interval() {
        let mut cfg = BenchConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.interval(), Some(Duration::from_secs(1)));

        cfg.interval_secs = 0.0;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.interval(), None);

        cfg.interval_secs = -1.0;
        assert!(matches!(cfg.validate(), Err(BenchError::InvalidConfig(_))));

        cfg.interval_secs = f64::NAN;
        assert!(cfg.validate().is_err());

        cfg.interval_secs = f64::INFINITY;
        assert!(cfg.validate().is_err());

        let cfg = BenchConfig {
            msg_size: 0,
            ..BenchConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(BenchError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_interval_beyond_duration_range() {
        let cfg = BenchConfig {
            interval_secs: 1e300,
            ..BenchConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(BenchError::InvalidConfig(_))));
        assert_eq!(cfg.interval(), None);

        let cfg = BenchConfig {
            interval_secs: 0.25,
            ..BenchConfig::default()
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.interval(), Some(Duration::from_millis(250)));
    }
}

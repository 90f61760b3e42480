//! Service configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration:
//!
//! ```yaml
//! feed_path: livetiming_cache.txt
//! reference_path: data/drs_data.json
//! publish_delay_secs: 30.0
//! poll_interval_ms: 100
//! scan_interval_ms: 100
//! segment_cooldown_secs: 180
//! calibration_window_secs: 300
//! control_capacity: 16
//! from_start: false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::control::DEFAULT_CONTROL_CAPACITY;
use crate::processors::SessionTimings;
use crate::scheduler::MAX_PUBLISH_DELAY_SECS;
use crate::{DrsError, Result};

/// Default publish delay in seconds.
pub const DEFAULT_PUBLISH_DELAY_SECS: f64 = 30.0;

/// Upper bound for the segment cooldown and calibration window, in seconds.
pub const MAX_SESSION_TIMING_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// File the live-timing client appends events to.
    pub feed_path: PathBuf,
    /// Driver and team reference data.
    pub reference_path: PathBuf,
    pub publish_delay_secs: f64,
    pub poll_interval_ms: u64,
    pub scan_interval_ms: u64,
    pub segment_cooldown_secs: u64,
    pub calibration_window_secs: u64,
    pub control_capacity: usize,
    /// Replay the whole feed file instead of starting at its end.
    pub from_start: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            feed_path: PathBuf::from("livetiming_cache.txt"),
            reference_path: PathBuf::from("data/drs_data.json"),
            publish_delay_secs: DEFAULT_PUBLISH_DELAY_SECS,
            poll_interval_ms: 100,
            scan_interval_ms: 100,
            segment_cooldown_secs: 180,
            calibration_window_secs: 300,
            control_capacity: DEFAULT_CONTROL_CAPACITY,
            from_start: false,
        }
    }
}

impl ServiceConfig {
    /// Parse a YAML configuration document.
    pub fn parse(text: &str) -> Result<Self> {
        // An empty document deserializes as null rather than an empty mapping
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(text)
            .map_err(|e| DrsError::config("service config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DrsError::config("service config", format!("{}: {}", path.display(), e))
        })?;
        let config = Self::parse(&text)?;
        debug!(?config, "Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let delay = self.publish_delay_secs;
        if !delay.is_finite() || !(0.0..=MAX_PUBLISH_DELAY_SECS).contains(&delay) {
            return Err(DrsError::config(
                "publish_delay_secs",
                format!("must be between 0 and {MAX_PUBLISH_DELAY_SECS} seconds, got {delay}"),
            ));
        }
        if self.poll_interval_ms == 0 || self.scan_interval_ms == 0 {
            return Err(DrsError::config(
                "intervals",
                "poll and scan intervals must be at least 1 ms",
            ));
        }
        for (field, secs) in [
            ("segment_cooldown_secs", self.segment_cooldown_secs),
            ("calibration_window_secs", self.calibration_window_secs),
        ] {
            if secs > MAX_SESSION_TIMING_SECS {
                return Err(DrsError::config(
                    field,
                    format!("must be at most {MAX_SESSION_TIMING_SECS} seconds, got {secs}"),
                ));
            }
        }
        if self.control_capacity == 0 {
            return Err(DrsError::config("control_capacity", "must be at least 1"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn timings(&self) -> SessionTimings {
        SessionTimings {
            segment_cooldown: Duration::from_secs(self.segment_cooldown_secs),
            calibration_window: Duration::from_secs(self.calibration_window_secs),
        }
    }
}

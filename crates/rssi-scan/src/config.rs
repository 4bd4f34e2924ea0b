//! Scanner configuration.
//!
//! Values come from (highest precedence first) command-line flags,
//! environment variables, an optional TOML file and the defaults below. This
//! module owns the file layer and validation; the binary layers flags and
//! environment on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::model::Targets;
use crate::{Error, Result};

pub const DEFAULT_INTERFACE: &str = "wlan0";
pub const DEFAULT_INTERVAL_SECS: f64 = 4.0;
pub const DEFAULT_TIMEOUT_SECS: f64 = 3.5;
pub const DEFAULT_FULL_SCAN_MINS: f64 = 10.0;
pub const DEFAULT_OUTPUT: &str = "/data/wifi_rssi_log.csv";
pub const DEFAULT_FLUSH_EVERY: usize = 5;
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Longest interval, timeout or full-scan period accepted, in seconds.
pub const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Wireless interface to scan.
    pub interface: String,
    /// Seconds between cycle starts.
    pub interval_secs: f64,
    /// Per-scan timeout in seconds.
    pub timeout_secs: f64,
    /// Minutes between forced full discoveries.
    pub full_scan_mins: f64,
    /// CSV log path.
    pub output: PathBuf,
    /// Flush the log after this many non-empty batches.
    pub flush_every: usize,
    /// SSIDs and/or BSSIDs to track. Empty logs everything.
    pub targets: Vec<String>,
    /// Optional node tag written to every row.
    pub node_id: Option<String>,
    /// Path to the `iw` binary.
    pub iw_path: String,
    /// Depth of the scheduler to writer queue.
    pub queue_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            full_scan_mins: DEFAULT_FULL_SCAN_MINS,
            output: PathBuf::from(DEFAULT_OUTPUT),
            flush_every: DEFAULT_FLUSH_EVERY,
            targets: Vec::new(),
            node_id: None,
            iw_path: "iw".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ScanConfig {
    /// Load a TOML file; missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(Error::config("interface must not be empty"));
        }
        duration_secs("interval_secs", self.interval_secs)?;
        duration_secs("timeout_secs", self.timeout_secs)?;
        duration_secs("full_scan_mins", self.full_scan_mins * 60.0)?;
        if self.flush_every == 0 {
            return Err(Error::config("flush_every must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be at least 1"));
        }
        if self.iw_path.trim().is_empty() {
            return Err(Error::config("iw_path must not be empty"));
        }
        Ok(())
    }

    /// Replace the target list from a comma-separated string.
    pub fn set_targets(&mut self, list: &str) {
        self.targets = Targets::parse(list).iter().map(str::to_string).collect();
    }

    pub fn targets(&self) -> Targets {
        Targets::new(&self.targets)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn full_scan_period(&self) -> Duration {
        Duration::from_secs_f64(self.full_scan_mins * 60.0)
    }

    /// Node tag, treating a blank value as unset.
    pub fn node(&self) -> Option<&str> {
        self.node_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn duration_secs(name: &str, secs: f64) -> Result<()> {
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if d.is_zero() => Err(Error::config(format!(
            "{name} must be a positive number, got {secs}"
        ))),
        Ok(_) if secs > MAX_DURATION_SECS => Err(Error::config(format!(
            "{name} must be at most one week, got {secs}"
        ))),
        Ok(_) => Ok(()),
        Err(_) => Err(Error::config(format!(
            "{name} must be a positive number, got {secs}"
        ))),
    }
}

//! Scan command execution.
//!
//! [`Scanner`] is the seam between the scheduler and the external scanning
//! utility. [`IwScanner`] drives `iw`; tests substitute scripted scanners.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use process_utils::run_captured;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ScanConfig;
use crate::error::ScanError;

/// Lower bound for the full-discovery timeout.
///
/// A full discovery sweeps every channel on both bands, which takes several
/// seconds on most drivers regardless of the configured per-scan timeout.
pub const FULL_SCAN_TIMEOUT_FLOOR: Duration = Duration::from_millis(4500);

/// Runs wireless scans and returns the raw output lines.
#[async_trait]
pub trait Scanner: Send + Sync + 'static {
    /// Wireless interface being scanned.
    fn interface(&self) -> &str;

    /// Scan every supported channel.
    async fn full_scan(&self, cancel: &CancellationToken) -> Result<Vec<String>, ScanError>;

    /// Scan only `freqs` (MHz). Fails with [`ScanError::EmptyFrequencyList`]
    /// when `freqs` is empty.
    async fn narrow_scan(
        &self,
        freqs: &BTreeSet<u32>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ScanError>;
}

/// Scanner backed by `iw dev <iface> scan ap-force`.
#[derive(Debug, Clone)]
pub struct IwScanner {
    iw_path: String,
    interface: String,
    timeout: Duration,
}

impl IwScanner {
    pub fn new(interface: impl Into<String>, timeout: Duration) -> Self {
        Self {
            iw_path: "iw".to_string(),
            interface: interface.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.interface.clone(), config.scan_timeout()).with_iw_path(&config.iw_path)
    }

    /// Use a different `iw` binary.
    pub fn with_iw_path(mut self, path: impl Into<String>) -> Self {
        self.iw_path = path.into();
        self
    }

    /// Timeout applied to narrow scans.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Timeout applied to full discovery.
    pub fn full_scan_timeout(&self) -> Duration {
        self.timeout.max(FULL_SCAN_TIMEOUT_FLOOR)
    }

    fn full_scan_args(&self) -> Vec<String> {
        ["dev", self.interface.as_str(), "scan", "ap-force"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn narrow_scan_args(&self, freqs: &BTreeSet<u32>) -> Vec<String> {
        let mut args = self.full_scan_args();
        args.push("freq".to_string());
        args.extend(freqs.iter().map(u32::to_string));
        args
    }

    async fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ScanError> {
        debug!(command = %format!("{} {}", self.iw_path, args.join(" ")), ?timeout, "Running scan");

        let mut cmd = process_utils::tokio_command(&self.iw_path);
        cmd.args(&args).env("LC_ALL", "C");

        let output = run_captured(cmd, timeout, cancel).await?;
        if !output.success() {
            return Err(ScanError::Failed {
                code: output.code(),
                stderr: output.stderr_lossy(),
            });
        }
        Ok(output.stdout_lines())
    }
}

#[async_trait]
impl Scanner for IwScanner {
    fn interface(&self) -> &str {
        &self.interface
    }

    async fn full_scan(&self, cancel: &CancellationToken) -> Result<Vec<String>, ScanError> {
        self.run(self.full_scan_args(), self.full_scan_timeout(), cancel)
            .await
    }

    async fn narrow_scan(
        &self,
        freqs: &BTreeSet<u32>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ScanError> {
        if freqs.is_empty() {
            return Err(ScanError::EmptyFrequencyList);
        }
        self.run(self.narrow_scan_args(freqs), self.timeout, cancel)
            .await
    }
}

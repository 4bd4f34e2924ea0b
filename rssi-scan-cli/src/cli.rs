use std::path::PathBuf;

use clap::Parser;
use rssi_scan::ScanConfig;

#[derive(Parser, Debug, Default)]
#[command(name = "rssi-scan")]
#[command(about = "Adaptive Wi-Fi RSSI logger")]
#[command(
    long_about = "Periodically samples Wi-Fi signal strength with `iw` and appends it to a CSV log.\n\n\
    When targets are given, scans are narrowed to the channels where those networks were last \
    seen, with a full sweep every few minutes and whenever a target goes missing."
)]
#[command(version)]
pub struct Args {
    /// Wireless interface to scan
    #[arg(long = "if", env = "RSSI_SCAN_IFACE", value_name = "IFACE")]
    pub interface: Option<String>,

    /// Seconds between scan cycles
    #[arg(long, env = "RSSI_SCAN_INTERVAL", value_name = "SECS")]
    pub interval: Option<f64>,

    /// Per-scan timeout in seconds
    #[arg(long, env = "RSSI_SCAN_TIMEOUT", value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Minutes between forced full discoveries
    #[arg(long, env = "RSSI_SCAN_FULL_SCAN_MINS", value_name = "MINS")]
    pub full_scan_mins: Option<f64>,

    /// CSV log file
    #[arg(long = "out", env = "RSSI_SCAN_OUT", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Flush the log after this many non-empty batches
    #[arg(long, env = "RSSI_SCAN_FLUSH_EVERY", value_name = "N")]
    pub flush_every: Option<usize>,

    /// Comma-separated SSIDs and/or BSSIDs to track (default: log everything)
    #[arg(long, env = "RSSI_SCAN_TARGETS", value_name = "LIST")]
    pub targets: Option<String>,

    /// Node tag written to every row
    #[arg(long, env = "RSSI_SCAN_NODE_ID", value_name = "ID")]
    pub node_id: Option<String>,

    /// Path to the iw binary
    #[arg(long, env = "RSSI_SCAN_IW_PATH", value_name = "PATH")]
    pub iw_path: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "RSSI_SCAN_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write daily-rotated logs to this directory
    #[arg(long, env = "RSSI_SCAN_LOG_DIR", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    /// Build the effective configuration: file (if any) over defaults, then
    /// flags and environment on top.
    pub fn load_config(&self) -> rssi_scan::Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::load(path)?,
            None => ScanConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut ScanConfig) {
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(mins) = self.full_scan_mins {
            config.full_scan_mins = mins;
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(flush_every) = self.flush_every {
            config.flush_every = flush_every;
        }
        if let Some(targets) = &self.targets {
            config.set_targets(targets);
        }
        if let Some(node_id) = &self.node_id {
            config.node_id = Some(node_id.clone());
        }
        if let Some(iw_path) = &self.iw_path {
            config.iw_path = iw_path.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_parse() {
        let args = Args::try_parse_from([
            "rssi-scan",
            "--if",
            "wlp3s0",
            "--interval",
            "2",
            "--targets",
            "HomeWiFi,Office-AP",
            "--out",
            "/tmp/rssi.csv",
        ])
        .unwrap();

        assert_eq!(args.interface.as_deref(), Some("wlp3s0"));
        assert_eq!(args.interval, Some(2.0));
        assert_eq!(args.output, Some(PathBuf::from("/tmp/rssi.csv")));
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
interface = "wlan1"
interval_secs = 8.0
targets = ["FromFile"]
queue_capacity = 4
"#
        )
        .unwrap();

        let args = Args {
            config: Some(file.path().to_path_buf()),
            interval: Some(2.0),
            targets: Some("HomeWiFi, Office-AP".to_string()),
            ..Default::default()
        };
        let config = args.load_config().unwrap();

        assert_eq!(config.interface, "wlan1");
        assert_eq!(config.interval_secs, 2.0);
        assert_eq!(config.targets, vec!["HomeWiFi", "Office-AP"]);
        assert_eq!(config.queue_capacity, 4);
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Args::default().load_config().unwrap();
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = Args {
            flush_every: Some(0),
            ..Default::default()
        };
        assert!(args.load_config().is_err());
    }
}

//! End-to-end pipeline tests against a scripted scanner and a temp CSV log.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rssi_scan::{ScanConfig, ScanError, Scanner, spawn_pipeline};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Scanner whose target network switches channel after a few narrow scans.
#[derive(Clone, Default)]
struct RoamingScanner {
    state: Arc<Mutex<RoamingState>>,
}

#[derive(Default)]
struct RoamingState {
    full_scans: usize,
    narrow_scans: Vec<Vec<u32>>,
    moved: bool,
}

impl RoamingScanner {
    fn current_freq(state: &RoamingState) -> u32 {
        if state.moved { 2462 } else { 2437 }
    }

    fn stanza(bssid: &str, ssid: &str, freq: u32, signal: f64) -> Vec<String> {
        vec![
            format!("BSS {bssid}(on wlan0) -- associated"),
            "\tTSF: 123456789 usec".to_string(),
            format!("\tfreq: {freq}"),
            format!("\tsignal: {signal:.2} dBm"),
            format!("\tSSID: {ssid}"),
        ]
    }

    fn move_target(&self) {
        self.state.lock().unwrap().moved = true;
    }

    fn full_scans(&self) -> usize {
        self.state.lock().unwrap().full_scans
    }

    fn narrow_scans(&self) -> Vec<Vec<u32>> {
        self.state.lock().unwrap().narrow_scans.clone()
    }
}

#[async_trait]
impl Scanner for RoamingScanner {
    fn interface(&self) -> &str {
        "wlan0"
    }

    async fn full_scan(&self, _cancel: &CancellationToken) -> Result<Vec<String>, ScanError> {
        let mut state = self.state.lock().unwrap();
        state.full_scans += 1;
        let mut lines = Self::stanza(
            "AA:BB:CC:DD:EE:FF",
            "Home",
            Self::current_freq(&state),
            -45.0,
        );
        lines.extend(Self::stanza("11:22:33:44:55:66", "Neighbour", 5180, -80.0));
        Ok(lines)
    }

    async fn narrow_scan(
        &self,
        freqs: &BTreeSet<u32>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<String>, ScanError> {
        let mut state = self.state.lock().unwrap();
        state.narrow_scans.push(freqs.iter().copied().collect());
        let freq = Self::current_freq(&state);
        if freqs.contains(&freq) {
            Ok(Self::stanza("aa:bb:cc:dd:ee:ff", "Home", freq, -50.5))
        } else {
            Ok(Vec::new())
        }
    }
}

fn rows(config: &ScanConfig) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(&config.output).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_target_tracking_across_channel_change() {
    let dir = TempDir::new().unwrap();
    let mut config = ScanConfig {
        output: dir.path().join("logs/rssi.csv"),
        interval_secs: 4.0,
        flush_every: 2,
        node_id: Some("node1".to_string()),
        ..Default::default()
    };
    config.set_targets("Home");

    let scanner = RoamingScanner::default();
    let stop = CancellationToken::new();
    let handle = spawn_pipeline(config.clone(), scanner.clone(), stop.clone());

    // Cycles at 0, 4 and 8s: one discovery and two narrow scans.
    tokio::time::sleep(Duration::from_secs(10)).await;
    scanner.move_target();
    // Cycle at 12s misses and falls back; 16s narrows on the new channel.
    tokio::time::sleep(Duration::from_secs(8)).await;
    stop.cancel();

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.scheduler.cycles, 5);
    assert_eq!(report.scheduler.fallbacks, 1);
    assert_eq!(scanner.full_scans(), 2);
    assert_eq!(
        scanner.narrow_scans(),
        vec![vec![2437], vec![2437], vec![2437], vec![2462]]
    );

    let rows = rows(&config);
    assert_eq!(rows.len(), 5);
    // Only the target is logged, never the neighbour.
    assert!(rows.iter().all(|r| r[4] == "Home"));
    assert!(rows.iter().all(|r| r[1] == "wlan0" && r[2] == "node1"));
    assert!(rows.iter().all(|r| r[3] == "aa:bb:cc:dd:ee:ff"));
    assert_eq!(rows[0][5], "-45.0");
    assert_eq!(rows[1][5], "-50.5");
    assert_eq!((rows[0][6].as_str(), rows[0][7].as_str()), ("2437", "6"));
    assert_eq!((rows[4][6].as_str(), rows[4][7].as_str()), ("2462", "11"));
    assert!(rows.iter().all(|r| r[0].ends_with('Z') && r[0].len() == 24));
}

#[tokio::test(start_paused = true)]
async fn test_unfiltered_logging_appends_across_runs() {
    let dir = TempDir::new().unwrap();
    let config = ScanConfig {
        output: dir.path().join("rssi.csv"),
        interval_secs: 2.0,
        ..Default::default()
    };

    for _ in 0..2 {
        let scanner = RoamingScanner::default();
        let stop = CancellationToken::new();
        let handle = spawn_pipeline(config.clone(), scanner.clone(), stop.clone());
        tokio::time::sleep(Duration::from_secs(3)).await;
        stop.cancel();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.scheduler.cycles, 2);
        assert_eq!(report.scheduler.narrow_scans, 0);
        assert_eq!(scanner.full_scans(), 2);
    }

    let content = std::fs::read_to_string(&config.output).unwrap();
    assert_eq!(content.matches("timestamp_utc").count(), 1);

    let rows = rows(&config);
    // Two runs, two cycles each, two networks per cycle.
    assert_eq!(rows.len(), 8);
    assert_eq!(rows.iter().filter(|r| r[4] == "Neighbour").count(), 4);
    assert!(rows.iter().all(|r| r[2].is_empty()));
}

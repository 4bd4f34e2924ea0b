//! Scan scheduler (the producer side of the pipeline).
//!
//! The scheduler runs one scan cycle per cadence slot:
//!
//! - **Deciding**: a full discovery is due when none has happened yet or the
//!   last one is older than the full-scan period. Otherwise the target set is
//!   resolved against the [`FrequencyCache`]; known frequencies lead to a
//!   narrow scan, anything else to a full discovery.
//! - **Full discovery** rebuilds the cache from the unfiltered result.
//! - **Narrow scan** adds to the cache. If no target shows up on the cached
//!   frequencies, the cycle falls back to a full discovery so a target that
//!   moved channel is found again.
//! - **Emitting** filters the records to the targets (when any are set) and
//!   pushes one [`ScanBatch`] onto the bounded queue, waiting for space if
//!   the writer is behind.
//! - **Backoff**: a failed cycle emits nothing and sleeps for an exponential
//!   delay before waiting for the next cadence slot.
//!
//! Cycle `n + 1` is due at `deadline(n) + interval`, so slow cycles do not
//! accumulate drift; an overrunning cycle is followed immediately by the next
//! one, never overlapped.

mod backoff;

pub use backoff::Backoff;

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::FrequencyCache;
use crate::error::ScanError;
use crate::executor::Scanner;
use crate::model::{AccessPointRecord, ScanBatch, Targets};
use crate::parser::parse_scan_output;

/// Minimum pause between two cycles, even when behind schedule.
pub const MIN_CYCLE_GAP: Duration = Duration::from_millis(50);

/// Counters kept over the scheduler's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub full_discoveries: u64,
    pub narrow_scans: u64,
    /// Narrow scans that saw no target and fell back to full discovery.
    pub fallbacks: u64,
    pub failures: u64,
    pub batches_emitted: u64,
}

/// Adaptive scan scheduler.
///
/// Owns the frequency cache, cadence and backoff state exclusively; none of
/// it is shared with other tasks.
pub struct ScanScheduler<S> {
    scanner: S,
    targets: Targets,
    interval: Duration,
    full_scan_period: Duration,
    cache: FrequencyCache,
    last_full_discovery: Option<Instant>,
    backoff: Backoff,
    stats: SchedulerStats,
}

impl<S: Scanner> ScanScheduler<S> {
    pub fn new(
        scanner: S,
        targets: Targets,
        interval: Duration,
        full_scan_period: Duration,
    ) -> Self {
        Self {
            scanner,
            targets,
            interval,
            full_scan_period,
            cache: FrequencyCache::new(),
            last_full_discovery: None,
            backoff: Backoff::default(),
            stats: SchedulerStats::default(),
        }
    }

    /// Override the failure backoff.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn cache(&self) -> &FrequencyCache {
        &self.cache
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    fn full_discovery_due(&self) -> bool {
        match self.last_full_discovery {
            None => true,
            Some(at) => at.elapsed() > self.full_scan_period,
        }
    }

    async fn full_discovery(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<AccessPointRecord>, ScanError> {
        let lines = self.scanner.full_scan(cancel).await?;
        let records = parse_scan_output(&lines);

        self.cache.rebuild(&records);
        self.last_full_discovery = Some(Instant::now());
        self.stats.full_discoveries += 1;

        debug!(
            records = records.len(),
            bssids = self.cache.bssid_count(),
            ssids = self.cache.ssid_count(),
            "Full discovery complete"
        );
        Ok(records)
    }

    async fn narrow_scan(
        &mut self,
        freqs: &BTreeSet<u32>,
        cancel: &CancellationToken,
    ) -> Result<Vec<AccessPointRecord>, ScanError> {
        let lines = self.scanner.narrow_scan(freqs, cancel).await?;
        let records = parse_scan_output(&lines);
        self.stats.narrow_scans += 1;

        if !self.targets.is_empty() && !self.targets.any_match(&records) {
            info!(
                ?freqs,
                records = records.len(),
                "No target seen on cached frequencies, running full discovery"
            );
            self.stats.fallbacks += 1;
            return self.full_discovery(cancel).await;
        }

        self.cache.record(&records);
        Ok(records)
    }

    /// Run one scan cycle and return the records to persist.
    pub async fn scan_cycle(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<AccessPointRecord>, ScanError> {
        let records = if self.full_discovery_due() {
            self.full_discovery(cancel).await?
        } else {
            let freqs = if self.targets.is_empty() {
                BTreeSet::new()
            } else {
                self.cache.resolve(&self.targets)
            };
            if freqs.is_empty() {
                self.full_discovery(cancel).await?
            } else {
                self.narrow_scan(&freqs, cancel).await?
            }
        };

        if self.targets.is_empty() {
            return Ok(records);
        }
        Ok(records
            .into_iter()
            .filter(|r| self.targets.matches(r))
            .collect())
    }

    /// Drive cycles until `cancel` fires or the queue closes.
    ///
    /// Dropping `tx` on return is what lets the writer drain and stop.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<ScanBatch>,
        cancel: CancellationToken,
    ) -> SchedulerStats {
        info!(
            interface = self.scanner.interface(),
            interval = ?self.interval,
            full_scan_period = ?self.full_scan_period,
            targets = %self.targets,
            "Scan scheduler started"
        );

        let mut deadline = Instant::now();
        loop {
            if cancel.is_cancelled() {
                break;
            }
            deadline = match deadline.checked_add(self.interval) {
                Some(next) => next,
                None => {
                    error!(
                        interval = ?self.interval,
                        "Cycle interval overflows the clock, stopping scheduler"
                    );
                    break;
                }
            };
            let timestamp = Utc::now();
            self.stats.cycles += 1;

            match self.scan_cycle(&cancel).await {
                Ok(records) => {
                    self.backoff.reset();
                    let batch = ScanBatch::new(timestamp, self.scanner.interface(), records);
                    debug!(records = batch.records.len(), "Emitting batch");
                    if tx.send(batch).await.is_err() {
                        error!("Batch queue closed, stopping scheduler");
                        break;
                    }
                    self.stats.batches_emitted += 1;
                }
                Err(ScanError::Cancelled) => {
                    debug!("In-flight scan abandoned");
                    break;
                }
                Err(e) => {
                    self.stats.failures += 1;
                    let delay = self.backoff.next_delay();
                    warn!(error = %e, backoff = ?delay, "Scan cycle failed");
                    if !sleep_or_cancel(delay, &cancel).await {
                        break;
                    }
                }
            }

            let wait = deadline
                .saturating_duration_since(Instant::now())
                .max(MIN_CYCLE_GAP);
            if !sleep_or_cancel(wait, &cancel).await {
                break;
            }
        }

        info!(
            cycles = self.stats.cycles,
            full_discoveries = self.stats.full_discoveries,
            narrow_scans = self.stats.narrow_scans,
            fallbacks = self.stats.fallbacks,
            failures = self.stats.failures,
            batches = self.stats.batches_emitted,
            "Scan scheduler stopped"
        );
        self.stats
    }
}

/// Sleep for `duration`; returns `false` if cancelled first.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

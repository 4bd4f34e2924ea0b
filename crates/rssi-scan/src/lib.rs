//! # rssi-scan
//!
//! Periodic Wi-Fi signal sampling with an adaptive scan scheduler.
//!
//! Each cycle the [`scheduler`] decides between a full spectrum discovery and
//! a cheap scan restricted to the frequencies where the configured targets
//! were last seen. Batches of parsed access-point records flow through a
//! bounded queue to the [`writer`], which appends them to a CSV log. The
//! [`shutdown`] coordinator wires both tasks together and drains the queue on
//! stop.
//!
//! ## Components
//!
//! - [`parser`]: `iw` scan text to [`AccessPointRecord`]s
//! - [`executor`]: runs the scan command with a hard timeout
//! - [`cache`]: target to frequency index owned by the scheduler
//! - [`scheduler`]: the producer loop (cadence, full/narrow decision, backoff)
//! - [`writer`]: the CSV consumer with batch-count flushing
//! - [`shutdown`]: task orchestration and drain-on-stop

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod parser;
pub mod scheduler;
pub mod shutdown;
pub mod writer;

#[cfg(test)]
mod test_utils;

pub use cache::FrequencyCache;
pub use config::ScanConfig;
pub use error::{Error, Result, ScanError};
pub use executor::{IwScanner, Scanner};
pub use model::{AccessPointRecord, ScanBatch, Targets};
pub use parser::{freq_to_channel, parse_scan_output};
pub use scheduler::{Backoff, ScanScheduler, SchedulerStats};
pub use shutdown::{PipelineReport, run_pipeline, spawn_pipeline};
pub use writer::{CsvLogWriter, DurableWrite, WriterStats};

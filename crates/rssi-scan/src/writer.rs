//! Batched CSV writer (the consumer side of the pipeline).
//!
//! Rows are encoded into an in-memory buffer and pushed to the sink after a
//! fixed number of non-empty batches, so the storage medium sees one write
//! burst every few cycles instead of one per cycle. All sink I/O runs on the
//! blocking pool; a slow `fsync` never stalls a runtime worker.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info};

use crate::Result;
use crate::model::{AccessPointRecord, ScanBatch};

/// Column names, in order.
pub const CSV_HEADER: [&str; 8] = [
    "timestamp_utc",
    "iface",
    "node",
    "bssid",
    "ssid",
    "signal_dbm",
    "freq_mhz",
    "channel",
];

const BUFFER_CAPACITY: usize = 1 << 20;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A byte sink that can push written data to durable storage.
pub trait DurableWrite: Write + Send + 'static {
    fn sync_data(&mut self) -> io::Result<()>;
}

impl DurableWrite for File {
    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Counters kept over the writer's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub batches_received: u64,
    /// Rows that reached the sink and were synced.
    pub rows_written: u64,
    pub flushes: u64,
    /// Batches lost to encode or flush errors.
    pub batches_dropped: u64,
}

#[derive(Serialize)]
struct LogRow<'a> {
    timestamp_utc: &'a str,
    iface: &'a str,
    node: &'a str,
    bssid: &'a str,
    ssid: &'a str,
    signal_dbm: Option<f64>,
    freq_mhz: Option<u32>,
    channel: Option<u32>,
}

impl<'a> LogRow<'a> {
    fn new(
        timestamp_utc: &'a str,
        iface: &'a str,
        node: &'a str,
        record: &'a AccessPointRecord,
    ) -> Self {
        Self {
            timestamp_utc,
            iface,
            node,
            bssid: record.bssid.as_deref().unwrap_or_default(),
            ssid: record.ssid.as_deref().unwrap_or_default(),
            signal_dbm: record.signal_dbm,
            freq_mhz: record.freq_mhz,
            channel: record.channel,
        }
    }
}

/// Appends scan batches to a CSV log.
///
/// Rows of pending batches live in memory until the next flush. A failed
/// flush discards them all, so nothing counted as dropped can reach the sink
/// later.
pub struct CsvLogWriter<W = File> {
    label: String,
    node: String,
    flush_every: usize,
    buffer: Vec<u8>,
    pending_batches: usize,
    pending_rows: u64,
    sink: W,
    stats: WriterStats,
}

impl CsvLogWriter<File> {
    /// Open `path` for appending, creating it and its parent directories if
    /// needed. The header is written only to a missing or empty file.
    ///
    /// This blocks; call it from the blocking pool inside a runtime.
    pub fn open(path: impl AsRef<Path>, node: Option<&str>, flush_every: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let needs_header = match std::fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = Self::with_sink(file, path.display().to_string(), node, flush_every);
        if needs_header {
            writer.write_header()?;
            debug!(path = %path.display(), "Wrote CSV header");
        }
        Ok(writer)
    }
}

impl<W: DurableWrite> CsvLogWriter<W> {
    /// Write to an arbitrary sink. No header is written; see [`Self::write_header`].
    pub fn with_sink(
        sink: W,
        label: impl Into<String>,
        node: Option<&str>,
        flush_every: usize,
    ) -> Self {
        Self {
            label: label.into(),
            node: node.unwrap_or_default().to_string(),
            flush_every: flush_every.max(1),
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            pending_batches: 0,
            pending_rows: 0,
            sink,
            stats: WriterStats::default(),
        }
    }

    /// Write the header row straight to the sink and flush it.
    pub fn write_header(&mut self) -> Result<()> {
        let mut bytes = Vec::new();
        {
            let mut header = csv::Writer::from_writer(&mut bytes);
            header.write_record(CSV_HEADER)?;
            header.flush()?;
        }
        self.sink.write_all(&bytes)?;
        self.sink.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Append one batch, flushing when the threshold is reached.
    ///
    /// A batch that fails to encode is dropped on its own. A failed flush
    /// drops every batch pending since the previous flush and resets the
    /// pending counter.
    pub fn write_batch(&mut self, batch: &ScanBatch) -> Result<()> {
        self.stats.batches_received += 1;
        if batch.is_empty() {
            return Ok(());
        }

        let rows = match self.encode(batch) {
            Ok(rows) => rows,
            Err(e) => {
                self.stats.batches_dropped += 1;
                return Err(e);
            }
        };
        self.buffer.extend_from_slice(&rows);
        self.pending_batches += 1;
        self.pending_rows += batch.records.len() as u64;

        if self.pending_batches >= self.flush_every {
            self.sync()?;
        }
        Ok(())
    }

    fn encode(&self, batch: &ScanBatch) -> Result<Vec<u8>> {
        let timestamp = batch.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let mut bytes = Vec::new();
        {
            let mut rows = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut bytes);
            for record in &batch.records {
                rows.serialize(LogRow::new(&timestamp, &batch.interface, &self.node, record))?;
            }
            rows.flush()?;
        }
        Ok(bytes)
    }

    /// Push pending rows to the sink and sync them. No-op when nothing is
    /// pending.
    pub fn sync(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let result = self
            .sink
            .write_all(&self.buffer)
            .and_then(|()| self.sink.flush())
            .and_then(|()| self.sink.sync_data());

        self.buffer.clear();
        let batches = std::mem::take(&mut self.pending_batches) as u64;
        let rows = std::mem::take(&mut self.pending_rows);

        match result {
            Ok(()) => {
                self.stats.flushes += 1;
                self.stats.rows_written += rows;
                Ok(())
            }
            Err(e) => {
                self.stats.batches_dropped += batches;
                Err(e.into())
            }
        }
    }

    /// Consume batches until every sender is gone, then flush once more.
    ///
    /// Errors are logged and never end the loop; the only error returned is a
    /// failed blocking task.
    pub async fn run(self, mut rx: mpsc::Receiver<ScanBatch>) -> Result<WriterStats> {
        info!(sink = %self.label, flush_every = self.flush_every, "CSV writer started");

        let mut writer = self;
        while let Some(batch) = rx.recv().await {
            writer = spawn_blocking(move || {
                if let Err(e) = writer.write_batch(&batch) {
                    error!(
                        sink = %writer.label,
                        records = batch.records.len(),
                        error = %e,
                        "Failed to write batch, dropping it"
                    );
                }
                writer
            })
            .await?;
        }

        let writer = spawn_blocking(move || {
            if let Err(e) = writer.sync() {
                error!(sink = %writer.label, error = %e, "Final flush failed");
            }
            writer
        })
        .await?;

        info!(
            batches = writer.stats.batches_received,
            rows = writer.stats.rows_written,
            dropped = writer.stats.batches_dropped,
            "CSV writer stopped"
        );
        Ok(writer.stats)
    }
}

//! Pipeline orchestration and drain-on-stop.
//!
//! [`run_pipeline`] owns the two tasks and the queue between them. Stopping
//! cancels only the producer: the writer keeps consuming until the producer's
//! sender is dropped, so every batch that made it into the queue is written.

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, spawn_blocking};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ScanConfig;
use crate::executor::Scanner;
use crate::scheduler::{ScanScheduler, SchedulerStats};
use crate::writer::{CsvLogWriter, WriterStats};
use crate::{Error, Result};

/// Final counters of both pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub scheduler: SchedulerStats,
    pub writer: WriterStats,
}

/// Run the scan pipeline until `stop` is cancelled.
///
/// Fails fast if the configuration is invalid or the log cannot be opened.
/// Once running, returns only after both tasks have finished and the queue
/// has been drained.
pub async fn run_pipeline<S: Scanner>(
    config: &ScanConfig,
    scanner: S,
    stop: CancellationToken,
) -> Result<PipelineReport> {
    config.validate()?;

    let output = config.output.clone();
    let node = config.node().map(str::to_string);
    let flush_every = config.flush_every;
    let writer = spawn_blocking(move || CsvLogWriter::open(&output, node.as_deref(), flush_every))
        .await??;
    let scheduler = ScanScheduler::new(
        scanner,
        config.targets(),
        config.interval(),
        config.full_scan_period(),
    );

    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let scheduler_token = stop.child_token();

    let mut scheduler_task = tokio::spawn(scheduler.run(tx, scheduler_token.clone()));
    let mut writer_task = tokio::spawn(writer.run(rx));

    info!(
        interface = %config.interface,
        output = %config.output.display(),
        queue_capacity = config.queue_capacity,
        "Pipeline started"
    );

    let mut scheduler_done = None;
    let mut writer_done = None;

    tokio::select! {
        _ = stop.cancelled() => {
            info!("Stop requested, draining pipeline");
        }
        result = &mut scheduler_task => {
            warn!("Scheduler exited before stop was requested");
            scheduler_done = Some(result);
        }
        result = &mut writer_task => {
            error!("Writer exited before stop was requested");
            writer_done = Some(result);
        }
    }
    scheduler_token.cancel();

    let scheduler_result = match scheduler_done {
        Some(result) => result,
        None => scheduler_task.await,
    };
    let writer_result = match writer_done {
        Some(result) => result,
        None => writer_task.await,
    };

    let report = PipelineReport {
        scheduler: joined("scheduler", scheduler_result)?,
        writer: joined("writer", writer_result)??,
    };

    info!(
        cycles = report.scheduler.cycles,
        batches = report.scheduler.batches_emitted,
        rows = report.writer.rows_written,
        "Pipeline stopped"
    );
    Ok(report)
}

fn joined<T>(name: &str, result: std::result::Result<T, tokio::task::JoinError>) -> Result<T> {
    result.map_err(|e| {
        error!(task = name, error = %e, "Pipeline task failed");
        Error::TaskJoin(e)
    })
}

/// Spawn [`run_pipeline`] on the current runtime.
pub fn spawn_pipeline<S: Scanner>(
    config: ScanConfig,
    scanner: S,
    stop: CancellationToken,
) -> JoinHandle<Result<PipelineReport>> {
    tokio::spawn(async move { run_pipeline(&config, scanner, stop).await })
}

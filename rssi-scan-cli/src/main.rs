mod cli;
mod logging;
mod panic_hook;

use anyhow::Context;
use clap::Parser;
use rssi_scan::{IwScanner, ScanConfig, run_pipeline};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let _log_guard = logging::init_logging(args.log_dir.as_deref())?;
    panic_hook::install();

    let config = args.load_config().context("Invalid configuration")?;
    log_config(&config);

    let stop = CancellationToken::new();
    tokio::spawn(shutdown_signal(stop.clone()));

    let scanner = IwScanner::from_config(&config);
    let report = run_pipeline(&config, scanner, stop)
        .await
        .context("Scan pipeline failed")?;

    info!(
        cycles = report.scheduler.cycles,
        failures = report.scheduler.failures,
        rows = report.writer.rows_written,
        dropped = report.writer.batches_dropped,
        "Done"
    );
    Ok(())
}

fn log_config(config: &ScanConfig) {
    info!(
        iface = %config.interface,
        interval = ?config.interval(),
        timeout = ?config.scan_timeout(),
        full_scan_period = ?config.full_scan_period(),
        out = %config.output.display(),
        node = config.node().unwrap_or("-"),
        flush_every = config.flush_every,
        "Configuration"
    );
    info!(targets = %config.targets(), "Targets");
}

/// Cancel `stop` on Ctrl+C or SIGTERM.
async fn shutdown_signal(stop: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, stopping");
        }
        _ = terminate => {
            info!("Received terminate signal, stopping");
        }
    }

    stop.cancel();
}

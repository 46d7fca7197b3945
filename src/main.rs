// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relational_content_store::config::{BackendKind, LogFormat, StoreConfig, DEFAULT_LOG_FILTER};
use relational_content_store::storage::{
    AeadCryptoGate, FsBackend, RecordStore, RedbBackend, StorageBackend, StoragePaths,
};
use relational_content_store::sweeper::StatusSweeper;

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn open_backend(config: &StoreConfig) -> Result<Arc<dyn StorageBackend>, String> {
    let paths = StoragePaths::new(&config.data_dir);
    match config.backend {
        BackendKind::Fs => {
            let mut backend = FsBackend::new(paths);
            backend
                .initialize()
                .map_err(|e| format!("failed to initialize data directory: {e}"))?;
            backend
                .health_check()
                .map_err(|e| format!("data directory is not usable: {e}"))?;
            Ok(Arc::new(backend))
        }
        BackendKind::Redb => {
            let backend = RedbBackend::open(&paths.redb_file())
                .map_err(|e| format!("failed to open redb store: {e}"))?;
            Ok(Arc::new(backend))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet.
            eprintln!("content-store: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);
    info!(
        data_dir = %config.data_dir.display(),
        backend = ?config.backend,
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "Content store starting"
    );

    let crypto = match AeadCryptoGate::from_base64(&config.encryption_key) {
        Ok(gate) => gate,
        Err(e) => {
            error!(error = %e, "Invalid store encryption key");
            return ExitCode::FAILURE;
        }
    };
    let backend = match open_backend(&config) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "Failed to open storage backend");
            return ExitCode::FAILURE;
        }
    };
    let store = Arc::new(RecordStore::new(backend, Arc::new(crypto)));

    let shutdown = CancellationToken::new();
    let sweeper = StatusSweeper::new(store)
        .with_interval(config.sweep_interval)
        .with_cleanup_max_age_days(config.cleanup_max_age_days);
    let sweeper_task = tokio::spawn(sweeper.run(shutdown.clone()));

    if supervise(sweeper_task, shutdown, tokio::signal::ctrl_c()).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Wait for `shutdown_signal` or for the sweeper to stop on its own.
/// Returns whether the sweeper shut down cleanly.
///
/// The sweeper only returns after cancellation, so an early exit (a panic)
/// is fatal.
async fn supervise(
    mut sweeper_task: JoinHandle<()>,
    shutdown: CancellationToken,
    shutdown_signal: impl Future<Output = std::io::Result<()>>,
) -> bool {
    tokio::select! {
        signal = shutdown_signal => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        }
        result = &mut sweeper_task => {
            match result {
                Ok(()) => error!("Status sweeper stopped unexpectedly"),
                Err(e) => error!(error = %e, "Status sweeper task failed"),
            }
            shutdown.cancel();
            return false;
        }
    }
    info!("Shutdown requested");
    shutdown.cancel();

    if let Err(e) = sweeper_task.await {
        error!(error = %e, "Status sweeper task failed");
        return false;
    }
    true
}

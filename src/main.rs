//! Authentication gateway configuration controller.
//!
//! Watches a directory of declarative route objects plus one overlay
//! document and derives a numbered gateway configuration snapshot
//! (`lmConf-<N>.js`) from them on every change.
//!
//! # Architecture Overview
//!
//! ```text
//!   routes dir ──┐                         ┌─────────────┐
//!                ├─▶ watch (notify+mpsc) ─▶│ controller  │
//!   overlay ─────┘                         │  (parse,    │
//!                                          │   mutate,   │
//!                                          │   save)     │
//!                                          └──────┬──────┘
//!                                                 │
//!                                          ┌──────▼──────┐    ┌─────────┐
//!                                          │  ConfStore  │───▶│ storage │
//!                                          │ (aggregate) │    │ (conf   │
//!                                          └──────┬──────┘    │  dir)   │
//!                                                 │           └─────────┘
//!                                            reload notify
//!                                                 │
//!                                          running gateway
//! ```

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use lmconf_controller::conf::ConfStore;
use lmconf_controller::config::{load_settings, ControllerSettings};
use lmconf_controller::convert;
use lmconf_controller::reload::{HttpNotifier, NoopNotifier, ReloadNotifier};
use lmconf_controller::storage::{OsStorage, Storage, StorageError};
use lmconf_controller::watch::{Controller, SourceWatcher};

#[derive(Parser)]
#[command(name = "lmconf-controller")]
#[command(about = "Derives numbered gateway configuration snapshots from route objects", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the settings file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch route objects and synthesize snapshots (the default).
    Run,
    /// Convert an existing lmConf snapshot into an overlay document.
    Convert {
        /// Snapshot file to convert; stdin when omitted.
        input: Option<PathBuf>,
    },
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => ControllerSettings::default(),
    };

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("lmconf_controller={}", settings.observability.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Some(Commands::Convert { input }) => run_convert(input),
        Some(Commands::Run) | None => run_controller(settings).await,
    }
}

fn run_convert(input: Option<PathBuf>) -> Result<(), BoxError> {
    let stdout = std::io::stdout().lock();
    match input {
        Some(path) => convert::run(File::open(path)?, stdout)?,
        None => convert::run(std::io::stdin().lock(), stdout)?,
    }
    Ok(())
}

async fn run_controller(settings: ControllerSettings) -> Result<(), BoxError> {
    tracing::info!("lmconf-controller v0.1.0 starting");
    tracing::info!(
        config_dir = ?settings.paths.config_dir,
        routes_dir = ?settings.paths.routes_dir,
        overlay_file = ?settings.paths.overlay_file,
        reload_enabled = settings.reload.enabled,
        "Settings loaded"
    );

    // The routes directory must exist before it can be watched.
    let storage = OsStorage::new();
    match storage.make_dir(&settings.paths.routes_dir) {
        Ok(()) => tracing::info!(dir = ?settings.paths.routes_dir, "Created route directory"),
        Err(StorageError::AlreadyExists { .. }) => {}
        Err(err) => return Err(err.into()),
    }

    let (source_watcher, event_rx) =
        SourceWatcher::new(&settings.paths.routes_dir, &settings.paths.overlay_file);
    let watcher = source_watcher.run()?;

    // The controller loop runs on a blocking thread: saving a snapshot is
    // synchronous file and HTTP I/O.
    let worker_settings = settings.clone();
    let mut worker = tokio::task::spawn_blocking(move || -> Result<(), BoxError> {
        let settings = worker_settings;
        let notifier: Arc<dyn ReloadNotifier> = if settings.reload.enabled {
            let url = Url::parse(&settings.reload.url)?;
            Arc::new(HttpNotifier::new(
                url,
                Duration::from_secs(settings.reload.timeout_secs),
            )?)
        } else {
            Arc::new(NoopNotifier)
        };

        let store = Arc::new(ConfStore::new(
            Arc::new(OsStorage::new()),
            &settings.paths.config_dir,
            notifier,
        ));
        match store.snapshot_count() {
            Ok(count) => {
                tracing::info!(dir = ?settings.paths.config_dir, snapshots = count, "Bound to configuration directory")
            }
            Err(err) => {
                tracing::warn!(dir = ?settings.paths.config_dir, error = %err, "Unable to list configuration directory")
            }
        }

        let mut controller = Controller::new(
            store,
            &settings.paths.routes_dir,
            &settings.paths.overlay_file,
            &settings.controller.annotation_prefix,
        );
        controller.sync_existing();
        controller.run(event_rx);
        Ok(())
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, shutting down");
        }
        result = &mut worker => {
            result??;
            tracing::warn!("Controller stopped before a shutdown signal");
            return Ok(());
        }
    }

    // Dropping the watcher closes the event channel and lets the worker
    // drain and stop.
    drop(watcher);
    worker.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Filesystem watcher for the route directory and overlay file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::watch::{ChangeEvent, ChangeKind};

/// A watcher that monitors the route-object directory and the overlay file
/// for changes.
pub struct SourceWatcher {
    routes_dir: PathBuf,
    overlay_file: PathBuf,
    event_tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl SourceWatcher {
    /// Create a new SourceWatcher.
    ///
    /// Returns the watcher and a receiver for change events.
    pub fn new(
        routes_dir: &Path,
        overlay_file: &Path,
    ) -> (Self, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                routes_dir: routes_dir.to_path_buf(),
                overlay_file: overlay_file.to_path_buf(),
                event_tx,
            },
            event_rx,
        )
    }

    /// Start watching in a background thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.event_tx.clone();
        let routes_dir = self.routes_dir.clone();
        let overlay_file = self.overlay_file.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let kind = if event.kind.is_remove() {
                        ChangeKind::Removed
                    } else if event.kind.is_create() || event.kind.is_modify() {
                        ChangeKind::Upserted
                    } else {
                        return;
                    };
                    for path in event.paths {
                        if let Some(change) = classify(&routes_dir, &overlay_file, path, kind) {
                            let _ = tx.send(change);
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.routes_dir, RecursiveMode::NonRecursive)?;
        if let Some(overlay_dir) = self.overlay_file.parent() {
            if overlay_dir != self.routes_dir {
                watcher.watch(overlay_dir, RecursiveMode::NonRecursive)?;
            }
        }

        tracing::info!(
            routes_dir = ?self.routes_dir,
            overlay_file = ?self.overlay_file,
            "Source watcher started"
        );
        Ok(watcher)
    }
}

/// Map a changed path onto a watched source, if it is one.
fn classify(
    routes_dir: &Path,
    overlay_file: &Path,
    path: PathBuf,
    kind: ChangeKind,
) -> Option<ChangeEvent> {
    if path == overlay_file {
        return Some(ChangeEvent::Overlay { kind });
    }
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if path.parent() == Some(routes_dir) && is_yaml {
        return Some(ChangeEvent::Route { path, kind });
    }
    None
}

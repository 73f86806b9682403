//! Event loop translating source changes into aggregate mutations.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Value;
use tokio::sync::mpsc;

use crate::conf::ConfStore;
use crate::watch::overlay::parse_overlay;
use crate::watch::routes::{parse_route, ParsedRoute};
use crate::watch::{ChangeEvent, ChangeKind};

/// Owns the per-source caches and drives the configuration aggregate.
///
/// Receives the aggregate as a dependency; each delivered event results in
/// at most one batch of mutations followed by one save.
pub struct Controller {
    store: Arc<ConfStore>,
    routes_dir: PathBuf,
    overlay_file: PathBuf,
    annotation_prefix: String,
    routes: HashMap<PathBuf, ParsedRoute>,
    overlay: Option<BTreeMap<String, Value>>,
}

impl Controller {
    pub fn new(
        store: Arc<ConfStore>,
        routes_dir: impl Into<PathBuf>,
        overlay_file: impl Into<PathBuf>,
        annotation_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            routes_dir: routes_dir.into(),
            overlay_file: overlay_file.into(),
            annotation_prefix: annotation_prefix.into(),
            routes: HashMap::new(),
            overlay: None,
        }
    }

    /// Replay the sources that already exist on disk as create events.
    /// Called once before watching starts.
    pub fn sync_existing(&mut self) {
        let entries = match fs::read_dir(&self.routes_dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(dir = ?self.routes_dir, error = %err, "Unable to list route directory");
                return;
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();
        for path in paths {
            self.handle(ChangeEvent::Route {
                path,
                kind: ChangeKind::Upserted,
            });
        }
        if self.overlay_file.exists() {
            self.handle(ChangeEvent::Overlay {
                kind: ChangeKind::Upserted,
            });
        }
    }

    /// Process events until every sender is gone.
    pub fn run(mut self, mut event_rx: mpsc::UnboundedReceiver<ChangeEvent>) {
        while let Some(event) = event_rx.blocking_recv() {
            self.handle(event);
        }
        tracing::info!("Event channel closed, controller stopping");
    }

    /// Apply one change event: mutate the aggregate, then save.
    pub fn handle(&mut self, event: ChangeEvent) {
        let mutated = match event {
            ChangeEvent::Route { path, kind } => self.handle_route(&path, kind),
            ChangeEvent::Overlay { kind } => self.handle_overlay(kind),
        };
        if !mutated {
            return;
        }
        if let Err(err) = self.store.save() {
            tracing::error!(error = %err, "Unable to save configuration");
        }
    }

    fn handle_route(&mut self, path: &Path, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Removed => {
                let Some(old) = self.routes.remove(path) else {
                    return false;
                };
                tracing::info!(route = ?path, "A route object was deleted");
                self.store.remove_vhosts(&old.vhosts);
                if let Some(app) = old.application {
                    self.store.remove_applications(&[app]);
                }
                true
            }
            ChangeKind::Upserted => {
                let content = match fs::read_to_string(path) {
                    Ok(content) => content,
                    Err(err) => {
                        tracing::error!(route = ?path, error = %err, "Unable to read route object, ignoring event");
                        return false;
                    }
                };
                let parsed = match parse_route(&content, &self.annotation_prefix) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        tracing::error!(route = ?path, error = %err, "Ignoring route object");
                        return false;
                    }
                };
                if self.routes.get(path) == Some(&parsed) {
                    return false;
                }
                let old = self.routes.insert(path.to_path_buf(), parsed.clone());
                match old {
                    Some(old) => {
                        tracing::info!(route = ?path, "A route object was updated");
                        if old.vhosts != parsed.vhosts {
                            self.store.remove_vhosts(&old.vhosts);
                            self.store.upsert_vhosts(parsed.vhosts);
                        }
                        if old.application != parsed.application {
                            if let Some(app) = old.application {
                                self.store.remove_applications(&[app]);
                            }
                            if let Some(app) = parsed.application {
                                self.store.upsert_applications(vec![app]);
                            }
                        }
                    }
                    None => {
                        tracing::info!(route = ?path, "A route object was created");
                        self.store.upsert_vhosts(parsed.vhosts);
                        if let Some(app) = parsed.application {
                            self.store.upsert_applications(vec![app]);
                        }
                    }
                }
                true
            }
        }
    }

    fn handle_overlay(&mut self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Removed => {
                tracing::info!(overlay = ?self.overlay_file, "The overlay document was deleted");
                self.overlay = None;
                self.store.set_overlay(&BTreeMap::new());
                true
            }
            ChangeKind::Upserted => {
                let content = match fs::read_to_string(&self.overlay_file) {
                    Ok(content) => content,
                    Err(err) => {
                        tracing::error!(overlay = ?self.overlay_file, error = %err, "Unable to read overlay document, ignoring event");
                        return false;
                    }
                };
                let overlay = match parse_overlay(&content) {
                    Ok(overlay) => overlay,
                    Err(err) => {
                        tracing::error!(overlay = ?self.overlay_file, error = %err, "Ignoring overlay document");
                        return false;
                    }
                };
                if self.overlay.as_ref() == Some(&overlay) {
                    return false;
                }
                tracing::info!(overlay = ?self.overlay_file, "The overlay document changed");
                self.store.set_overlay(&overlay);
                self.overlay = Some(overlay);
                true
            }
        }
    }
}

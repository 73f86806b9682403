//! The configuration aggregate.
//!
//! # Data Flow
//! ```text
//! event handlers
//!     → set_overlay / upsert_vhosts / remove_vhosts / …   (mark dirty)
//!     → save()
//!         read lmConf-1.js (base)
//!         overlay document keys onto base
//!         cfgAuthor + cfgNum, install per-host tables
//!         write lmConf-<N+1>.js
//!         bump counter, clear dirty, notify gateway
//! ```
//!
//! # Design Decisions
//! - Every snapshot is re-derived from the *base* snapshot plus the full
//!   current in-memory state; nothing is carried forward through the file
//!   chain, so this aggregate is the single source of truth
//! - One RwLock guards all mutable state; every public operation appears
//!   atomic to concurrent callers
//! - save() on a clean aggregate is a successful no-op; version numbers are
//!   never reused

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::conf::normalize::normalize;
use crate::conf::vhost::{Application, VHost};
use crate::reload::ReloadNotifier;
use crate::storage::{Storage, StorageError};

/// Author tag stamped into every derived snapshot.
pub const CFG_AUTHOR: &str = "lmconf-controller";

const FIRST_CFG_NUM: u64 = 1;

/// Error type for snapshot derivation and persistence.
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    #[error("unable to read configuration file {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("unable to parse configuration file {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The merged base document is missing a required mapping.
    #[error("{key} should be a map in the derived configuration")]
    TypeMismatch { key: &'static str },

    #[error("unable to write configuration file {name}: {source}")]
    Write {
        name: String,
        #[source]
        source: StorageError,
    },
}

struct Inner {
    cfg_num: u64,
    vhosts: BTreeMap<String, VHost>,
    overlay: Map<String, Value>,
    applications: BTreeMap<String, Application>,
    dirty: bool,
}

/// Lock-guarded aggregate of per-host policies plus the overlay document,
/// bound to one snapshot directory for the lifetime of the process.
pub struct ConfStore {
    storage: Arc<dyn Storage>,
    config_dir: PathBuf,
    notifier: Arc<dyn ReloadNotifier>,
    inner: RwLock<Inner>,
}

/// Snapshot file name for a version number.
pub fn config_name(num: u64) -> String {
    format!("lmConf-{num}.js")
}

/// Parse a snapshot file name back into its version number.
pub fn config_number(name: &str) -> Option<u64> {
    name.strip_prefix("lmConf-")?
        .strip_suffix(".js")?
        .parse()
        .ok()
}

impl ConfStore {
    pub fn new(
        storage: Arc<dyn Storage>,
        config_dir: impl Into<PathBuf>,
        notifier: Arc<dyn ReloadNotifier>,
    ) -> Self {
        Self {
            storage,
            config_dir: config_dir.into(),
            notifier,
            inner: RwLock::new(Inner {
                cfg_num: FIRST_CFG_NUM,
                vhosts: BTreeMap::new(),
                overlay: Map::new(),
                applications: BTreeMap::new(),
                dirty: false,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Name and number of the base snapshot.
    pub fn first(&self) -> (String, u64) {
        (config_name(FIRST_CFG_NUM), FIRST_CFG_NUM)
    }

    /// Name and number of the most recently persisted snapshot.
    pub fn last(&self) -> (String, u64) {
        let num = self.read().cfg_num;
        (config_name(num), num)
    }

    /// Name and number the next save would produce.
    pub fn next(&self) -> (String, u64) {
        let num = self.read().cfg_num + 1;
        (config_name(num), num)
    }

    /// Number of snapshot files currently present in the directory.
    pub fn snapshot_count(&self) -> Result<usize, StorageError> {
        let entries = self.storage.list_dir(&self.config_dir)?;
        Ok(entries
            .iter()
            .filter(|name| config_number(name).is_some())
            .count())
    }

    /// Load one snapshot as a document.
    pub fn load(&self, name: &str) -> Result<Map<String, Value>, ConfError> {
        let path = self.config_dir.join(name);
        let content = self
            .storage
            .read_file(&path)
            .map_err(|source| ConfError::Read {
                name: name.to_string(),
                source,
            })?;
        let doc: Map<String, Value> =
            serde_json::from_slice(&content).map_err(|source| ConfError::Parse {
                name: name.to_string(),
                source,
            })?;
        Ok(doc)
    }

    /// Replace the whole overlay document with the normalized form of
    /// `overlay`. Always marks the aggregate dirty: an empty overlay is a
    /// meaningful state transition (the overlay source was deleted).
    pub fn set_overlay(&self, overlay: &BTreeMap<String, serde_yaml::Value>) {
        let mut normalized = Map::new();
        for (key, value) in overlay {
            normalized.insert(key.clone(), normalize(value));
        }
        let mut inner = self.write();
        inner.overlay = normalized;
        inner.dirty = true;
    }

    /// Insert or replace registry slots, keyed by server name. The new
    /// value fully replaces the old one; there is no field-level merge.
    pub fn upsert_vhosts(&self, vhosts: Vec<VHost>) {
        if vhosts.is_empty() {
            return;
        }
        let mut inner = self.write();
        for vhost in vhosts {
            inner.vhosts.insert(vhost.server_name.clone(), vhost);
        }
        inner.dirty = true;
    }

    /// Remove registry slots. Removal is keyed by server name only, so a
    /// request built from a stale value still deletes the live entry.
    pub fn remove_vhosts(&self, vhosts: &[VHost]) {
        if vhosts.is_empty() {
            return;
        }
        let mut inner = self.write();
        for vhost in vhosts {
            inner.vhosts.remove(&vhost.server_name);
        }
        inner.dirty = true;
    }

    /// Register or replace portal menu entries, keyed by (category, name).
    pub fn upsert_applications(&self, applications: Vec<Application>) {
        if applications.is_empty() {
            return;
        }
        let mut inner = self.write();
        for app in applications {
            inner.applications.insert(app.path(), app);
        }
        inner.dirty = true;
    }

    /// Remove portal menu entries by identity, ignoring the other fields.
    pub fn remove_applications(&self, applications: &[Application]) {
        if applications.is_empty() {
            return;
        }
        let mut inner = self.write();
        for app in applications {
            inner.applications.remove(&app.path());
        }
        inner.dirty = true;
    }

    /// Derive and persist the next snapshot if the aggregate is dirty.
    ///
    /// A failed save leaves the aggregate dirty and the version counter
    /// untouched; the next triggering event will retry. A reload
    /// notification failure is logged and does not affect the outcome:
    /// persistence is the durability boundary.
    pub fn save(&self) -> Result<(), ConfError> {
        let mut inner = self.write();
        if !inner.dirty {
            return Ok(());
        }
        let next_num = inner.cfg_num + 1;
        let next_name = config_name(next_num);

        let (first_name, _) = self.first();
        let mut conf = self.load(&first_name)?;

        for (key, value) in &inner.overlay {
            conf.insert(key.clone(), value.clone());
        }
        conf.insert("cfgAuthor".to_string(), Value::String(CFG_AUTHOR.to_string()));
        conf.insert("cfgNum".to_string(), Value::Number(next_num.into()));

        install_vhost_tables(&mut conf, "exportedHeaders", &inner.vhosts, |v| {
            &v.exported_headers
        })?;
        install_vhost_tables(&mut conf, "locationRules", &inner.vhosts, |v| {
            &v.location_rules
        })?;
        install_applications(&mut conf, &inner.applications);

        let mut content = serde_json::to_vec_pretty(&conf).map_err(|source| ConfError::Parse {
            name: next_name.clone(),
            source,
        })?;
        content.push(b'\n');

        let path = self.config_dir.join(&next_name);
        self.storage
            .write_file(&path, &content)
            .map_err(|source| ConfError::Write {
                name: next_name.clone(),
                source,
            })?;

        inner.cfg_num = next_num;
        inner.dirty = false;
        tracing::info!(config = %next_name, cfg_num = next_num, "Configuration saved");

        if let Err(err) = self.notifier.notify_reload() {
            tracing::warn!(error = %err, "Gateway reload notification failed");
        }
        Ok(())
    }
}

/// Set `conf[key][server_name]` to one table per current vhost, replacing
/// same-named entries inherited from the base document. The base document
/// must already carry `key` as a mapping.
fn install_vhost_tables<F>(
    conf: &mut Map<String, Value>,
    key: &'static str,
    vhosts: &BTreeMap<String, VHost>,
    table: F,
) -> Result<(), ConfError>
where
    F: Fn(&VHost) -> &BTreeMap<String, String>,
{
    let all = conf
        .get_mut(key)
        .and_then(Value::as_object_mut)
        .ok_or(ConfError::TypeMismatch { key })?;
    for (server_name, vhost) in vhosts {
        let entries = table(vhost)
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        all.insert(server_name.clone(), Value::Object(entries));
    }
    Ok(())
}

/// Merge registered applications into `applicationList`, keyed by category
/// then name. The base document's entries are kept unless shadowed; when no
/// application is registered the base key is left untouched.
fn install_applications(conf: &mut Map<String, Value>, applications: &BTreeMap<String, Application>) {
    if applications.is_empty() {
        return;
    }
    if !matches!(conf.get("applicationList"), Some(Value::Object(_))) {
        conf.insert("applicationList".to_string(), Value::Object(Map::new()));
    }
    let Some(list) = conf
        .get_mut("applicationList")
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    for app in applications.values() {
        let category = list
            .entry(app.category.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(category) = category.as_object_mut() else {
            continue;
        };
        let mut options = Map::new();
        options.insert("name".to_string(), Value::String(app.name.clone()));
        options.insert(
            "description".to_string(),
            Value::String(app.description.clone()),
        );
        options.insert("logo".to_string(), Value::String(app.logo.clone()));
        options.insert("display".to_string(), Value::String(app.display.clone()));
        options.insert("uri".to_string(), Value::String(app.uri.clone()));
        let mut entry = Map::new();
        entry.insert("type".to_string(), Value::String("application".to_string()));
        entry.insert("options".to_string(), Value::Object(options));
        category.insert(app.name.clone(), Value::Object(entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reload::ReloadError;
    use crate::storage::MemoryStorage;
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, Ordering};

    const CONF_DIR: &str = "/var/lib/lemonldap-ng/conf";

    #[derive(Default)]
    struct RecordingNotifier {
        calls: AtomicU64,
        fail: bool,
    }

    impl ReloadNotifier for RecordingNotifier {
        fn notify_reload(&self) -> Result<(), ReloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ReloadError::Disabled)
            } else {
                Ok(())
            }
        }
    }

    fn seeded_storage(base: &str) -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage
            .write_file(&Path::new(CONF_DIR).join("lmConf-1.js"), base.as_bytes())
            .unwrap();
        storage
    }

    fn store_with(base: &str) -> (ConfStore, MemoryStorage, Arc<RecordingNotifier>) {
        let storage = seeded_storage(base);
        let notifier = Arc::new(RecordingNotifier::default());
        let store = ConfStore::new(
            Arc::new(storage.clone()),
            CONF_DIR,
            notifier.clone(),
        );
        (store, storage, notifier)
    }

    const BASE: &str = r#"{"cfgNum": 1, "exportedHeaders": {}, "locationRules": {}}"#;

    fn saved_doc(storage: &MemoryStorage, num: u64) -> Map<String, Value> {
        let content = storage
            .read_file(&Path::new(CONF_DIR).join(config_name(num)))
            .unwrap();
        serde_json::from_slice(&content).unwrap()
    }

    #[test]
    fn test_config_name_roundtrip() {
        assert_eq!(config_name(1), "lmConf-1.js");
        assert_eq!(config_number("lmConf-12.js"), Some(12));
        assert_eq!(config_number("lmConf-x.js"), None);
        assert_eq!(config_number("other.js"), None);
    }

    #[test]
    fn test_first_last_next() {
        let (store, _, _) = store_with(BASE);
        assert_eq!(store.first(), ("lmConf-1.js".to_string(), 1));
        assert_eq!(store.last(), ("lmConf-1.js".to_string(), 1));
        assert_eq!(store.next(), ("lmConf-2.js".to_string(), 2));

        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);
        store.save().unwrap();
        assert_eq!(store.first(), ("lmConf-1.js".to_string(), 1));
        assert_eq!(store.last(), ("lmConf-2.js".to_string(), 2));
        assert_eq!(store.next(), ("lmConf-3.js".to_string(), 3));
    }

    #[test]
    fn test_save_scenario_single_vhost() {
        let (store, storage, notifier) = store_with(BASE);
        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);
        store.save().unwrap();

        let doc = saved_doc(&storage, 2);
        assert_eq!(doc["cfgNum"], Value::from(2));
        assert_eq!(doc["cfgAuthor"], Value::from(CFG_AUTHOR));
        assert_eq!(
            doc["locationRules"],
            serde_json::json!({"a.example.org": {"default": "accept"}})
        );
        assert_eq!(
            doc["exportedHeaders"],
            serde_json::json!({"a.example.org": {}})
        );
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_versions_are_monotonic() {
        let (store, storage, _) = store_with(BASE);
        for i in 0..4u64 {
            store.upsert_vhosts(vec![VHost::new(format!("h{i}.example.org"), None, None)]);
            store.save().unwrap();
        }
        for num in 2..=5u64 {
            assert_eq!(saved_doc(&storage, num)["cfgNum"], Value::from(num));
        }
        assert!(!storage.contains(&Path::new(CONF_DIR).join(config_name(6))));
    }

    #[test]
    fn test_save_without_mutation_is_noop() {
        let (store, storage, notifier) = store_with(BASE);
        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);
        store.save().unwrap();
        let writes = storage.write_count();

        store.save().unwrap();
        assert_eq!(storage.write_count(), writes);
        assert_eq!(store.last().1, 2);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_after_upsert_leaves_no_entry() {
        let (store, storage, _) = store_with(BASE);
        let vhost = VHost::new("h.example.org", None, None);
        store.upsert_vhosts(vec![vhost.clone()]);
        store.remove_vhosts(&[vhost]);
        store.save().unwrap();

        let doc = saved_doc(&storage, 2);
        assert_eq!(doc["locationRules"], serde_json::json!({}));
        assert_eq!(doc["exportedHeaders"], serde_json::json!({}));
    }

    #[test]
    fn test_remove_matches_by_server_name_only() {
        let (store, storage, _) = store_with(BASE);
        let rules = BTreeMap::from([("default".to_string(), "deny".to_string())]);
        store.upsert_vhosts(vec![VHost::new("h.example.org", Some(rules), None)]);
        // stale value with different tables still removes the live slot
        store.remove_vhosts(&[VHost::new("h.example.org", None, None)]);
        store.save().unwrap();

        assert_eq!(saved_doc(&storage, 2)["locationRules"], serde_json::json!({}));
    }

    #[test]
    fn test_overlay_replaces_not_merges() {
        let (store, storage, _) = store_with(BASE);
        let overlay_a = BTreeMap::from([(
            "a".to_string(),
            serde_yaml::Value::Number(serde_yaml::Number::from(1u64)),
        )]);
        store.set_overlay(&overlay_a);
        store.save().unwrap();
        let doc = saved_doc(&storage, 2);
        assert_eq!(doc["a"], Value::from(1));

        let overlay_b = BTreeMap::from([(
            "b".to_string(),
            serde_yaml::Value::Number(serde_yaml::Number::from(2u64)),
        )]);
        store.set_overlay(&overlay_b);
        store.save().unwrap();
        let doc = saved_doc(&storage, 3);
        assert_eq!(doc["b"], Value::from(2));
        assert!(!doc.contains_key("a"));
    }

    #[test]
    fn test_empty_overlay_still_marks_dirty() {
        let (store, storage, _) = store_with(BASE);
        store.set_overlay(&BTreeMap::new());
        store.save().unwrap();
        assert_eq!(saved_doc(&storage, 2)["cfgNum"], Value::from(2));
    }

    #[test]
    fn test_empty_vhost_sets_do_not_mark_dirty() {
        let (store, storage, _) = store_with(BASE);
        store.upsert_vhosts(Vec::new());
        store.remove_vhosts(&[]);
        store.save().unwrap();
        assert_eq!(storage.write_count(), 1); // just the seeded base
        assert_eq!(store.last().1, 1);
    }

    #[test]
    fn test_overlay_with_non_string_keys_is_normalized() {
        let (store, storage, _) = store_with(BASE);
        let value: serde_yaml::Value =
            serde_yaml::from_str("1: one\nnested:\n  2: two\n").unwrap();
        store.set_overlay(&BTreeMap::from([("ports".to_string(), value)]));
        store.save().unwrap();

        let doc = saved_doc(&storage, 2);
        assert_eq!(
            doc["ports"],
            serde_json::json!({"1": "one", "nested": {"2": "two"}})
        );
    }

    #[test]
    fn test_missing_exported_headers_in_base_fails() {
        let (store, storage, notifier) = store_with("{}");
        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);
        let err = store.save().unwrap_err();
        assert!(matches!(
            err,
            ConfError::TypeMismatch {
                key: "exportedHeaders"
            }
        ));
        assert!(!storage.contains(&Path::new(CONF_DIR).join(config_name(2))));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);

        // aggregate stayed dirty; fixing the base lets the next save succeed
        storage
            .write_file(&Path::new(CONF_DIR).join("lmConf-1.js"), BASE.as_bytes())
            .unwrap();
        store.save().unwrap();
        assert_eq!(store.last().1, 2);
    }

    #[test]
    fn test_non_map_location_rules_in_base_fails() {
        let (store, _, _) = store_with(r#"{"exportedHeaders": {}, "locationRules": 3}"#);
        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);
        let err = store.save().unwrap_err();
        assert!(matches!(
            err,
            ConfError::TypeMismatch {
                key: "locationRules"
            }
        ));
    }

    #[test]
    fn test_missing_base_snapshot_is_hard_error() {
        let storage = MemoryStorage::new();
        let store = ConfStore::new(
            Arc::new(storage),
            CONF_DIR,
            Arc::new(RecordingNotifier::default()),
        );
        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);
        assert!(matches!(store.save(), Err(ConfError::Read { .. })));
        // still dirty, no version consumed
        assert_eq!(store.next().1, 2);
    }

    /// Storage that delegates reads but refuses writes.
    struct ReadOnlyStorage(MemoryStorage);

    impl Storage for ReadOnlyStorage {
        fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
            self.0.read_file(path)
        }
        fn write_file(&self, path: &Path, _data: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
        fn list_dir(&self, path: &Path) -> Result<Vec<String>, StorageError> {
            self.0.list_dir(path)
        }
        fn make_dir(&self, path: &Path) -> Result<(), StorageError> {
            self.0.make_dir(path)
        }
    }

    #[test]
    fn test_failed_write_leaves_aggregate_dirty() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = ConfStore::new(
            Arc::new(ReadOnlyStorage(seeded_storage(BASE))),
            CONF_DIR,
            notifier.clone(),
        );
        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);

        assert!(matches!(store.save(), Err(ConfError::Write { .. })));
        assert_eq!(store.last().1, 1);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);

        // still dirty: the next save retries the same version number
        assert!(matches!(store.save(), Err(ConfError::Write { .. })));
        assert_eq!(store.next().1, 2);
    }

    #[test]
    fn test_notifier_failure_does_not_roll_back() {
        let storage = seeded_storage(BASE);
        let notifier = Arc::new(RecordingNotifier {
            calls: AtomicU64::new(0),
            fail: true,
        });
        let store = ConfStore::new(Arc::new(storage.clone()), CONF_DIR, notifier.clone());
        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);
        store.save().unwrap();

        assert_eq!(store.last().1, 2);
        assert!(storage.contains(&Path::new(CONF_DIR).join(config_name(2))));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_base_keys_survive_into_derived_snapshot() {
        let (store, storage, _) = store_with(
            r#"{"cfgNum": 1, "domain": "example.org", "exportedHeaders": {}, "locationRules": {}}"#,
        );
        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);
        store.save().unwrap();
        assert_eq!(saved_doc(&storage, 2)["domain"], Value::from("example.org"));
    }

    #[test]
    fn test_applications_are_written_by_identity() {
        let (store, storage, _) = store_with(BASE);
        let vhost = VHost::new("app.example.org", None, None);
        store.upsert_vhosts(vec![vhost.clone()]);

        let app = Application {
            category: "tools".to_string(),
            name: "wiki".to_string(),
            description: "Team wiki".to_string(),
            logo: "gear.png".to_string(),
            display: "auto".to_string(),
            uri: "https://app.example.org/".to_string(),
        };
        store.upsert_applications(vec![app.clone()]);
        store.save().unwrap();

        let doc = saved_doc(&storage, 2);
        assert_eq!(
            doc["applicationList"]["tools"]["wiki"]["options"]["uri"],
            Value::from("https://app.example.org/")
        );

        // removal matches by (category, name) even if other fields differ
        let mut stale = app;
        stale.description = "different text".to_string();
        store.remove_applications(&[stale]);
        store.save().unwrap();
        let doc = saved_doc(&storage, 3);
        assert!(!doc.contains_key("applicationList"));
    }

    #[test]
    fn test_snapshot_count() {
        let (store, _, _) = store_with(BASE);
        assert_eq!(store.snapshot_count().unwrap(), 1);
        store.upsert_vhosts(vec![VHost::new("a.example.org", None, None)]);
        store.save().unwrap();
        assert_eq!(store.snapshot_count().unwrap(), 2);
    }
}

//! Settings schema definitions.
//!
//! This module defines the complete settings structure for the controller
//! daemon. All types derive Serde traits for deserialization from the
//! settings file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root settings for the controller daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControllerSettings {
    /// Watched and written filesystem locations.
    pub paths: PathsConfig,

    /// Route-object interpretation.
    pub controller: ControllerConfig,

    /// Gateway reload notification.
    pub reload: ReloadConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Filesystem locations the daemon reads and writes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the numbered gateway snapshots. Must contain
    /// lmConf-1.js before the first save.
    pub config_dir: PathBuf,

    /// Directory of route-object YAML files, watched for changes.
    pub routes_dir: PathBuf,

    /// Overlay document, watched for changes.
    pub overlay_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/var/lib/lemonldap-ng/conf"),
            routes_dir: PathBuf::from("/etc/lmconf-controller/routes"),
            overlay_file: PathBuf::from("/etc/lmconf-controller/overlay.yaml"),
        }
    }
}

/// Route-object interpretation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Prefix for the application-* annotation keys in route objects.
    pub annotation_prefix: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            annotation_prefix: "lmconf-controller.org".to_string(),
        }
    }
}

/// Gateway reload notification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Whether to notify the gateway after each persisted snapshot.
    pub enabled: bool,

    /// Reload endpoint of the running gateway.
    pub url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost/reload".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

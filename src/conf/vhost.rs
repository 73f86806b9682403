//! Per-host policy value types.
//!
//! A `VHost` carries one virtual host's access rules and exported headers.
//! It is immutable once constructed; registry updates build a fresh value
//! and replace the slot keyed by server name.

use std::collections::BTreeMap;

/// Access-rule and header-export tables for one virtual host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VHost {
    /// Unique key within the registry.
    pub server_name: String,

    /// Path pattern → boolean access expression. Always contains a
    /// `"default"` entry in well-formed input.
    pub location_rules: BTreeMap<String, String>,

    /// Header name → value expression.
    pub exported_headers: BTreeMap<String, String>,
}

impl VHost {
    /// Build a vhost, substituting the documented defaults when the caller
    /// carries no explicit tables: `{"default": "accept"}` for rules and an
    /// empty map for headers.
    pub fn new(
        server_name: impl Into<String>,
        location_rules: Option<BTreeMap<String, String>>,
        exported_headers: Option<BTreeMap<String, String>>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            location_rules: location_rules.unwrap_or_else(default_location_rules),
            exported_headers: exported_headers.unwrap_or_default(),
        }
    }
}

/// Default access rules: accept everything.
pub fn default_location_rules() -> BTreeMap<String, String> {
    BTreeMap::from([("default".to_string(), "accept".to_string())])
}

/// Portal menu entry for one application, built from naming annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub category: String,
    pub name: String,
    pub description: String,
    pub logo: String,
    pub display: String,
    pub uri: String,
}

impl Application {
    /// Build an application from `<prefix>/application-*` annotations.
    ///
    /// Returns `None` when the category or name annotation is absent; the
    /// remaining fields fall back to documented defaults.
    pub fn from_annotations(
        vhost: &VHost,
        annotations: &BTreeMap<String, String>,
        prefix: &str,
    ) -> Option<Self> {
        let get = |key: &str| annotations.get(&format!("{prefix}/{key}")).cloned();

        let category = get("application-category")?;
        let name = get("application-name")?;
        let description = get("application-description").unwrap_or_else(|| name.clone());
        let logo = get("application-logo").unwrap_or_else(|| "gear.png".to_string());
        let display = get("application-display").unwrap_or_else(|| "auto".to_string());
        let uri = get("application-uri")
            .unwrap_or_else(|| format!("https://{}/", vhost.server_name));

        Some(Self {
            category,
            name,
            description,
            logo,
            display,
            uri,
        })
    }

    /// Menu path; two applications with the same path are the same entry.
    pub fn path(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }
}

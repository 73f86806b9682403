//! Route-object parsing.
//!
//! A route object is one YAML file declaring the hosts it routes, their
//! access rules and exported headers, and optional application-menu
//! annotations. It is the declarative input the controller translates into
//! registry mutations.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::conf::vhost::{Application, VHost};

/// One declarative routing object, as authored on disk.
///
/// ```yaml
/// hosts:
///   - app.example.org
/// locationRules:
///   "^/admin/": '$uid eq "bart.simpson"'
///   default: accept
/// exportedHeaders:
///   Auth-User: $uid
/// annotations:
///   lmconf-controller.org/application-category: tools
///   lmconf-controller.org/application-name: wiki
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteObject {
    pub hosts: Vec<String>,

    /// Absent means the default `{"default": "accept"}`.
    #[serde(default)]
    pub location_rules: Option<BTreeMap<String, String>>,

    /// Absent means no exported headers.
    #[serde(default)]
    pub exported_headers: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Everything one route object registers in the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRoute {
    pub vhosts: Vec<VHost>,
    pub application: Option<Application>,
}

/// Parse error with enough context for the drop log line.
#[derive(Debug, thiserror::Error)]
#[error("unable to parse route object: {source}")]
pub struct RouteParseError {
    #[from]
    source: serde_yaml::Error,
}

/// Parse a route-object document and resolve it into vhosts plus an
/// optional application.
///
/// An empty or wildcard host name routes the gateway's default vhost. The
/// application, if any, is derived from the first declared host, matching
/// how the menu URI default is built.
pub fn parse_route(content: &str, annotation_prefix: &str) -> Result<ParsedRoute, RouteParseError> {
    let object: RouteObject = serde_yaml::from_str(content)?;

    let mut vhosts = Vec::new();
    for host in &object.hosts {
        let server_name = if host.is_empty() || host == "*" {
            "default"
        } else {
            host.as_str()
        };
        vhosts.push(VHost::new(
            server_name,
            object.location_rules.clone(),
            object.exported_headers.clone(),
        ));
    }

    let application = vhosts
        .first()
        .and_then(|first| Application::from_annotations(first, &object.annotations, annotation_prefix));

    Ok(ParsedRoute { vhosts, application })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "lmconf-controller.org";

    #[test]
    fn test_parse_with_explicit_tables() {
        let parsed = parse_route(
            r#"
hosts: [test1.example.org]
locationRules:
  "^/admin/": '$uid eq "bart.simpson"'
  default: accept
exportedHeaders:
  Auth-User: $uid
"#,
            PREFIX,
        )
        .unwrap();

        assert_eq!(parsed.vhosts.len(), 1);
        let vhost = &parsed.vhosts[0];
        assert_eq!(vhost.server_name, "test1.example.org");
        assert_eq!(
            vhost.location_rules.get("^/admin/").map(String::as_str),
            Some("$uid eq \"bart.simpson\"")
        );
        assert_eq!(
            vhost.exported_headers.get("Auth-User").map(String::as_str),
            Some("$uid")
        );
        assert!(parsed.application.is_none());
    }

    #[test]
    fn test_parse_applies_defaults() {
        let parsed = parse_route("hosts: [test2.example.org]\n", PREFIX).unwrap();
        let vhost = &parsed.vhosts[0];
        assert_eq!(
            vhost.location_rules.get("default").map(String::as_str),
            Some("accept")
        );
        assert!(vhost.exported_headers.is_empty());
    }

    #[test]
    fn test_wildcard_and_empty_hosts_become_default() {
        let parsed = parse_route("hosts: [\"*\", \"\"]\n", PREFIX).unwrap();
        assert!(parsed
            .vhosts
            .iter()
            .all(|v| v.server_name == "default"));
    }

    #[test]
    fn test_tables_are_shared_across_hosts() {
        let parsed = parse_route(
            "hosts: [a.example.org, b.example.org]\nexportedHeaders:\n  Auth-User: $uid\n",
            PREFIX,
        )
        .unwrap();
        assert_eq!(parsed.vhosts.len(), 2);
        assert!(parsed
            .vhosts
            .iter()
            .all(|v| v.exported_headers.contains_key("Auth-User")));
    }

    #[test]
    fn test_application_from_annotations() {
        let parsed = parse_route(
            r#"
hosts: [app.example.org]
annotations:
  lmconf-controller.org/application-category: tools
  lmconf-controller.org/application-name: wiki
"#,
            PREFIX,
        )
        .unwrap();
        let app = parsed.application.unwrap();
        assert_eq!(app.path(), "tools/wiki");
        assert_eq!(app.uri, "https://app.example.org/");
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(parse_route("hosts: [unterminated\n", PREFIX).is_err());
        assert!(parse_route("hosts: not-a-list\n", PREFIX).is_err());
    }
}

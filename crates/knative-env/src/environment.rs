//! The service registry: an ordered, load-once collection of
//! [`ServiceDefinition`]s.
//!
//! An [`Environment`] is built once from a descriptor (inline JSON or a
//! resource reference) and never mutated afterwards, so concurrent lookups
//! need no synchronisation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::definition::{ServiceDefinition, ServiceType};
use crate::error::EnvironmentError;
use crate::Result;

/// Resource prefix resolved against the filesystem.
pub const FILE_PREFIX: &str = "file:";
/// Resource prefix resolved against the configured resource root.
pub const CLASSPATH_PREFIX: &str = "classpath:";

/// Immutable registry of service definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    services: Vec<ServiceDefinition>,
}

impl Environment {
    /// Build an environment from already-constructed definitions.
    ///
    /// Order is preserved; on duplicate `(kind, name)` pairs the first entry wins.
    pub fn new(services: Vec<ServiceDefinition>) -> Self {
        Self { services }
    }

    /// Load an environment from a reference.
    ///
    /// The reference is one of:
    /// - raw JSON (first non-blank character is `[`)
    /// - `classpath:<path>`, resolved under `root`
    /// - `file:<path>` or a bare filesystem path
    pub fn load(reference: &str, root: &Path) -> Result<Self> {
        if reference.trim_start().starts_with('[') {
            Self::load_from_serialized_string(reference)
        } else {
            Self::load_from_resource(reference, root)
        }
    }

    /// Load an environment from a `file:`/`classpath:` resource or plain path.
    pub fn load_from_resource(reference: &str, root: &Path) -> Result<Self> {
        let path = resource_path(reference, root);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            EnvironmentError::config(format!(
                "unable to read Knative environment from {}: {e}",
                path.display()
            ))
        })?;
        let env = Self::load_from_serialized_string(&content)?;
        debug!(path = %path.display(), services = env.len(), "loaded Knative environment");
        Ok(env)
    }

    /// Parse an environment from a serialized JSON array of service objects.
    pub fn load_from_serialized_string(json: &str) -> Result<Self> {
        let services: Vec<ServiceDefinition> = serde_json::from_str(json).map_err(|e| {
            EnvironmentError::config(format!("unable to parse Knative environment: {e}"))
        })?;
        if let Some(idx) = services.iter().position(|s| s.name().is_empty()) {
            return Err(EnvironmentError::config(format!(
                "service at index {idx} has an empty name"
            )));
        }
        Ok(Self::new(services))
    }

    /// Iterate over all definitions in declaration order.
    pub fn services(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Exact lookup, no defaulting.
    pub fn lookup(&self, kind: ServiceType, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.matches(kind, name))
    }

    /// Exact lookup, falling back to a synthesized definition.
    ///
    /// Never fails: undeclared names resolve to the conventional default
    /// (see [`ServiceDefinition::synthesized`]).
    pub fn lookup_or_default(&self, kind: ServiceType, name: &str) -> ServiceDefinition {
        match self.lookup(kind, name) {
            Some(def) => def.clone(),
            None => {
                debug!(kind = %kind, name = %name, "service not declared, using defaults");
                ServiceDefinition::synthesized(kind, name)
            }
        }
    }

    /// Exact lookup that fails with [`EnvironmentError::NotFound`] when absent.
    pub fn mandatory_lookup(&self, kind: ServiceType, name: &str) -> Result<&ServiceDefinition> {
        self.lookup(kind, name).ok_or_else(|| EnvironmentError::NotFound {
            name: name.to_string(),
            kind: kind.to_string(),
        })
    }
}

fn resource_path(reference: &str, root: &Path) -> PathBuf {
    if let Some(rest) = reference.strip_prefix(CLASSPATH_PREFIX) {
        root.join(rest.trim_start_matches('/'))
    } else if let Some(rest) = reference.strip_prefix(FILE_PREFIX) {
        PathBuf::from(rest)
    } else {
        PathBuf::from(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Protocol;
    use std::collections::BTreeMap;

    fn sample() -> Environment {
        Environment::new(vec![
            ServiceDefinition::new(
                ServiceType::Channel,
                Protocol::Http,
                "c1",
                "",
                -1,
                BTreeMap::new(),
            ),
            ServiceDefinition::new(
                ServiceType::Endpoint,
                Protocol::Http,
                "e1",
                "e1.svc",
                8080,
                BTreeMap::new(),
            ),
        ])
    }

    #[test]
    fn test_lookup_is_kind_scoped() {
        let env = sample();
        assert!(env.lookup(ServiceType::Channel, "c1").is_some());
        assert!(env.lookup(ServiceType::Channel, "e1").is_none());
        assert!(env.lookup(ServiceType::Endpoint, "e1").is_some());
        assert!(env.lookup(ServiceType::Endpoint, "c1").is_none());
    }

    #[test]
    fn test_lookup_or_default_prefers_declared() {
        let env = sample();
        let def = env.lookup_or_default(ServiceType::Endpoint, "e1");
        assert_eq!(def.host(), "e1.svc");
        assert_eq!(def.port(), 8080);
    }

    #[test]
    fn test_lookup_or_default_synthesizes() {
        let env = Environment::default();
        let ch = env.lookup_or_default(ServiceType::Channel, "myChannel");
        assert_eq!(ch.name(), "myChannel-channel");
        assert_eq!(ch.host(), "");
        assert_eq!(ch.port(), -1);

        let ep = env.lookup_or_default(ServiceType::Endpoint, "myEndpoint");
        assert_eq!(ep.name(), "myEndpoint");
        assert_eq!(ep.protocol(), &Protocol::Http);
    }

    #[test]
    fn test_mandatory_lookup_messages() {
        let env = sample();
        let err = env
            .mandatory_lookup(ServiceType::Endpoint, "unknown")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to find the service \"unknown\" with type \"endpoint\""
        );
        let err = env
            .mandatory_lookup(ServiceType::Channel, "unknown")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to find the service \"unknown\" with type \"channel\""
        );
    }

    #[test]
    fn test_duplicates_first_match_wins() {
        let first = ServiceDefinition::new(
            ServiceType::Endpoint,
            Protocol::Http,
            "dup",
            "first",
            -1,
            BTreeMap::new(),
        );
        let second = ServiceDefinition::new(
            ServiceType::Endpoint,
            Protocol::Http,
            "dup",
            "second",
            -1,
            BTreeMap::new(),
        );
        let env = Environment::new(vec![first, second]);
        assert_eq!(env.lookup(ServiceType::Endpoint, "dup").unwrap().host(), "first");
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(Environment::load_from_serialized_string(r#"{"services": []}"#).is_err());
        assert!(Environment::load_from_serialized_string(r#"[1, 2]"#).is_err());
        assert!(Environment::load_from_serialized_string("not json").is_err());
    }

    #[test]
    fn test_resource_path_prefixes() {
        let root = Path::new("/opt/app");
        assert_eq!(
            resource_path("classpath:/environment.json", root),
            PathBuf::from("/opt/app/environment.json")
        );
        assert_eq!(
            resource_path("file:/etc/knative.json", root),
            PathBuf::from("/etc/knative.json")
        );
        assert_eq!(
            resource_path("conf/env.json", root),
            PathBuf::from("conf/env.json")
        );
    }
}

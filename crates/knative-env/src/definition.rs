//! Service definitions: the unit of registration in an [`Environment`].
//!
//! [`Environment`]: crate::Environment

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EnvironmentError;

/// Metadata key: context path of the service.
pub const SERVICE_META_PATH: &str = "service.path";
/// Metadata key: zone (namespace) used to qualify a derived host.
pub const SERVICE_META_ZONE: &str = "service.zone";
/// Metadata key: explicit host (informational, `host` wins).
pub const SERVICE_META_HOST: &str = "service.host";
/// Metadata key: CloudEvents type emitted by producers of this service.
pub const KNATIVE_EVENT_TYPE: &str = "knative.event.type";
/// Metadata key: content type emitted by producers of this service.
pub const CONTENT_TYPE: &str = "content.type";
/// Metadata key: name of the header a shared listener filters on.
pub const FILTER_HEADER_NAME: &str = "filter.header";
/// Metadata key: value the filter header must carry.
pub const FILTER_HEADER_VALUE: &str = "filter.value";

/// Kind of logical service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// A named event source or sink (a Knative service).
    Endpoint,
    /// A Knative channel.
    Channel,
}

impl ServiceType {
    /// Get the type name as it appears in descriptors and URIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Endpoint => "endpoint",
            ServiceType::Channel => "channel",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = EnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "endpoint" => Ok(ServiceType::Endpoint),
            "channel" => Ok(ServiceType::Channel),
            other => Err(EnvironmentError::config(format!(
                "unknown service type: {other}"
            ))),
        }
    }
}

/// Wire protocol of a service.
///
/// Unknown protocol names are kept verbatim so that a descriptor loads even
/// when it mentions transports this crate does not support; resolution is
/// where they get rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    Http,
    Https,
    Other(String),
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Other(name) => name,
        }
    }

    /// Port used when a definition carries `-1`. `None` for unsupported protocols.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Protocol::Http => Some(80),
            Protocol::Https => Some(443),
            Protocol::Other(_) => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Protocol::Other(_))
    }
}

impl From<String> for Protocol {
    fn from(value: String) -> Self {
        match value.as_str() {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            _ => Protocol::Other(value),
        }
    }
}

impl From<Protocol> for String {
    fn from(value: Protocol) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_port() -> i32 {
    -1
}

/// One registered logical service.
///
/// Fields are private: a definition is immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    #[serde(rename = "type")]
    kind: ServiceType,
    protocol: Protocol,
    name: String,
    #[serde(default)]
    host: String,
    /// `-1` means "use the protocol default".
    #[serde(default = "default_port")]
    port: i32,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl ServiceDefinition {
    /// Create a new service definition.
    pub fn new(
        kind: ServiceType,
        protocol: Protocol,
        name: impl Into<String>,
        host: impl Into<String>,
        port: i32,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            kind,
            protocol,
            name: name.into(),
            host: host.into(),
            port,
            metadata,
        }
    }

    /// Synthesized definition for an undeclared name: http, empty host,
    /// protocol-default port. Channels get the conventional `-channel` suffix.
    pub fn synthesized(kind: ServiceType, name: &str) -> Self {
        let name = match kind {
            ServiceType::Endpoint => name.to_string(),
            ServiceType::Channel => format!("{name}-channel"),
        };
        Self::new(kind, Protocol::Http, name, "", -1, BTreeMap::new())
    }

    pub fn kind(&self) -> ServiceType {
        self.kind
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> i32 {
        self.port
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Look up a single metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Context path declared in metadata.
    pub fn path(&self) -> Option<&str> {
        self.meta(SERVICE_META_PATH)
    }

    /// Zone (namespace) declared in metadata, possibly containing placeholders.
    pub fn zone(&self) -> Option<&str> {
        self.meta(SERVICE_META_ZONE)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.meta(KNATIVE_EVENT_TYPE)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.meta(CONTENT_TYPE)
    }

    /// Filter header name and value, only when both are present and non-empty.
    pub fn filter(&self) -> Option<(&str, &str)> {
        match (self.meta(FILTER_HEADER_NAME), self.meta(FILTER_HEADER_VALUE)) {
            (Some(name), Some(value)) if !name.is_empty() && !value.is_empty() => {
                Some((name, value))
            }
            _ => None,
        }
    }

    /// Whether this definition answers to `(kind, name)`.
    pub fn matches(&self, kind: ServiceType, name: &str) -> bool {
        self.kind == kind && self.name == name
    }
}

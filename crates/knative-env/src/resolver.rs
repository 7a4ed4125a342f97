//! Physical address resolution.
//!
//! Turns a [`ServiceDefinition`] plus an optional sub-path into a
//! [`PhysicalUri`] the transport can bind to. Resolution is a pure string
//! computation; the only external input is the placeholder resolver used for
//! zone qualification.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::definition::{Protocol, ServiceDefinition};
use crate::error::EnvironmentError;
use crate::placeholder::PropertyResolver;
use crate::Result;

/// Scheme of physical endpoints served over plain HTTP.
pub const HTTP_COMPONENT: &str = "knative-http";
/// Scheme of physical endpoints served over TLS.
pub const HTTPS_COMPONENT: &str = "knative-https";
/// Query parameter prefix carrying a listener filter.
pub const FILTER_PARAM_PREFIX: &str = "filter.";

/// Fully resolved physical address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalUri {
    protocol: Protocol,
    host: String,
    port: u16,
    path: String,
    query: BTreeMap<String, String>,
}

impl PhysicalUri {
    pub fn new(
        protocol: Protocol,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
        query: BTreeMap<String, String>,
    ) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
            path: normalize_path(&path.into()),
            query,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self.protocol {
            Protocol::Https => HTTPS_COMPONENT,
            _ => HTTP_COMPONENT,
        }
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Always starts with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Filter carried in the query, as `(header name, header value)`.
    pub fn filter(&self) -> Option<(&str, &str)> {
        self.query.iter().find_map(|(k, v)| {
            k.strip_prefix(FILTER_PARAM_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| (name, v.as_str()))
        })
    }

    /// `(host, port, path)`: the identity of the physical listener,
    /// independent of query parameters.
    pub fn listener_key(&self) -> (String, u16, String) {
        (self.host.clone(), self.port, self.path.clone())
    }
}

impl fmt::Display for PhysicalUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}{}", self.scheme(), self.host, self.port, self.path)?;
        let mut sep = '?';
        for (k, v) in &self.query {
            write!(f, "{sep}{k}={v}")?;
            sep = '&';
        }
        Ok(())
    }
}

/// Per-request inputs that are not part of the service definition.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Sub-path from the logical URI; overrides the metadata path.
    pub sub_path: Option<String>,
    /// Filter override; falls back to the definition's filter metadata.
    pub filter: Option<(String, String)>,
    /// Transport options passed through as query parameters.
    pub transport_options: BTreeMap<String, String>,
}

/// Resolves service definitions to physical URIs.
pub struct AddressResolver<'a> {
    properties: &'a dyn PropertyResolver,
}

impl<'a> AddressResolver<'a> {
    pub fn new(properties: &'a dyn PropertyResolver) -> Self {
        Self { properties }
    }

    /// Resolve `definition` into a physical URI.
    ///
    /// Fails with [`EnvironmentError::Config`] for unsupported protocols,
    /// out-of-range ports, or when no host can be derived.
    pub fn resolve(
        &self,
        definition: &ServiceDefinition,
        options: &ResolveOptions,
    ) -> Result<PhysicalUri> {
        let protocol = definition.protocol();
        let default_port = protocol.default_port().ok_or_else(|| {
            EnvironmentError::config(format!("unsupported protocol: {protocol}"))
        })?;

        let host = self.derive_host(definition);
        if host.is_empty() {
            return Err(EnvironmentError::config(format!(
                "unable to derive a host for service \"{}\"",
                definition.name()
            )));
        }

        let port = match definition.port() {
            -1 => default_port,
            p => u16::try_from(p).map_err(|_| {
                EnvironmentError::config(format!(
                    "invalid port {p} for service \"{}\"",
                    definition.name()
                ))
            })?,
        };

        let path = match options.sub_path.as_deref().filter(|p| !p.is_empty()) {
            Some(sub) => sub.to_string(),
            None => definition.path().unwrap_or("/").to_string(),
        };

        let mut query = BTreeMap::new();
        let filter = options
            .filter
            .as_ref()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .or_else(|| definition.filter());
        if let Some((name, value)) = filter {
            query.insert(format!("{FILTER_PARAM_PREFIX}{name}"), value.to_string());
        }
        for (k, v) in &options.transport_options {
            query.insert(k.clone(), v.clone());
        }

        let uri = PhysicalUri::new(protocol.clone(), host, port, path, query);
        debug!(service = %definition.name(), physical = %uri, "resolved physical address");
        Ok(uri)
    }

    fn derive_host(&self, definition: &ServiceDefinition) -> String {
        if !definition.host().is_empty() {
            return definition.host().to_string();
        }
        let name = definition.name();
        let zone = definition
            .zone()
            .filter(|z| !z.is_empty())
            .and_then(|z| self.properties.resolve(z))
            .filter(|z| !z.is_empty());
        match zone {
            Some(zone) => format!("{name}.{zone}"),
            None => name.to_string(),
        }
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

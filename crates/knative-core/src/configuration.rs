//! Component defaults and their per-endpoint resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use knative_env::{Environment, Properties, CLASSPATH_PREFIX, FILE_PREFIX};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KnativeError, KnativeResult};

/// Environment variable consulted when no environment is configured.
pub const CONFIGURATION_ENV_VARIABLE: &str = "KNATIVE_CONFIGURATION";

/// Spec version used when none is configured.
pub const DEFAULT_SPEC_VERSION: &str = "0.1";

/// Prefix of URI parameters passed through to the transport.
pub const TRANSPORT_PARAM_PREFIX: &str = "transport.";

/// Knative component configuration.
///
/// Component-level values act as defaults; [`KnativeConfiguration::with_parameters`]
/// overlays the parameters of one logical URI to produce the endpoint's
/// resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnativeConfiguration {
    /// Explicit registry; takes precedence over every other source.
    pub environment: Option<Environment>,
    /// Resource reference (`file:`, `classpath:`, a path, or raw JSON).
    pub environment_path: Option<String>,
    /// Root directory for `classpath:` references.
    pub resource_root: Option<PathBuf>,
    pub json_serialization_enabled: bool,
    pub cloud_events_spec_version: String,
    pub cloud_events_type: Option<String>,
    pub transport_options: BTreeMap<String, String>,
    pub filter_header_name: Option<String>,
    pub filter_header_value: Option<String>,
    /// Values for `{{placeholder}}` resolution in service metadata.
    pub properties: BTreeMap<String, String>,
}

impl Default for KnativeConfiguration {
    fn default() -> Self {
        Self {
            environment: None,
            environment_path: None,
            resource_root: None,
            json_serialization_enabled: false,
            cloud_events_spec_version: DEFAULT_SPEC_VERSION.to_string(),
            cloud_events_type: None,
            transport_options: BTreeMap::new(),
            filter_header_name: None,
            filter_header_value: None,
            properties: BTreeMap::new(),
        }
    }
}

impl KnativeConfiguration {
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_environment_path(mut self, path: impl Into<String>) -> Self {
        self.environment_path = Some(path.into());
        self
    }

    /// Overlay logical-URI parameters. Unknown parameters are rejected.
    pub fn with_parameters(&self, params: &BTreeMap<String, String>) -> KnativeResult<Self> {
        let mut resolved = self.clone();
        for (key, value) in params {
            match key.as_str() {
                "jsonSerializationEnabled" => {
                    resolved.json_serialization_enabled = value.parse().map_err(|_| {
                        KnativeError::Config(format!(
                            "invalid value for jsonSerializationEnabled: {value}"
                        ))
                    })?;
                }
                "cloudEventsSpecVersion" => resolved.cloud_events_spec_version = value.clone(),
                "cloudEventsType" => resolved.cloud_events_type = Some(value.clone()),
                "filterHeaderName" => resolved.filter_header_name = Some(value.clone()),
                "filterHeaderValue" => resolved.filter_header_value = Some(value.clone()),
                other => match other.strip_prefix(TRANSPORT_PARAM_PREFIX) {
                    Some(option) if !option.is_empty() => {
                        resolved
                            .transport_options
                            .insert(option.to_string(), value.clone());
                    }
                    _ => {
                        return Err(KnativeError::Config(format!("unknown parameter: {other}")));
                    }
                },
            }
        }
        Ok(resolved)
    }

    /// Filter pair, when both halves are configured.
    pub fn filter(&self) -> Option<(String, String)> {
        match (&self.filter_header_name, &self.filter_header_value) {
            (Some(n), Some(v)) if !n.is_empty() && !v.is_empty() => Some((n.clone(), v.clone())),
            _ => None,
        }
    }

    pub fn properties(&self) -> Properties {
        Properties::from(self.properties.clone())
    }

    pub fn resource_root(&self) -> &Path {
        self.resource_root.as_deref().unwrap_or_else(|| Path::new("."))
    }

    /// Obtain the environment: explicit value, then `environment_path`, then
    /// `env_value` (the content of [`CONFIGURATION_ENV_VARIABLE`]).
    pub fn load_environment(&self, env_value: Option<&str>) -> KnativeResult<Environment> {
        if let Some(env) = &self.environment {
            debug!(services = env.len(), "using explicit environment");
            return Ok(env.clone());
        }
        if let Some(path) = &self.environment_path {
            debug!(path = %path, "loading environment from configured path");
            return Ok(Environment::load(path, self.resource_root())?);
        }
        let is_resource = |v: &str| v.starts_with(FILE_PREFIX) || v.starts_with(CLASSPATH_PREFIX);
        match env_value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(value) if is_resource(value) => {
                debug!(variable = CONFIGURATION_ENV_VARIABLE, "loading environment from resource");
                Ok(Environment::load_from_resource(value, self.resource_root())?)
            }
            Some(value) => {
                debug!(variable = CONFIGURATION_ENV_VARIABLE, "loading inline environment");
                Ok(Environment::load_from_serialized_string(value)?)
            }
            None => Err(KnativeError::Config(
                "cannot load Knative configuration from file or env variable".to_string(),
            )),
        }
    }
}

//! Knative component: owns configuration, the environment and the endpoint cache.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use knative_env::Environment;
use tracing::{debug, warn};

use crate::configuration::{KnativeConfiguration, CONFIGURATION_ENV_VARIABLE};
use crate::endpoint::KnativeEndpoint;
use crate::error::KnativeResult;
use crate::obs;
use crate::transport::Transport;
use crate::uri::LogicalUri;

/// Entry point for resolving logical URIs into endpoints.
///
/// The environment is loaded on first use and kept for the component's
/// lifetime. Endpoints are singletons per canonical logical URI.
pub struct KnativeComponent {
    configuration: KnativeConfiguration,
    transport: Arc<dyn Transport>,
    environment: Mutex<Option<Arc<Environment>>>,
    endpoints: Mutex<BTreeMap<String, Arc<KnativeEndpoint>>>,
}

impl KnativeComponent {
    pub fn new(configuration: KnativeConfiguration, transport: Arc<dyn Transport>) -> Self {
        Self {
            configuration,
            transport,
            environment: Mutex::new(None),
            endpoints: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn configuration(&self) -> &KnativeConfiguration {
        &self.configuration
    }

    /// The environment, loading it on first call.
    pub fn environment(&self) -> KnativeResult<Arc<Environment>> {
        let mut cached = self.environment.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(env) = cached.as_ref() {
            return Ok(Arc::clone(env));
        }
        let env_value = std::env::var(CONFIGURATION_ENV_VARIABLE).ok();
        let env = Arc::new(self.configuration.load_environment(env_value.as_deref())?);
        debug!(services = env.len(), "knative environment loaded");
        *cached = Some(Arc::clone(&env));
        Ok(env)
    }

    /// Resolve `uri`, returning the cached endpoint when one exists.
    pub fn endpoint(&self, uri: &str) -> KnativeResult<Arc<KnativeEndpoint>> {
        let logical: LogicalUri = uri.parse()?;
        let key = logical.to_string();

        let mut endpoints = self.endpoints.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = endpoints.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let _span = obs::EndpointSpan::enter(&key);
        let environment = self.environment()?;
        let configuration = self.configuration.with_parameters(logical.params())?;
        let endpoint = Arc::new(KnativeEndpoint::new(
            logical,
            configuration,
            &environment,
            self.transport.as_ref(),
        )?);

        obs::emit_endpoint_created(
            &key,
            &endpoint.physical_uri().to_string(),
            endpoint.version().version(),
        );
        endpoints.insert(key, Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Endpoints created so far, ordered by canonical URI.
    pub fn endpoints(&self) -> Vec<Arc<KnativeEndpoint>> {
        let endpoints = self.endpoints.lock().unwrap_or_else(|e| e.into_inner());
        endpoints.values().cloned().collect()
    }

    /// Start every endpoint created so far.
    ///
    /// If one fails, the endpoints already started are stopped in reverse
    /// order and the start error is returned.
    pub async fn start(&self) -> KnativeResult<()> {
        let endpoints = self.endpoints();
        for (idx, endpoint) in endpoints.iter().enumerate() {
            if let Err(e) = endpoint.start().await {
                warn!(endpoint = %endpoint.uri(), error = %e, "failed to start endpoint");
                for started in endpoints[..idx].iter().rev() {
                    if let Err(stop_err) = started.stop().await {
                        warn!(endpoint = %started.uri(), error = %stop_err, "failed to stop endpoint");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop every endpoint, continuing past failures. Returns the first error.
    pub async fn stop(&self) -> KnativeResult<()> {
        let endpoints = self.endpoints();
        let results = join_all(endpoints.iter().map(|e| e.stop())).await;

        let mut first_error = None;
        for (endpoint, result) in endpoints.iter().zip(results) {
            if let Err(e) = result {
                warn!(endpoint = %endpoint.uri(), error = %e, "failed to stop endpoint");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

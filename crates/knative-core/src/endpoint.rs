//! A logical Knative endpoint bound to one physical endpoint.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use knative_env::{
    AddressResolver, Environment, PhysicalUri, ResolveOptions, ServiceDefinition, ServiceType,
};
use tracing::{debug, warn, Instrument};

use crate::ce::{CloudEventsProcessors, CloudEventsVersion, ProducerSettings, DEFAULT_EVENT_TYPE};
use crate::configuration::KnativeConfiguration;
use crate::converter::{ContentMode, ContentModeConverter};
use crate::error::KnativeResult;
use crate::message::Message;
use crate::obs;
use crate::processor::{Pipeline, Processor};
use crate::transport::{Consumer, PhysicalEndpoint, Transport};
use crate::uri::LogicalUri;

/// Resolved, immutable view of one logical URI.
///
/// Everything is computed at construction: the service definition (declared
/// or synthesized), the spec version, the physical address and the physical
/// endpoint handle. Only the physical endpoint's start/stop state changes
/// afterwards.
pub struct KnativeEndpoint {
    uri: LogicalUri,
    configuration: KnativeConfiguration,
    service: ServiceDefinition,
    version: CloudEventsVersion,
    event_type: String,
    physical: Arc<dyn PhysicalEndpoint>,
}

impl KnativeEndpoint {
    /// Resolve `uri` against `environment`. `configuration` must already carry
    /// the URI's parameters.
    pub fn new(
        uri: LogicalUri,
        configuration: KnativeConfiguration,
        environment: &Environment,
        transport: &dyn Transport,
    ) -> KnativeResult<Self> {
        let version =
            CloudEventsVersion::for_spec_version(&configuration.cloud_events_spec_version)?;
        let service = environment.lookup_or_default(uri.kind(), uri.name());

        let properties = configuration.properties();
        let options = ResolveOptions {
            sub_path: uri.sub_path().map(str::to_string),
            filter: configuration.filter(),
            transport_options: configuration.transport_options.clone(),
        };
        let physical_uri = AddressResolver::new(&properties).resolve(&service, &options)?;
        let physical = transport.endpoint(&physical_uri)?;

        let event_type = configuration
            .cloud_events_type
            .clone()
            .or_else(|| service.event_type().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string());

        debug!(endpoint = %uri, physical = %physical_uri, "knative endpoint resolved");
        Ok(Self {
            uri,
            configuration,
            service,
            version,
            event_type,
            physical,
        })
    }

    pub fn uri(&self) -> &LogicalUri {
        &self.uri
    }

    pub fn kind(&self) -> ServiceType {
        self.uri.kind()
    }

    pub fn name(&self) -> &str {
        self.uri.name()
    }

    pub fn configuration(&self) -> &KnativeConfiguration {
        &self.configuration
    }

    pub fn service(&self) -> &ServiceDefinition {
        &self.service
    }

    pub fn version(&self) -> CloudEventsVersion {
        self.version
    }

    pub fn physical_uri(&self) -> &PhysicalUri {
        self.physical.uri()
    }

    /// Canonical logical URI, used as the event source.
    pub fn source(&self) -> String {
        self.uri.to_string()
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn content_mode(&self) -> ContentMode {
        ContentMode::from_flag(self.configuration.json_serialization_enabled)
    }

    pub fn producer_settings(&self) -> ProducerSettings {
        ProducerSettings {
            source: self.source(),
            event_type: self.event_type.clone(),
            content_type: self.service.content_type().map(str::to_string),
        }
    }

    /// Encode steps only: CloudEvents encode followed by content-mode conversion.
    pub fn encoder(&self) -> Pipeline {
        let converter: Arc<dyn Processor> =
            Arc::new(ContentModeConverter::new(self.content_mode(), self.version));
        Pipeline::new(vec![self.version.producer_processor(self), converter])
    }

    /// Encode, convert, then send through the physical endpoint.
    pub fn create_producer(&self) -> KnativeResult<KnativeProducer> {
        let encoder: Arc<dyn Processor> = Arc::new(self.encoder());
        let send = self.physical.create_producer()?;
        Ok(KnativeProducer {
            pipeline: Pipeline::new(vec![encoder, send]),
        })
    }

    /// Decode inbound messages, then hand them to `downstream`.
    pub fn create_consumer(
        &self,
        downstream: Arc<dyn Processor>,
    ) -> KnativeResult<Box<dyn Consumer>> {
        let pipeline = Pipeline::new(vec![self.version.consumer_processor(self), downstream]);
        self.physical.create_consumer(Arc::new(pipeline))
    }

    pub async fn start(&self) -> KnativeResult<()> {
        self.physical.start().await?;
        obs::emit_endpoint_started(&self.source());
        Ok(())
    }

    pub async fn stop(&self) -> KnativeResult<()> {
        self.physical.stop().await?;
        obs::emit_endpoint_stopped(&self.source());
        Ok(())
    }

    /// Run `f` with the endpoint started, stopping it on every exit path.
    ///
    /// A failed start is followed by a stop so partially acquired resources
    /// are released. The first error wins.
    pub async fn scoped<F, Fut, T>(&self, f: F) -> KnativeResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = KnativeResult<T>>,
    {
        let run = async {
            if let Err(e) = self.start().await {
                if let Err(stop_err) = self.stop().await {
                    warn!(error = %stop_err, "stop after failed start");
                }
                return Err(e);
            }

            let result = f().await;
            let stopped = self.stop().await;
            match (result, stopped) {
                (Ok(value), Ok(())) => Ok(value),
                (Err(e), stopped) => {
                    if let Err(stop_err) = stopped {
                        warn!(error = %stop_err, "stop after failed run");
                    }
                    Err(e)
                }
                (Ok(_), Err(e)) => Err(e),
            }
        };
        run.instrument(obs::endpoint_span(&self.source())).await
    }
}

impl std::fmt::Debug for KnativeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnativeEndpoint")
            .field("uri", &self.uri.to_string())
            .field("physical", &self.physical.uri().to_string())
            .field("version", &self.version)
            .finish()
    }
}

/// Send side of a logical endpoint. Processing a message returns the reply.
pub struct KnativeProducer {
    pipeline: Pipeline,
}

impl KnativeProducer {
    pub async fn send(&self, message: Message) -> KnativeResult<Message> {
        self.pipeline.process(message).await
    }
}

#[async_trait]
impl Processor for KnativeProducer {
    async fn process(&self, message: Message) -> KnativeResult<Message> {
        self.send(message).await
    }
}

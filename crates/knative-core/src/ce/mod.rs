//! CloudEvents codec family.
//!
//! Each supported spec version is a [`CloudEventsVersion`] variant. Versions
//! share one algorithm and differ only in their [`Attributes`] table; a
//! version string is mapped to its variant through [`CloudEventsVersion::for_spec_version`].

mod attributes;
mod consumer;
mod event;
mod producer;

use std::fmt;
use std::sync::Arc;

pub use attributes::{Attribute, Attributes, DATA_KEY};
pub use consumer::ConsumerProcessor;
pub use event::CloudEvent;
pub use producer::{ProducerProcessor, ProducerSettings};

use crate::endpoint::KnativeEndpoint;
use crate::error::{KnativeError, KnativeResult};
use crate::processor::Processor;

/// Event type used when neither the URI nor the service metadata names one.
pub const DEFAULT_EVENT_TYPE: &str = "org.apache.camel.event";

/// Content type of a structured-mode message.
pub const MIME_STRUCTURED_CONTENT_MODE: &str = "application/cloudevents+json";

/// Supported CloudEvents spec versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudEventsVersion {
    V01,
    V02,
    V03,
}

const REGISTRY: &[(&str, CloudEventsVersion)] = &[
    ("0.1", CloudEventsVersion::V01),
    ("0.2", CloudEventsVersion::V02),
    ("0.3", CloudEventsVersion::V03),
];

impl CloudEventsVersion {
    /// Look up the variant registered for `version`.
    pub fn for_spec_version(version: &str) -> KnativeResult<Self> {
        REGISTRY
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, variant)| *variant)
            .ok_or_else(|| {
                KnativeError::Config(format!("unsupported CloudEvents spec version: {version}"))
            })
    }

    /// Registered version strings, oldest first.
    pub fn supported() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(v, _)| *v)
    }

    pub fn version(&self) -> &'static str {
        match self {
            CloudEventsVersion::V01 => "0.1",
            CloudEventsVersion::V02 => "0.2",
            CloudEventsVersion::V03 => "0.3",
        }
    }

    pub fn attributes(&self) -> &'static Attributes {
        match self {
            CloudEventsVersion::V01 => &attributes::V01,
            CloudEventsVersion::V02 => &attributes::V02,
            CloudEventsVersion::V03 => &attributes::V03,
        }
    }
}

impl fmt::Display for CloudEventsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.version())
    }
}

/// The capability pair every spec version provides.
pub trait CloudEventsProcessors {
    /// Outbound step stamping envelope attributes onto a message.
    fn producer_processor(&self, endpoint: &KnativeEndpoint) -> Arc<dyn Processor>;

    /// Inbound step validating or unpacking an envelope.
    fn consumer_processor(&self, endpoint: &KnativeEndpoint) -> Arc<dyn Processor>;
}

impl CloudEventsProcessors for CloudEventsVersion {
    fn producer_processor(&self, endpoint: &KnativeEndpoint) -> Arc<dyn Processor> {
        Arc::new(ProducerProcessor::new(*self, endpoint.producer_settings()))
    }

    fn consumer_processor(&self, endpoint: &KnativeEndpoint) -> Arc<dyn Processor> {
        Arc::new(ConsumerProcessor::new(*self, endpoint.uri().to_string()))
    }
}

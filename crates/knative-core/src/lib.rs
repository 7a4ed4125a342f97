//! Knative-Core: CloudEvents Codecs and Endpoint Routing
//!
//! Turns logical `knative:` URIs into producer and consumer pipelines bound
//! to physical transport endpoints.
//!
//! ## Layer 1 - Routing
//!
//! Focus: wire-format fidelity across CloudEvents spec versions, singleton
//! endpoints, strict start-before-use lifecycle.
//!
//! ## Key Components
//!
//! - `KnativeComponent`: loads the environment once, caches endpoints by canonical URI
//! - `KnativeEndpoint`: resolved configuration + physical endpoint for one logical URI
//! - `CloudEventsVersion`: version-keyed producer/consumer codec processors
//! - `ContentModeConverter`: binary vs. structured representation
//! - `MemoryTransport`: in-process transport used by tests and local wiring
//! - `Runtime`: ordered lifecycle listeners around a component

pub mod ce;
pub mod component;
pub mod configuration;
pub mod converter;
pub mod endpoint;
mod error;
pub mod fakes;
pub mod message;
pub mod metrics;
pub mod obs;
pub mod processor;
pub mod runtime;
pub mod telemetry;
pub mod transport;
pub mod uri;

pub use ce::{
    CloudEvent, CloudEventsProcessors, CloudEventsVersion, DEFAULT_EVENT_TYPE,
    MIME_STRUCTURED_CONTENT_MODE,
};
pub use component::KnativeComponent;
pub use configuration::{KnativeConfiguration, CONFIGURATION_ENV_VARIABLE, DEFAULT_SPEC_VERSION};
pub use converter::{ContentMode, ContentModeConverter};
pub use endpoint::{KnativeEndpoint, KnativeProducer};
pub use error::{KnativeError, KnativeResult};
pub use fakes::MemoryTransport;
pub use message::{Message, CONTENT_TYPE_HEADER};
pub use processor::{processor_fn, Pipeline, Processor};
pub use runtime::{Listener, Phase, Runtime};
pub use transport::{Consumer, PhysicalEndpoint, Transport};
pub use uri::LogicalUri;

//! Knative-Env: Service Registry and Address Resolution
//!
//! This crate holds the declarative side of Knative routing: which logical
//! endpoints and channels exist, and where they live on the network.
//!
//! ## Layer 0 - Data
//!
//! Focus: load-once registry, defaulting rules, deterministic addressing.
//! No I/O happens after an [`Environment`] is loaded.
//!
//! ## Key Components
//!
//! - `Environment`: ordered, immutable collection of service definitions
//! - `ServiceDefinition`: one logical service (kind, protocol, host, port, metadata)
//! - `AddressResolver`: definition + sub-path → `PhysicalUri`
//! - `Properties`: best-effort `{{placeholder}}` resolution for zones

pub mod definition;
pub mod environment;
mod error;
pub mod placeholder;
pub mod resolver;

pub use definition::{
    Protocol, ServiceDefinition, ServiceType, CONTENT_TYPE, FILTER_HEADER_NAME,
    FILTER_HEADER_VALUE, KNATIVE_EVENT_TYPE, SERVICE_META_HOST, SERVICE_META_PATH,
    SERVICE_META_ZONE,
};
pub use environment::{Environment, CLASSPATH_PREFIX, FILE_PREFIX};
pub use error::EnvironmentError;
pub use placeholder::{Properties, PropertyResolver};
pub use resolver::{
    AddressResolver, PhysicalUri, ResolveOptions, FILTER_PARAM_PREFIX, HTTPS_COMPONENT,
    HTTP_COMPONENT,
};

/// Result type for knative-env operations
pub type Result<T> = std::result::Result<T, EnvironmentError>;

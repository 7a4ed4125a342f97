//! Error types for knative-env

use thiserror::Error;

/// Errors that can occur while loading or querying a service environment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentError {
    /// Environment source missing, unreadable or malformed; unsupported
    /// protocol; host missing after derivation
    #[error("{0}")]
    Config(String),

    /// Mandatory lookup of a service that is not declared
    #[error("Unable to find the service \"{name}\" with type \"{kind}\"")]
    NotFound { name: String, kind: String },
}

impl EnvironmentError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        EnvironmentError::Config(msg.into())
    }
}

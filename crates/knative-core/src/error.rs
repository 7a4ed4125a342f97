//! Error taxonomy for the Knative core.

use knative_env::EnvironmentError;

/// Errors produced while building or running Knative endpoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KnativeError {
    /// Unresolved environment, unsupported protocol, missing host, unknown
    /// spec version or URI parameter. Raised at construction time.
    #[error("configuration error: {0}")]
    Config(String),

    /// Mandatory lookup of an undeclared service.
    #[error("Unable to find the service \"{name}\" with type \"{kind}\"")]
    NotFound { name: String, kind: String },

    /// Malformed structured body or missing envelope attribute.
    #[error("parse error: {0}")]
    Parse(String),

    /// Failure reported by the physical transport.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<EnvironmentError> for KnativeError {
    fn from(err: EnvironmentError) -> Self {
        match err {
            EnvironmentError::Config(msg) => KnativeError::Config(msg),
            EnvironmentError::NotFound { name, kind } => KnativeError::NotFound { name, kind },
        }
    }
}

/// Result type for Knative core operations.
pub type KnativeResult<T> = std::result::Result<T, KnativeError>;

//! Structured observability hooks for endpoint lifecycle and message events.
//!
//! Lifecycle events are emitted at `info!`, decode failures at `warn!`.

use tracing::{info, warn};

/// Span tagging everything recorded inside it with the logical endpoint.
///
/// Use with `tracing::Instrument` for async work.
pub fn endpoint_span(endpoint: &str) -> tracing::Span {
    tracing::info_span!("knative.endpoint", endpoint = %endpoint)
}

/// RAII guard entering [`endpoint_span`] for synchronous code.
///
/// ```ignore
/// let _span = EndpointSpan::enter("knative://endpoint/ep1");
/// ```
pub struct EndpointSpan {
    _span: tracing::span::EnteredSpan,
}

impl EndpointSpan {
    pub fn enter(endpoint: &str) -> Self {
        Self {
            _span: endpoint_span(endpoint).entered(),
        }
    }
}

/// Emit event: logical endpoint resolved and cached.
pub fn emit_endpoint_created(endpoint: &str, physical: &str, spec_version: &str) {
    info!(
        event = "endpoint.created",
        endpoint = %endpoint,
        physical = %physical,
        spec_version = %spec_version,
    );
}

pub fn emit_endpoint_started(endpoint: &str) {
    info!(event = "endpoint.started", endpoint = %endpoint);
}

pub fn emit_endpoint_stopped(endpoint: &str) {
    info!(event = "endpoint.stopped", endpoint = %endpoint);
}

/// Emit event: inbound message rejected by the CloudEvents decoder.
pub fn emit_decode_failed(endpoint: &str, error: &dyn std::fmt::Display) {
    warn!(event = "message.decode_failed", endpoint = %endpoint, error = %error);
}

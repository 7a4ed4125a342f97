use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::CloudEventsVersion;
use crate::error::KnativeResult;
use crate::message::Message;
use crate::metrics::METRICS;
use crate::processor::Processor;

/// Per-endpoint values stamped onto every outgoing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerSettings {
    /// Canonical logical URI of the producing endpoint.
    pub source: String,
    pub event_type: String,
    /// Used only when the message carries no content type of its own.
    pub content_type: Option<String>,
}

/// Outbound step: writes the binary-mode envelope headers.
///
/// Each call generates a fresh id and timestamp; nothing else is mutated.
pub struct ProducerProcessor {
    version: CloudEventsVersion,
    settings: ProducerSettings,
}

impl ProducerProcessor {
    pub fn new(version: CloudEventsVersion, settings: ProducerSettings) -> Self {
        Self { version, settings }
    }
}

#[async_trait]
impl Processor for ProducerProcessor {
    async fn process(&self, mut message: Message) -> KnativeResult<Message> {
        let attrs = self.version.attributes();

        message.set_header(attrs.spec_version.header, self.version.version());
        message.set_header(attrs.event_type.header, self.settings.event_type.as_str());
        message.set_header(attrs.id.header, Uuid::new_v4().to_string());
        message.set_header(attrs.time.header, Utc::now().to_rfc3339());
        message.set_header(attrs.source.header, self.settings.source.as_str());

        if message.content_type().is_none() {
            if let Some(ct) = &self.settings.content_type {
                message.set_content_type(ct.as_str());
            }
        }

        METRICS.inc_events_encoded();
        Ok(message)
    }
}

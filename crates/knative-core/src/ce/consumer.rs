use async_trait::async_trait;

use super::{CloudEvent, CloudEventsVersion, MIME_STRUCTURED_CONTENT_MODE};
use crate::converter::ContentMode;
use crate::error::{KnativeError, KnativeResult};
use crate::message::Message;
use crate::metrics::METRICS;
use crate::obs;
use crate::processor::Processor;

/// Inbound step: validates binary events and unpacks structured ones.
pub struct ConsumerProcessor {
    version: CloudEventsVersion,
    endpoint: String,
}

impl ConsumerProcessor {
    pub fn new(version: CloudEventsVersion, endpoint: impl Into<String>) -> Self {
        Self {
            version,
            endpoint: endpoint.into(),
        }
    }

    fn decode(&self, mut message: Message) -> KnativeResult<Message> {
        let attrs = self.version.attributes();
        match ContentMode::of(&message) {
            ContentMode::Binary => {
                CloudEvent::from_binary(&message, attrs)?;
            }
            ContentMode::Structured => {
                let value: serde_json::Value = serde_json::from_slice(message.body())
                    .map_err(|e| KnativeError::Parse(format!("malformed structured event: {e}")))?;
                let mut event = CloudEvent::from_structured(&value, attrs)?;
                if event.content_type.is_none() {
                    event.content_type = Some(MIME_STRUCTURED_CONTENT_MODE.to_string());
                }
                event.write_binary(&mut message, attrs);
            }
        }
        Ok(message)
    }
}

#[async_trait]
impl Processor for ConsumerProcessor {
    async fn process(&self, message: Message) -> KnativeResult<Message> {
        match self.decode(message) {
            Ok(message) => {
                METRICS.inc_events_decoded();
                Ok(message)
            }
            Err(e) => {
                METRICS.inc_decode_failures();
                obs::emit_decode_failed(&self.endpoint, &e);
                Err(e)
            }
        }
    }
}

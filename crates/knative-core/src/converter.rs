//! Binary vs. structured wire representation.

use async_trait::async_trait;

use crate::ce::{CloudEvent, CloudEventsVersion, MIME_STRUCTURED_CONTENT_MODE};
use crate::error::{KnativeError, KnativeResult};
use crate::message::Message;
use crate::processor::Processor;

/// CloudEvents content mode of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    Binary,
    Structured,
}

impl ContentMode {
    /// Mode selected by the `jsonSerializationEnabled` flag.
    pub fn from_flag(json_serialization_enabled: bool) -> Self {
        if json_serialization_enabled {
            ContentMode::Structured
        } else {
            ContentMode::Binary
        }
    }

    /// Mode of an inbound message, detected from its content type alone.
    pub fn of(message: &Message) -> Self {
        let structured = message
            .content_type()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|ct| ct.trim().eq_ignore_ascii_case(MIME_STRUCTURED_CONTENT_MODE));
        if structured {
            ContentMode::Structured
        } else {
            ContentMode::Binary
        }
    }
}

/// Outbound step enforcing the configured content mode.
///
/// Binary mode passes the message through. Structured mode folds the
/// envelope headers and the body into one JSON document.
pub struct ContentModeConverter {
    mode: ContentMode,
    version: CloudEventsVersion,
}

impl ContentModeConverter {
    pub fn new(mode: ContentMode, version: CloudEventsVersion) -> Self {
        Self { mode, version }
    }

    pub fn mode(&self) -> ContentMode {
        self.mode
    }

    fn to_structured(&self, mut message: Message) -> KnativeResult<Message> {
        let attrs = self.version.attributes();
        let event = CloudEvent::from_binary(&message, attrs)?;
        let body = serde_json::to_vec(&event.to_structured(attrs)?)
            .map_err(|e| KnativeError::Parse(e.to_string()))?;

        for attr in attrs.required() {
            message.remove_header(attr.header);
        }
        let extensions: Vec<String> = message
            .headers()
            .keys()
            .filter(|k| attrs.extension_name(k).is_some())
            .cloned()
            .collect();
        for header in extensions {
            message.remove_header(&header);
        }

        message.set_body(body);
        message.set_content_type(MIME_STRUCTURED_CONTENT_MODE);
        Ok(message)
    }
}

#[async_trait]
impl Processor for ContentModeConverter {
    async fn process(&self, message: Message) -> KnativeResult<Message> {
        match self.mode {
            ContentMode::Binary => Ok(message),
            ContentMode::Structured => self.to_structured(message),
        }
    }
}

//! The normalized event envelope and its two wire representations.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde_json::{Map, Value};

use super::attributes::{Attributes, DATA_KEY};
use crate::error::{KnativeError, KnativeResult};
use crate::message::Message;

/// A CloudEvent independent of its wire representation.
///
/// `time` keeps the exact text it was received with; it is validated as
/// RFC 3339 on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudEvent {
    pub spec_version: String,
    pub event_type: String,
    pub id: String,
    pub time: String,
    pub source: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
    pub extensions: BTreeMap<String, String>,
}

impl CloudEvent {
    /// Read a binary-mode event from message headers and body.
    pub fn from_binary(message: &Message, attrs: &Attributes) -> KnativeResult<Self> {
        let required = |header: &str| {
            message
                .header(header)
                .map(str::to_string)
                .ok_or_else(|| KnativeError::Parse(format!("missing header {header}")))
        };

        let time = required(attrs.time.header)?;
        validate_time(&time)?;

        let extensions = message
            .headers()
            .iter()
            .filter_map(|(k, v)| attrs.extension_name(k).map(|n| (n.to_string(), v.clone())))
            .collect();

        Ok(Self {
            spec_version: required(attrs.spec_version.header)?,
            event_type: required(attrs.event_type.header)?,
            id: required(attrs.id.header)?,
            time,
            source: required(attrs.source.header)?,
            content_type: message.content_type().map(str::to_string),
            data: message.body().to_vec(),
            extensions,
        })
    }

    /// Read a structured-mode event from a parsed JSON document.
    pub fn from_structured(value: &Value, attrs: &Attributes) -> KnativeResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| KnativeError::Parse("structured event is not a JSON object".into()))?;

        let required = |key: &str| match object.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(KnativeError::Parse(format!("attribute {key} is not a string"))),
            None => Err(KnativeError::Parse(format!("missing attribute {key}"))),
        };

        let time = required(attrs.time.key)?;
        validate_time(&time)?;

        let content_type = match object.get(attrs.content_type_key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(text_of(v)),
        };

        let data = match object.get(DATA_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => s.clone().into_bytes(),
            Some(v) => serde_json::to_vec(v).map_err(|e| KnativeError::Parse(e.to_string()))?,
        };

        let known: Vec<&str> = attrs
            .required()
            .iter()
            .map(|a| a.key)
            .chain([attrs.content_type_key, DATA_KEY])
            .collect();
        let extensions = object
            .iter()
            .filter(|(k, _)| !known.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), text_of(v)))
            .collect();

        Ok(Self {
            spec_version: required(attrs.spec_version.key)?,
            event_type: required(attrs.event_type.key)?,
            id: required(attrs.id.key)?,
            time,
            source: required(attrs.source.key)?,
            content_type,
            data,
            extensions,
        })
    }

    /// Render as a structured JSON object. The payload must be UTF-8.
    pub fn to_structured(&self, attrs: &Attributes) -> KnativeResult<Value> {
        let data = std::str::from_utf8(&self.data).map_err(|_| {
            KnativeError::Parse("structured mode requires a UTF-8 payload".to_string())
        })?;

        let mut object = Map::new();
        for (k, v) in &self.extensions {
            object.insert(k.clone(), Value::String(v.clone()));
        }
        object.insert(attrs.spec_version.key.into(), self.spec_version.clone().into());
        object.insert(attrs.event_type.key.into(), self.event_type.clone().into());
        object.insert(attrs.id.key.into(), self.id.clone().into());
        object.insert(attrs.time.key.into(), self.time.clone().into());
        object.insert(attrs.source.key.into(), self.source.clone().into());
        if let Some(ct) = &self.content_type {
            object.insert(attrs.content_type_key.into(), ct.clone().into());
        }
        object.insert(DATA_KEY.into(), data.into());
        Ok(Value::Object(object))
    }

    /// Write this event onto `message` in binary mode, replacing its body.
    pub fn write_binary(&self, message: &mut Message, attrs: &Attributes) {
        message.set_header(attrs.spec_version.header, self.spec_version.as_str());
        message.set_header(attrs.event_type.header, self.event_type.as_str());
        message.set_header(attrs.id.header, self.id.as_str());
        message.set_header(attrs.time.header, self.time.as_str());
        message.set_header(attrs.source.header, self.source.as_str());
        for (k, v) in &self.extensions {
            message.set_header(attrs.header_for_key(k), v.as_str());
        }
        if let Some(ct) = &self.content_type {
            message.set_content_type(ct.as_str());
        }
        message.set_body(self.data.clone());
    }
}

fn validate_time(time: &str) -> KnativeResult<()> {
    DateTime::parse_from_rfc3339(time)
        .map(|_| ())
        .map_err(|e| KnativeError::Parse(format!("invalid event time {time:?}: {e}")))
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! Per-version attribute naming: binary header names and structured JSON keys.

/// Standard payload key in the structured representation.
pub const DATA_KEY: &str = "data";

/// One envelope attribute as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    /// Header name in binary mode.
    pub header: &'static str,
    /// Key in the structured JSON object.
    pub key: &'static str,
}

impl Attribute {
    const fn new(header: &'static str, key: &'static str) -> Self {
        Self { header, key }
    }
}

/// The attribute set of one CloudEvents spec version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub spec_version: Attribute,
    pub event_type: Attribute,
    pub id: Attribute,
    pub time: Attribute,
    pub source: Attribute,
    /// JSON key for the payload content type. The header is always `Content-Type`.
    pub content_type_key: &'static str,
    /// Prefix applied to extension attributes in binary mode.
    pub header_prefix: &'static str,
}

pub(crate) const V01: Attributes = Attributes {
    spec_version: Attribute::new("CE-CloudEventsVersion", "cloudEventsVersion"),
    event_type: Attribute::new("CE-EventType", "eventType"),
    id: Attribute::new("CE-EventID", "eventID"),
    time: Attribute::new("CE-EventTime", "eventTime"),
    source: Attribute::new("CE-Source", "source"),
    content_type_key: "contentType",
    header_prefix: "CE-",
};

pub(crate) const V02: Attributes = Attributes {
    spec_version: Attribute::new("ce-specversion", "specversion"),
    event_type: Attribute::new("ce-type", "type"),
    id: Attribute::new("ce-id", "id"),
    time: Attribute::new("ce-time", "time"),
    source: Attribute::new("ce-source", "source"),
    content_type_key: "contenttype",
    header_prefix: "ce-",
};

pub(crate) const V03: Attributes = Attributes {
    content_type_key: "datacontenttype",
    ..V02
};

impl Attributes {
    /// Attributes that must be present on every event.
    pub fn required(&self) -> [Attribute; 5] {
        [
            self.spec_version,
            self.event_type,
            self.id,
            self.time,
            self.source,
        ]
    }

    /// Binary header for a structured key; unknown keys are extensions.
    pub fn header_for_key(&self, key: &str) -> String {
        self.required()
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.header.to_string())
            .unwrap_or_else(|| format!("{}{key}", self.header_prefix))
    }

    /// Name of the extension carried by `header`, if it is one.
    pub fn extension_name<'h>(&self, header: &'h str) -> Option<&'h str> {
        if self
            .required()
            .iter()
            .any(|a| a.header.eq_ignore_ascii_case(header))
        {
            return None;
        }
        let prefix_len = self.header_prefix.len();
        header
            .get(..prefix_len)
            .filter(|p| p.eq_ignore_ascii_case(self.header_prefix))
            .and_then(|_| header.get(prefix_len..))
            .filter(|name| !name.is_empty())
    }
}

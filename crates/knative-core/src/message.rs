//! The in-flight message exchanged with the surrounding pipeline.

use std::collections::BTreeMap;

/// Standard content type header.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// A transport message: headers plus an opaque body.
///
/// Header names are matched ASCII case-insensitively, the way HTTP does;
/// the spelling of the first insertion is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Builder-style header insert.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Insert or replace a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = self
            .existing_key(&name)
            .map(str::to_string)
            .unwrap_or(name);
        self.headers.insert(key, value.into());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let key = self.existing_key(name)?.to_string();
        self.headers.remove(&key)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE_HEADER)
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.set_header(CONTENT_TYPE_HEADER, content_type);
    }

    fn existing_key(&self, name: &str) -> Option<&str> {
        self.headers
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

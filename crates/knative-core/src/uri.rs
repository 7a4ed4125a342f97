//! Logical `knative:` URIs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use knative_env::ServiceType;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{KnativeError, KnativeResult};

pub const SCHEME: &str = "knative";

/// Characters escaped when writing query keys and values.
const QUERY: &AsciiSet = &CONTROLS.add(b' ').add(b'#').add(b'%').add(b'&').add(b'=');

/// A parsed logical address: `knative://<type>/<name>[/<sub-path>][?params]`.
///
/// The single-slash form `knative:<type>/<name>` is accepted too. Equality and
/// `Display` use the canonical form with parameters sorted by key. Query keys
/// and values are percent-decoded on parse and re-encoded on display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalUri {
    kind: ServiceType,
    name: String,
    sub_path: Option<String>,
    params: BTreeMap<String, String>,
}

impl LogicalUri {
    pub fn new(kind: ServiceType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            sub_path: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_sub_path(mut self, sub_path: impl Into<String>) -> Self {
        let sub_path = sub_path.into();
        self.sub_path = if sub_path.is_empty() || sub_path == "/" {
            None
        } else if sub_path.starts_with('/') {
            Some(sub_path)
        } else {
            Some(format!("/{sub_path}"))
        };
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ServiceType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sub_path(&self) -> Option<&str> {
        self.sub_path.as_deref()
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

impl FromStr for LogicalUri {
    type Err = KnativeError;

    fn from_str(s: &str) -> KnativeResult<Self> {
        let rest = s
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| KnativeError::Config(format!("not a knative URI: {s}")))?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);

        let (location, query) = match rest.split_once('?') {
            Some((l, q)) => (l, Some(q)),
            None => (rest, None),
        };

        let (kind, remaining) = location
            .split_once('/')
            .ok_or_else(|| KnativeError::Config(format!("missing service name in {s}")))?;
        let kind: ServiceType = kind.parse()?;

        let (name, sub_path) = match remaining.split_once('/') {
            Some((name, sub)) => (name, sub),
            None => (remaining, ""),
        };
        if name.is_empty() {
            return Err(KnativeError::Config(format!("missing service name in {s}")));
        }

        let mut uri = LogicalUri::new(kind, name).with_sub_path(sub_path);
        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            uri.params.insert(decode(k, s)?, decode(v, s)?);
        }
        Ok(uri)
    }
}

fn decode(component: &str, uri: &str) -> KnativeResult<String> {
    percent_decode_str(component)
        .decode_utf8()
        .map(|c| c.into_owned())
        .map_err(|_| KnativeError::Config(format!("invalid percent-encoding in {uri}")))
}

impl fmt::Display for LogicalUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}/{}", self.kind, self.name)?;
        if let Some(sub) = &self.sub_path {
            f.write_str(sub)?;
        }
        let mut sep = '?';
        for (k, v) in &self.params {
            write!(
                f,
                "{sep}{}={}",
                utf8_percent_encode(k, QUERY),
                utf8_percent_encode(v, QUERY)
            )?;
            sep = '&';
        }
        Ok(())
    }
}

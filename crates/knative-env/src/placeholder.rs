//! Best-effort property placeholder resolution.
//!
//! Zone metadata may reference configuration through `{{...}}` placeholders:
//!
//! - `{{key}}` / `{{key:default}}`: looked up in [`Properties`]
//! - `{{env:NAME}}` / `{{env:NAME:default}}`: looked up in the process environment
//!
//! Resolution is total: any placeholder that cannot be resolved makes the
//! whole value resolve to `None`. It never errors and never loops forever.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

const ENV_PREFIX: &str = "env:";
const MAX_DEPTH: usize = 8;

/// Resolves placeholder expressions inside a string.
pub trait PropertyResolver: Send + Sync {
    /// Resolve every placeholder in `input`, or `None` if any cannot be resolved.
    fn resolve(&self, input: &str) -> Option<String>;
}

/// Flat key/value property source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn lookup(&self, expr: &str) -> Option<String> {
        let expr = expr.trim();
        if let Some(rest) = expr.strip_prefix(ENV_PREFIX) {
            let (name, default) = split_default(rest);
            return std::env::var(name).ok().or_else(|| default.map(str::to_string));
        }
        let (key, default) = split_default(expr);
        self.get(key)
            .map(str::to_string)
            .or_else(|| default.map(str::to_string))
    }

    fn resolve_once(&self, input: &str) -> Option<String> {
        let re = placeholder_regex()?;
        let mut unresolved = false;
        let out = re.replace_all(input, |caps: &Captures<'_>| match self.lookup(&caps[1]) {
            Some(value) => value,
            None => {
                unresolved = true;
                String::new()
            }
        });
        if unresolved {
            None
        } else {
            Some(out.into_owned())
        }
    }
}

impl From<BTreeMap<String, String>> for Properties {
    fn from(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl PropertyResolver for Properties {
    fn resolve(&self, input: &str) -> Option<String> {
        let mut current = input.to_string();
        for _ in 0..MAX_DEPTH {
            if !current.contains("{{") {
                return Some(current);
            }
            let next = self.resolve_once(&current)?;
            if next == current {
                return Some(next);
            }
            current = next;
        }
        None
    }
}

fn split_default(expr: &str) -> (&str, Option<&str>) {
    match expr.split_once(':') {
        Some((key, default)) => (key.trim(), Some(default)),
        None => (expr, None),
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").ok()).as_ref()
}

//! Scroll query evaluation for local resources.

use docbridge::path;
use docbridge_types::settings::keys;
use docbridge_types::{BridgeError, Document, FormatMode, Value};

/// Parsed `store.query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermQuery {
    /// Every document matches.
    All,
    /// The value at `path` must render as `value`. A list matches when any
    /// element does.
    Term { path: String, value: String },
}

impl TermQuery {
    /// Accepts an empty query, `*`, `path:value`, and the URI forms
    /// `?q=*` / `?q=path:value`.
    ///
    /// # Errors
    ///
    /// Returns a config error for anything else.
    pub fn parse(query: Option<&str>) -> Result<Self, BridgeError> {
        let raw = query.unwrap_or_default().trim();
        let body = raw.strip_prefix("?q=").unwrap_or(raw).trim();
        if body.is_empty() || body == "*" {
            return Ok(Self::All);
        }
        match body.split_once(':') {
            Some((path, value)) if !path.trim().is_empty() => Ok(Self::Term {
                path: path.trim().to_string(),
                value: value.trim().to_string(),
            }),
            _ => Err(BridgeError::config(
                "INVALID_QUERY",
                format!("{}: unsupported query '{raw}'", keys::QUERY),
            )),
        }
    }

    pub fn matches(&self, document: &Document, mode: FormatMode) -> bool {
        match self {
            Self::All => true,
            Self::Term { path, value } => {
                path::lookup(document, path, mode).is_some_and(|v| renders_as(v, value))
            }
        }
    }
}

fn renders_as(candidate: &Value, expected: &str) -> bool {
    match candidate {
        Value::List(items) => items.iter().any(|item| renders_as(item, expected)),
        Value::Null => false,
        other => other.to_string() == expected,
    }
}

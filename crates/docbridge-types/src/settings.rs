//! Task settings.
//!
//! [`Settings`] is a flat string map resolved once per task from the engine's
//! task configuration and the adapter's own properties. Every mutation method
//! consumes `self` and returns a new value, so a resolved `Settings` handed to
//! a repository cannot change underneath it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Well-known setting keys.
pub mod keys {
    pub const NODES: &str = "store.nodes";
    pub const PORT: &str = "store.port";
    pub const RESOURCE: &str = "store.resource";
    pub const RESOURCE_READ: &str = "store.resource.read";
    pub const RESOURCE_WRITE: &str = "store.resource.write";
    pub const QUERY: &str = "store.query";
    /// Alias table, `tupleField:document.path` pairs separated by commas.
    pub const MAPPING_NAMES: &str = "store.mapping.names";
    /// Store version, normally filled in by the repository layer.
    pub const INTERNAL_VERSION: &str = "store.internal.version";
    /// Explicit format override (`legacy` or `current`).
    pub const FORMAT: &str = "store.format";
    pub const INDEX_AUTO_CREATE: &str = "store.index.auto.create";
    pub const SER_WRITER_VALUE: &str = "store.ser.writer.value";
    pub const SER_READER_VALUE: &str = "store.ser.reader.value";
    pub const SER_BYTES_CONVERTER: &str = "store.ser.bytes.converter";
    pub const MAPPING_EXTRACTOR: &str = "store.mapping.extractor";
    pub const BATCH_SIZE_ENTRIES: &str = "store.batch.size.entries";
}

pub const DEFAULT_NODES: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9200;
pub const DEFAULT_BATCH_SIZE_ENTRIES: usize = 1000;

/// Document format generation of the target store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatMode {
    /// Nested attributes are flattened into one dotted top-level key.
    Legacy,
    /// Nested attributes are real sub-maps.
    #[default]
    Current,
}

impl fmt::Display for FormatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Legacy => "legacy",
            Self::Current => "current",
        })
    }
}

impl FromStr for FormatMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" | "flat" => Ok(Self::Legacy),
            "current" | "nested" => Ok(Self::Current),
            other => Err(BridgeError::config(
                "INVALID_FORMAT",
                format!("{}: '{other}' (expected legacy or current)", keys::FORMAT),
            )),
        }
    }
}

impl FormatMode {
    /// Format generation implied by a store version string. `0.x` stores
    /// flatten nested attributes; anything newer nests them.
    pub fn from_version(version: &str) -> Self {
        match version.trim().split('.').next() {
            Some("0") => Self::Legacy,
            _ => Self::Current,
        }
    }
}

/// Immutable, merged key/value configuration for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    entries: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from any key/value source (typically the engine's task
    /// configuration copy).
    pub fn load_from<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Overlay `other` on top of `self`. Keys present in both take `other`'s value.
    #[must_use]
    pub fn merge(mut self, other: &Settings) -> Self {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
        self
    }

    /// Set `key`, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Set `key` only when it has no value yet.
    #[must_use]
    pub fn with_default(mut self, key: &str, value: &str) -> Self {
        if !self.entries.contains_key(key) {
            tracing::debug!(key, value, "using default setting");
            self.entries.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value of `key`, treating blank strings as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    // ── Typed accessors ─────────────────────────────────────────────

    pub fn nodes(&self) -> &str {
        self.get_non_empty(keys::NODES).unwrap_or(DEFAULT_NODES)
    }

    /// # Errors
    ///
    /// Returns a config error when the port is not a valid `u16`.
    pub fn port(&self) -> Result<u16, BridgeError> {
        self.parse_or(keys::PORT, DEFAULT_PORT)
    }

    /// Resource to read from: `store.resource.read`, else `store.resource`.
    pub fn resource_read(&self) -> Option<&str> {
        self.get_non_empty(keys::RESOURCE_READ)
            .or_else(|| self.get_non_empty(keys::RESOURCE))
    }

    /// Resource to write to: `store.resource.write`, else `store.resource`.
    pub fn resource_write(&self) -> Option<&str> {
        self.get_non_empty(keys::RESOURCE_WRITE)
            .or_else(|| self.get_non_empty(keys::RESOURCE))
    }

    pub fn query(&self) -> Option<&str> {
        self.get_non_empty(keys::QUERY)
    }

    pub fn mapping_names(&self) -> Option<&str> {
        self.get_non_empty(keys::MAPPING_NAMES)
    }

    /// Document format generation for this task.
    ///
    /// An explicit `store.format` wins; otherwise the store version decides.
    /// With neither present the current format is assumed, since only a
    /// discovered `0.x` version can require flat keys.
    ///
    /// # Errors
    ///
    /// Returns a config error for an unrecognised `store.format` value.
    pub fn format_mode(&self) -> Result<FormatMode, BridgeError> {
        if let Some(explicit) = self.get_non_empty(keys::FORMAT) {
            return explicit.parse();
        }
        Ok(self
            .get_non_empty(keys::INTERNAL_VERSION)
            .map(FormatMode::from_version)
            .unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns a config error when the value is not a boolean.
    pub fn index_auto_create(&self) -> Result<bool, BridgeError> {
        match self.get_non_empty(keys::INDEX_AUTO_CREATE) {
            None => Ok(true),
            Some(v) => match v.to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                other => Err(BridgeError::config(
                    "INVALID_SETTING",
                    format!("{}: '{other}' is not a boolean", keys::INDEX_AUTO_CREATE),
                )),
            },
        }
    }

    /// # Errors
    ///
    /// Returns a config error when the value is not a positive integer.
    pub fn batch_size_entries(&self) -> Result<usize, BridgeError> {
        let size = self.parse_or(keys::BATCH_SIZE_ENTRIES, DEFAULT_BATCH_SIZE_ENTRIES)?;
        if size == 0 {
            return Err(BridgeError::config(
                "INVALID_SETTING",
                format!("{} must be greater than zero", keys::BATCH_SIZE_ENTRIES),
            ));
        }
        Ok(size)
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, BridgeError> {
        match self.get_non_empty(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                BridgeError::config("INVALID_SETTING", format!("{key}: invalid value '{raw}'"))
            }),
        }
    }

    // ── YAML loading ────────────────────────────────────────────────

    /// Parse settings from YAML (after `${VAR}` substitution).
    ///
    /// Nested maps flatten into dotted keys and scalar lists join with commas,
    /// so `store: {mapping: {names: [a:x, b:y]}}` becomes
    /// `store.mapping.names = "a:x,b:y"`.
    ///
    /// # Errors
    ///
    /// Returns a config error if substitution fails or the YAML is not a map.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, BridgeError> {
        let substituted = substitute_env_vars(yaml)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&substituted).map_err(|e| {
            BridgeError::config("INVALID_YAML", format!("failed to parse settings YAML: {e}"))
        })?;
        let mut entries = BTreeMap::new();
        match doc {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Mapping(_) => flatten_yaml("", &doc, &mut entries)?,
            _ => {
                return Err(BridgeError::config(
                    "INVALID_YAML",
                    "settings YAML must be a mapping",
                ))
            }
        }
        Ok(Self { entries })
    }

    /// # Errors
    ///
    /// Returns a config error if the file cannot be read or parsed.
    pub fn from_yaml_file(path: &Path) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config(
                "SETTINGS_UNREADABLE",
                format!("failed to read settings file {}: {e}", path.display()),
            )
        })?;
        Self::from_yaml_str(&content)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::load_from(iter)
    }
}

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns a config error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String, BridgeError> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => result = result.replace(&cap[0], &val),
            Err(_) => missing.push(var_name.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(BridgeError::config(
            "MISSING_ENV_VAR",
            format!("missing environment variable(s): {}", missing.join(", ")),
        ));
    }
    Ok(result)
}

fn flatten_yaml(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), BridgeError> {
    use serde_yaml::Value as Y;

    match value {
        Y::Null => {}
        Y::Mapping(map) => {
            for (k, v) in map {
                let key = scalar_to_string(k).ok_or_else(|| {
                    BridgeError::config("INVALID_YAML", "settings keys must be scalars")
                })?;
                let full = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_yaml(&full, v, out)?;
            }
        }
        Y::Sequence(items) => {
            let parts = items
                .iter()
                .map(|item| {
                    scalar_to_string(item).ok_or_else(|| {
                        BridgeError::config(
                            "INVALID_YAML",
                            format!("list under '{prefix}' must hold scalars only"),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            out.insert(prefix.to_string(), parts.join(","));
        }
        Y::Tagged(tagged) => flatten_yaml(prefix, &tagged.value, out)?,
        scalar => {
            if let Some(s) = scalar_to_string(scalar) {
                out.insert(prefix.to_string(), s);
            }
        }
    }
    Ok(())
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

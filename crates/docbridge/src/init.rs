//! Settings resolution for a task.
//!
//! Turns the engine's task configuration plus the adapter's static
//! [`AdapterSpec`] into the immutable [`Settings`] a task runs with.

use std::fmt;

use docbridge_types::settings::keys;
use docbridge_types::{BridgeError, Fields, Settings};
use serde::{Deserialize, Serialize};

use crate::repository::Repository;

pub const DEFAULT_VALUE_WRITER: &str = "tuple";
pub const DEFAULT_VALUE_READER: &str = "document";
pub const DEFAULT_BYTES_CONVERTER: &str = "raw-bytes";
pub const DEFAULT_FIELD_EXTRACTOR: &str = "tuple-field";

/// Direction of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Read,
    Write,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// Static adapter description fixed when the pipeline is assembled.
///
/// Serializable so the engine can ship it to every task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub fields: Fields,
    /// Adapter-local properties. They override task configuration on merge.
    #[serde(default)]
    pub props: Settings,
}

impl AdapterSpec {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn nodes(mut self, nodes: impl Into<String>) -> Self {
        self.nodes = Some(nodes.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn props(mut self, props: Settings) -> Self {
        self.props = props;
        self
    }
}

/// Resolve the settings a task runs with.
///
/// Task configuration is loaded first and adapter properties are merged on
/// top. Coordinates from `spec` are then bound, serializer defaults filled in
/// where unset, and the result validated.
///
/// # Errors
///
/// Returns a config error when no resource is known for `kind` or a setting
/// is malformed.
pub fn resolve_settings(
    task_config: &Settings,
    spec: &AdapterSpec,
    kind: TaskKind,
) -> Result<Settings, BridgeError> {
    let merged = task_config.clone().merge(&spec.props);
    let bound = bind_coordinates(merged, spec, kind);
    let settings = apply_serialization_defaults(bound);
    validate(&settings, kind)?;
    Ok(settings)
}

/// Write host, port, resource and query from `spec` into `settings`.
///
/// Only coordinates the adapter spec actually carries are written.
pub fn bind_coordinates(settings: Settings, spec: &AdapterSpec, kind: TaskKind) -> Settings {
    let mut settings = settings;
    if let Some(nodes) = spec.nodes.as_deref().filter(|n| !n.trim().is_empty()) {
        settings = settings.with(keys::NODES, nodes);
    }
    if let Some(port) = spec.port.filter(|p| *p > 0) {
        settings = settings.with(keys::PORT, port.to_string());
    }
    if !spec.resource.trim().is_empty() {
        let key = match kind {
            TaskKind::Read => keys::RESOURCE_READ,
            TaskKind::Write => keys::RESOURCE_WRITE,
        };
        settings = settings.with(key, spec.resource.clone());
    }
    if kind == TaskKind::Read {
        if let Some(query) = spec.query.as_deref().filter(|q| !q.trim().is_empty()) {
            settings = settings.with(keys::QUERY, query);
        }
    }
    settings
}

/// Fill serializer and extractor selections that the configuration left open.
pub fn apply_serialization_defaults(settings: Settings) -> Settings {
    settings
        .with_default(keys::SER_WRITER_VALUE, DEFAULT_VALUE_WRITER)
        .with_default(keys::SER_READER_VALUE, DEFAULT_VALUE_READER)
        .with_default(keys::SER_BYTES_CONVERTER, DEFAULT_BYTES_CONVERTER)
        .with_default(keys::MAPPING_EXTRACTOR, DEFAULT_FIELD_EXTRACTOR)
}

/// # Errors
///
/// Returns a config error for a missing resource or malformed setting.
pub fn validate(settings: &Settings, kind: TaskKind) -> Result<(), BridgeError> {
    let resource = match kind {
        TaskKind::Read => settings.resource_read(),
        TaskKind::Write => settings.resource_write(),
    };
    if resource.is_none() {
        return Err(BridgeError::config(
            "MISSING_RESOURCE",
            format!("no {kind} resource configured (set {})", keys::RESOURCE),
        ));
    }
    settings.port()?;
    settings.format_mode()?;
    settings.index_auto_create()?;
    settings.batch_size_entries()?;
    Ok(())
}

/// Make sure the write resource exists before the first write.
///
/// An absent resource is created when `store.index.auto.create` is enabled
/// (the default) and rejected otherwise.
///
/// # Errors
///
/// Returns a config error when the resource is missing and auto-create is
/// disabled, or propagates transport failures.
pub fn check_resource_existence<R: Repository + ?Sized>(
    settings: &Settings,
    repository: &mut R,
) -> Result<(), BridgeError> {
    if repository.resource_exists()? {
        return Ok(());
    }
    let resource = settings.resource_write().unwrap_or_default();
    if settings.index_auto_create()? {
        tracing::info!(resource, "creating missing target resource");
        return repository.create_resource();
    }
    Err(BridgeError::config(
        "RESOURCE_MISSING",
        format!(
            "target resource '{resource}' does not exist and {} is disabled",
            keys::INDEX_AUTO_CREATE
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_props_override_task_config() {
        let task = Settings::new().with(keys::QUERY, "from-task").with(keys::NODES, "task-node");
        let spec = AdapterSpec::new("people")
            .props(Settings::new().with(keys::QUERY, "from-props"));
        let s = resolve_settings(&task, &spec, TaskKind::Read).unwrap();
        assert_eq!(s.query(), Some("from-props"));
        assert_eq!(s.nodes(), "task-node");
    }

    #[test]
    fn spec_coordinates_win_over_both_sources() {
        let task = Settings::new().with(keys::PORT, "9300");
        let spec = AdapterSpec::new("people")
            .nodes("es1")
            .port(9201)
            .query("user.name:ana")
            .props(Settings::new().with(keys::NODES, "props-node"));
        let s = resolve_settings(&task, &spec, TaskKind::Read).unwrap();
        assert_eq!(s.nodes(), "es1");
        assert_eq!(s.port().unwrap(), 9201);
        assert_eq!(s.query(), Some("user.name:ana"));
        assert_eq!(s.resource_read(), Some("people"));
    }

    #[test]
    fn write_tasks_ignore_query() {
        let spec = AdapterSpec::new("out").query("ignored");
        let s = resolve_settings(&Settings::new(), &spec, TaskKind::Write).unwrap();
        assert_eq!(s.query(), None);
        assert_eq!(s.resource_write(), Some("out"));
    }

    #[test]
    fn defaults_do_not_override_configuration() {
        let task = Settings::new().with(keys::SER_WRITER_VALUE, "custom-writer");
        let s = resolve_settings(&task, &AdapterSpec::new("r"), TaskKind::Write).unwrap();
        assert_eq!(s.get(keys::SER_WRITER_VALUE), Some("custom-writer"));
        assert_eq!(s.get(keys::SER_READER_VALUE), Some(DEFAULT_VALUE_READER));
        assert_eq!(s.get(keys::MAPPING_EXTRACTOR), Some(DEFAULT_FIELD_EXTRACTOR));
    }

    #[test]
    fn missing_resource_is_fatal() {
        let err = resolve_settings(&Settings::new(), &AdapterSpec::default(), TaskKind::Read)
            .unwrap_err();
        assert!(err.is_fatal_config());
        assert_eq!(err.code, "MISSING_RESOURCE");
    }

    #[test]
    fn resource_from_task_config_is_enough() {
        let task = Settings::new().with(keys::RESOURCE, "from-config");
        let s = resolve_settings(&task, &AdapterSpec::default(), TaskKind::Read).unwrap();
        assert_eq!(s.resource_read(), Some("from-config"));
    }

    #[test]
    fn spec_survives_serialization() {
        let spec = AdapterSpec::new("people")
            .port(9200)
            .fields(Fields::named(["name"]))
            .props(Settings::new().with(keys::MAPPING_NAMES, "name:user.name"));
        let json = serde_json::to_string(&spec).unwrap();
        let back: AdapterSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}

//! Tuple/document projection.
//!
//! [`ProjectionContext`] bundles what a task resolves once at configuration
//! time (alias table and format mode) and is passed by reference into every
//! read and write.

use docbridge_types::{BridgeError, Document, Fields, FormatMode, Settings, Tuple, Value};
use serde::{Deserialize, Serialize};

use crate::alias::FieldAlias;
use crate::path;
use crate::repository::WriteRecord;

/// Alias table and format mode resolved for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionContext {
    alias: FieldAlias,
    mode: FormatMode,
}

impl ProjectionContext {
    pub fn new(alias: FieldAlias, mode: FormatMode) -> Self {
        Self { alias, mode }
    }

    /// # Errors
    ///
    /// Returns a config error for a malformed alias table or format setting.
    pub fn from_settings(settings: &Settings) -> Result<Self, BridgeError> {
        Ok(Self {
            alias: FieldAlias::from_settings(settings)?,
            mode: settings.format_mode()?,
        })
    }

    pub fn alias(&self) -> &FieldAlias {
        &self.alias
    }

    pub fn mode(&self) -> FormatMode {
        self.mode
    }

    /// Value of a tuple field inside `document`, after alias resolution.
    pub fn resolve<'d>(&self, document: &'d Document, field: &str) -> Option<&'d Value> {
        path::lookup(document, self.alias.to_document_path(field), self.mode)
    }

    /// Fill `tuple` from `document`.
    ///
    /// Declared tuples get every field set, in schema order, to the value at
    /// its resolved path (null when missing); attributes no field refers to
    /// are ignored. Undeclared tuples have their values replaced by the
    /// document's top-level values in document order.
    ///
    /// # Errors
    ///
    /// Returns a data error when a value cannot be coerced into a typed slot;
    /// the tuple keeps its previous values in that case.
    pub fn project(&self, tuple: &mut Tuple, document: &Document) -> Result<(), BridgeError> {
        if !tuple.is_declared() {
            return tuple.replace_values(document.values().cloned());
        }
        let resolved: Vec<Value> = tuple
            .fields()
            .as_slice()
            .iter()
            .map(|field| self.resolve(document, &field.name).cloned().unwrap_or_default())
            .collect();
        tuple.replace_values(resolved)
    }

    /// Output attribute names for the declared sink fields.
    ///
    /// # Errors
    ///
    /// Returns a schema error when `fields` is undeclared, since a document
    /// cannot be built without attribute names.
    pub fn write_projection(&self, fields: &Fields) -> Result<WriteProjection, BridgeError> {
        if !fields.is_declared() {
            return Err(BridgeError::schema(
                "UNDECLARED_SINK_FIELDS",
                "writing requires declared tuple fields",
            ));
        }
        let names = fields
            .as_slice()
            .iter()
            .map(|f| self.alias.to_document_path(&f.name).to_string())
            .collect();
        Ok(WriteProjection { names })
    }
}

/// Output attribute names for a sink, resolved once per task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteProjection {
    names: Vec<String>,
}

impl WriteProjection {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Pair each tuple value with its output attribute name.
    ///
    /// # Errors
    ///
    /// Returns a schema error when the tuple width differs from the sink schema.
    pub fn record(&self, tuple: &Tuple) -> Result<WriteRecord, BridgeError> {
        if tuple.len() != self.names.len() {
            return Err(BridgeError::schema(
                "ARITY_MISMATCH",
                format!(
                    "sink expects {} values but tuple has {}",
                    self.names.len(),
                    tuple.len()
                ),
            ));
        }
        Ok(WriteRecord {
            entries: self
                .names
                .iter()
                .cloned()
                .zip(tuple.values().iter().cloned())
                .collect(),
        })
    }
}

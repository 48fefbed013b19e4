//! Field alias table.
//!
//! Maps pipeline field names to document attribute paths and back. Names
//! without an entry map to themselves.

use std::collections::BTreeMap;

use docbridge_types::settings::keys;
use docbridge_types::{BridgeError, Settings};
use serde::{Deserialize, Serialize};

/// Bidirectional tuple-field / document-path table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAlias {
    to_document: BTreeMap<String, String>,
    to_tuple: BTreeMap<String, String>,
}

impl FieldAlias {
    /// Parse `tupleName:documentPath` pairs separated by commas.
    ///
    /// Whitespace around names is ignored and blank entries are skipped. When
    /// two tuple fields point at the same document path, reverse lookup
    /// resolves to the first one.
    ///
    /// # Errors
    ///
    /// Returns a config error for entries without a `:` or with an empty side.
    pub fn parse(spec: &str) -> Result<Self, BridgeError> {
        let mut alias = Self::default();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (field, path) = entry
                .split_once(':')
                .map(|(f, p)| (f.trim(), p.trim()))
                .filter(|(f, p)| !f.is_empty() && !p.is_empty())
                .ok_or_else(|| {
                    BridgeError::config(
                        "INVALID_ALIAS",
                        format!(
                            "{}: entry '{entry}' is not of the form field:path",
                            keys::MAPPING_NAMES
                        ),
                    )
                })?;
            alias.insert(field, path);
        }
        Ok(alias)
    }

    /// Alias table configured under `store.mapping.names`; empty when unset.
    ///
    /// # Errors
    ///
    /// Returns a config error when the configured table is malformed.
    pub fn from_settings(settings: &Settings) -> Result<Self, BridgeError> {
        settings
            .mapping_names()
            .map_or_else(|| Ok(Self::default()), Self::parse)
    }

    fn insert(&mut self, field: &str, path: &str) {
        if let Some(previous) = self.to_document.insert(field.to_string(), path.to_string()) {
            tracing::warn!(field, previous = %previous, path, "alias redefined, last entry wins");
            if self.to_tuple.get(&previous).map(String::as_str) == Some(field) {
                self.to_tuple.remove(&previous);
            }
        }
        if let Some(existing) = self.to_tuple.get(path) {
            tracing::warn!(path, existing = %existing, field, "document path aliased twice");
        } else {
            self.to_tuple.insert(path.to_string(), field.to_string());
        }
    }

    /// Document attribute path for a tuple field.
    pub fn to_document_path<'a>(&'a self, field: &'a str) -> &'a str {
        self.to_document.get(field).map_or(field, String::as_str)
    }

    /// Tuple field name for a document attribute path.
    pub fn to_tuple_field<'a>(&'a self, path: &'a str) -> &'a str {
        self.to_tuple.get(path).map_or(path, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.to_document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_document.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_trims() {
        let alias = FieldAlias::parse(" name : user.name ,age:user.age,, ").unwrap();
        assert_eq!(alias.len(), 2);
        assert_eq!(alias.to_document_path("name"), "user.name");
        assert_eq!(alias.to_document_path("age"), "user.age");
    }

    #[test]
    fn unmapped_names_are_identity() {
        let alias = FieldAlias::parse("name:user.name").unwrap();
        assert_eq!(alias.to_document_path("city"), "city");
        assert_eq!(alias.to_tuple_field("address.city"), "address.city");
    }

    #[test]
    fn reverse_lookup() {
        let alias = FieldAlias::parse("name:user.name").unwrap();
        assert_eq!(alias.to_tuple_field("user.name"), "name");
    }

    #[test]
    fn malformed_entry_is_config_error() {
        let err = FieldAlias::parse("name:user.name,broken").unwrap_err();
        assert!(err.is_fatal_config());
        assert_eq!(err.code, "INVALID_ALIAS");
        assert!(FieldAlias::parse("name:").is_err());
        assert!(FieldAlias::parse(":path").is_err());
    }

    #[test]
    fn duplicate_path_keeps_first_reverse_mapping() {
        let alias = FieldAlias::parse("a:doc.x,b:doc.x").unwrap();
        assert_eq!(alias.to_document_path("a"), "doc.x");
        assert_eq!(alias.to_document_path("b"), "doc.x");
        assert_eq!(alias.to_tuple_field("doc.x"), "a");
    }

    #[test]
    fn redefined_field_drops_stale_reverse_entry() {
        let alias = FieldAlias::parse("a:old.path,a:new.path").unwrap();
        assert_eq!(alias.to_document_path("a"), "new.path");
        assert_eq!(alias.to_tuple_field("new.path"), "a");
        assert_eq!(alias.to_tuple_field("old.path"), "old.path");
    }

    #[test]
    fn from_settings_without_table_is_empty() {
        assert!(FieldAlias::from_settings(&Settings::new()).unwrap().is_empty());
        let settings = Settings::new().with(keys::MAPPING_NAMES, "n:user.name");
        assert_eq!(
            FieldAlias::from_settings(&settings).unwrap().to_document_path("n"),
            "user.name"
        );
    }

    #[test]
    fn table_survives_serialization() {
        let alias = FieldAlias::parse("name:user.name").unwrap();
        let json = serde_json::to_string(&alias).unwrap();
        let back: FieldAlias = serde_json::from_str(&json).unwrap();
        assert_eq!(alias, back);
    }
}

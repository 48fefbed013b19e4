//! Attribute lookup inside documents.

use docbridge_types::{Document, FormatMode, Value};

/// Walk a dotted `path` through nested maps.
///
/// Returns `None` at the first absent key or the first intermediate value that
/// is not a map. Never fails.
pub fn extract<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = document.get(first)?;
    for segment in segments {
        current = match current {
            Value::Map(map) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Look up an alias-resolved attribute according to the store format.
///
/// `Current` documents nest attributes, so the path is walked; `Legacy`
/// documents keep the whole dotted path as one top-level key.
pub fn lookup<'a>(document: &'a Document, path: &str, mode: FormatMode) -> Option<&'a Value> {
    match mode {
        FormatMode::Current => extract(document, path),
        FormatMode::Legacy => document.get(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Document {
        Document::from_json(json).unwrap()
    }

    #[test]
    fn walks_nested_maps() {
        let d = doc(json!({"user": {"name": "ana", "age": 30}}));
        assert_eq!(extract(&d, "user.name"), Some(&Value::from("ana")));
        assert_eq!(extract(&d, "user.age"), Some(&Value::Long(30)));
    }

    #[test]
    fn single_segment_is_top_level() {
        let d = doc(json!({"a": 1}));
        assert_eq!(extract(&d, "a"), Some(&Value::Long(1)));
    }

    #[test]
    fn missing_intermediate_yields_none() {
        let d = doc(json!({"user": {"name": "ana"}}));
        assert_eq!(extract(&d, "account.id"), None);
        assert_eq!(extract(&d, "user.address.city"), None);
    }

    #[test]
    fn non_map_intermediate_yields_none() {
        let d = doc(json!({"user": "ana", "tags": ["x"]}));
        assert_eq!(extract(&d, "user.name"), None);
        assert_eq!(extract(&d, "tags.0"), None);
    }

    #[test]
    fn explicit_null_is_returned() {
        let d = doc(json!({"user": {"name": null}}));
        assert_eq!(extract(&d, "user.name"), Some(&Value::Null));
    }

    #[test]
    fn returns_whole_subtree() {
        let d = doc(json!({"user": {"name": "ana"}}));
        let user = extract(&d, "user").and_then(Value::as_map).unwrap();
        assert_eq!(user.len(), 1);
    }

    #[test]
    fn legacy_uses_flat_key() {
        let d = doc(json!({"user.name": "ana", "user": {"name": "nested"}}));
        assert_eq!(
            lookup(&d, "user.name", FormatMode::Legacy),
            Some(&Value::from("ana"))
        );
        assert_eq!(
            lookup(&d, "user.name", FormatMode::Current),
            Some(&Value::from("nested"))
        );
    }

    #[test]
    fn legacy_does_not_traverse() {
        let d = doc(json!({"user": {"name": "ana"}}));
        assert_eq!(lookup(&d, "user.name", FormatMode::Legacy), None);
    }
}

//! Pipeline tuple container.
//!
//! A [`Tuple`] either has a declared schema (named, optionally typed slots) or
//! an undeclared one (plain positional values). Coercion of incoming values into
//! typed slots happens here, not in the code that fills the tuple.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::value::Value;

/// Declared type of a tuple slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Accept any value unchanged.
    #[default]
    Any,
    Bool,
    Long,
    Double,
    Text,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Long => "long",
            Self::Double => "double",
            Self::Text => "text",
        };
        f.write_str(s)
    }
}

impl FromStr for FieldType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any" | "" => Ok(Self::Any),
            "bool" | "boolean" => Ok(Self::Bool),
            "long" | "int" | "integer" => Ok(Self::Long),
            "double" | "float" => Ok(Self::Double),
            "text" | "string" => Ok(Self::Text),
            other => Err(BridgeError::schema(
                "UNKNOWN_FIELD_TYPE",
                format!("unknown field type '{other}'"),
            )),
        }
    }
}

impl FieldType {
    /// Convert `value` so it fits a slot of this type. Null always fits.
    pub fn coerce(self, value: Value) -> Result<Value, BridgeError> {
        match (self, value) {
            (Self::Any, v) | (_, v @ Value::Null) => Ok(v),

            (Self::Bool, v @ Value::Bool(_)) => Ok(v),
            (Self::Bool, Value::Long(n)) => Ok(Value::Bool(n != 0)),
            (Self::Bool, Value::Text(s)) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(coercion_error(self, &Value::Text(s))),
            },

            (Self::Long, v @ Value::Long(_)) => Ok(v),
            (Self::Long, Value::Bool(b)) => Ok(Value::Long(i64::from(b))),
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            (Self::Long, Value::Double(d))
                if d.fract() == 0.0 && d >= i64::MIN as f64 && d <= i64::MAX as f64 =>
            {
                Ok(Value::Long(d as i64))
            }
            (Self::Long, Value::Text(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Ok(Value::Long(n)),
                Err(_) => Err(coercion_error(self, &Value::Text(s))),
            },

            (Self::Double, v @ Value::Double(_)) => Ok(v),
            #[allow(clippy::cast_precision_loss)]
            (Self::Double, Value::Long(n)) => Ok(Value::Double(n as f64)),
            (Self::Double, Value::Text(s)) => match s.trim().parse::<f64>() {
                Ok(n) => Ok(Value::Double(n)),
                Err(_) => Err(coercion_error(self, &Value::Text(s))),
            },

            (Self::Text, v @ Value::Text(_)) => Ok(v),
            (Self::Text, v) => Ok(Value::Text(v.to_string())),

            (_, other) => Err(coercion_error(self, &other)),
        }
    }
}

fn coercion_error(ty: FieldType, value: &Value) -> BridgeError {
    BridgeError::data(
        "COERCION_FAILED",
        format!("cannot coerce {} value '{value}' into {ty}", value.kind()),
    )
}

/// A named tuple slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub ty: FieldType,
}

impl Field {
    /// Untyped field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: FieldType::Any,
        }
    }

    pub fn typed(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Schema of a tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fields {
    /// No fixed schema; values are positional and never coerced.
    #[default]
    Undeclared,
    Declared(Vec<Field>),
}

impl Fields {
    /// Declared, untyped fields from a list of names.
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Declared(names.into_iter().map(Field::new).collect())
    }

    /// Parse `name[:type]` entries separated by commas, e.g. `"name, age:long"`.
    ///
    /// An empty or blank list yields [`Fields::Undeclared`].
    pub fn parse(spec: &str) -> Result<Self, BridgeError> {
        let mut fields = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let field = match entry.split_once(':') {
                Some((name, ty)) => Field::typed(name.trim(), ty.parse()?),
                None => Field::new(entry),
            };
            if field.name.is_empty() {
                return Err(BridgeError::schema(
                    "EMPTY_FIELD_NAME",
                    format!("field entry '{entry}' has no name"),
                ));
            }
            fields.push(field);
        }
        if fields.is_empty() {
            Ok(Self::Undeclared)
        } else {
            Ok(Self::Declared(fields))
        }
    }

    pub fn is_declared(&self) -> bool {
        matches!(self, Self::Declared(_))
    }

    /// Declared fields, empty when undeclared.
    pub fn as_slice(&self) -> &[Field] {
        match self {
            Self::Declared(fields) => fields,
            Self::Undeclared => &[],
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.as_slice().iter().position(|f| f.name == name)
    }
}

/// Ordered record flowing through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
    fields: Fields,
    values: Vec<Value>,
}

impl Tuple {
    /// Tuple with the given schema; declared slots start out null.
    pub fn new(fields: Fields) -> Self {
        let values = vec![Value::Null; fields.as_slice().len()];
        Self { fields, values }
    }

    pub fn undeclared() -> Self {
        Self::new(Fields::Undeclared)
    }

    /// Build a tuple and fill it positionally, coercing typed slots.
    ///
    /// # Errors
    ///
    /// Returns a schema error when a declared tuple receives the wrong number
    /// of values, or a data error when a value does not fit its slot.
    pub fn with_values(fields: Fields, values: Vec<Value>) -> Result<Self, BridgeError> {
        let mut tuple = Self::new(fields);
        tuple.replace_values(values)?;
        Ok(tuple)
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn is_declared(&self) -> bool {
        self.fields.is_declared()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a declared field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.position(name).and_then(|idx| self.values.get(idx))
    }

    /// Assign a declared field by name, coercing to its declared type.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unknown names and a data error when the
    /// value cannot be coerced.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), BridgeError> {
        let idx = self.fields.position(name).ok_or_else(|| {
            BridgeError::schema("UNKNOWN_FIELD", format!("tuple has no field '{name}'"))
        })?;
        self.set_at(idx, value)
    }

    /// Assign a declared slot by position, coercing to its declared type.
    ///
    /// # Errors
    ///
    /// Returns a schema error for out-of-range positions and a data error when
    /// the value cannot be coerced.
    pub fn set_at(&mut self, idx: usize, value: Value) -> Result<(), BridgeError> {
        let coerced = self.coerce_slot(idx, value)?;
        let slot = self.values.get_mut(idx).ok_or_else(|| out_of_range(idx))?;
        *slot = coerced;
        Ok(())
    }

    /// Replace every value positionally.
    ///
    /// Undeclared tuples take `values` as they are. Declared tuples keep their
    /// width and coerce each slot; on error the tuple is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns a schema error when a declared tuple receives the wrong number
    /// of values, or a data error when a value does not fit its slot.
    pub fn replace_values<I: IntoIterator<Item = Value>>(
        &mut self,
        values: I,
    ) -> Result<(), BridgeError> {
        let values: Vec<Value> = values.into_iter().collect();
        if !self.is_declared() {
            self.values = values;
            return Ok(());
        }
        let declared = self.fields.as_slice().len();
        if declared != values.len() {
            return Err(BridgeError::schema(
                "ARITY_MISMATCH",
                format!(
                    "tuple declares {declared} fields but got {} values",
                    values.len()
                ),
            ));
        }
        let coerced = values
            .into_iter()
            .enumerate()
            .map(|(idx, value)| self.coerce_slot(idx, value))
            .collect::<Result<Vec<_>, _>>()?;
        self.values = coerced;
        Ok(())
    }

    fn coerce_slot(&self, idx: usize, value: Value) -> Result<Value, BridgeError> {
        let field = self
            .fields
            .as_slice()
            .get(idx)
            .ok_or_else(|| out_of_range(idx))?;
        field.ty.coerce(value).map_err(|e| {
            let field_name = field.name.clone();
            BridgeError {
                message: format!("field '{field_name}': {}", e.message),
                ..e
            }
            .with_details(serde_json::json!({ "field": field_name }))
        })
    }

    /// Iterate `(field name, value)` pairs of a declared tuple.
    pub fn named_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .as_slice()
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }
}

fn out_of_range(idx: usize) -> BridgeError {
    BridgeError::schema(
        "FIELD_OUT_OF_RANGE",
        format!("slot {idx} is outside the declared schema"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_tuple_starts_null() {
        let t = Tuple::new(Fields::named(["name", "age"]));
        assert_eq!(t.values(), &[Value::Null, Value::Null]);
    }

    #[test]
    fn parse_field_spec_with_types() {
        let fields = Fields::parse("name, age:long , score:double").unwrap();
        assert_eq!(
            fields.as_slice(),
            &[
                Field::new("name"),
                Field::typed("age", FieldType::Long),
                Field::typed("score", FieldType::Double),
            ]
        );
    }

    #[test]
    fn blank_spec_is_undeclared() {
        assert_eq!(Fields::parse("  ").unwrap(), Fields::Undeclared);
    }

    #[test]
    fn unknown_type_is_schema_error() {
        let err = Fields::parse("age:decimal128").unwrap_err();
        assert_eq!(err.code, "UNKNOWN_FIELD_TYPE");
    }

    #[test]
    fn typed_slot_coerces_text_to_long() {
        let mut t = Tuple::new(Fields::Declared(vec![Field::typed("age", FieldType::Long)]));
        t.set("age", Value::from("30")).unwrap();
        assert_eq!(t.get("age"), Some(&Value::Long(30)));
    }

    #[test]
    fn typed_slot_accepts_null() {
        let mut t = Tuple::new(Fields::Declared(vec![Field::typed("age", FieldType::Long)]));
        t.set("age", Value::Null).unwrap();
        assert_eq!(t.get("age"), Some(&Value::Null));
    }

    #[test]
    fn failed_coercion_names_the_field() {
        let mut t = Tuple::new(Fields::Declared(vec![Field::typed("age", FieldType::Long)]));
        let err = t.set("age", Value::from("thirty")).unwrap_err();
        assert_eq!(err.code, "COERCION_FAILED");
        assert!(err.message.contains("age"), "got: {}", err.message);
    }

    #[test]
    fn map_cannot_become_long() {
        let err = FieldType::Long
            .coerce(Value::Map(crate::value::Document::new()))
            .unwrap_err();
        assert_eq!(err.code, "COERCION_FAILED");
    }

    #[test]
    fn text_slot_stringifies_scalars() {
        assert_eq!(
            FieldType::Text.coerce(Value::Long(5)).unwrap(),
            Value::Text("5".into())
        );
        assert_eq!(
            FieldType::Text.coerce(Value::Bool(true)).unwrap(),
            Value::Text("true".into())
        );
    }

    #[test]
    fn long_accepts_integral_double_only() {
        assert_eq!(FieldType::Long.coerce(Value::Double(4.0)).unwrap(), Value::Long(4));
        assert!(FieldType::Long.coerce(Value::Double(4.5)).is_err());
    }

    #[test]
    fn with_values_checks_arity() {
        let err = Tuple::with_values(Fields::named(["a"]), vec![]).unwrap_err();
        assert_eq!(err.code, "ARITY_MISMATCH");
    }

    #[test]
    fn set_unknown_field_fails() {
        let mut t = Tuple::new(Fields::named(["a"]));
        assert_eq!(t.set("b", Value::Null).unwrap_err().code, "UNKNOWN_FIELD");
    }

    #[test]
    fn replace_values_on_undeclared_takes_any_width() {
        let mut t = Tuple::undeclared();
        t.replace_values(vec![Value::Long(1)]).unwrap();
        t.replace_values(vec![Value::Long(2), Value::Long(3)]).unwrap();
        assert_eq!(t.values(), &[Value::Long(2), Value::Long(3)]);
    }

    #[test]
    fn declared_tuple_keeps_its_width() {
        let mut t = Tuple::new(Fields::named(["a", "b"]));
        let err = t.replace_values(vec![]).unwrap_err();
        assert_eq!(err.code, "ARITY_MISMATCH");
        assert_eq!(t.len(), 2);

        t.set_at(0, Value::Long(1)).unwrap();
        assert_eq!(t.values(), &[Value::Long(1), Value::Null]);
        assert_eq!(
            t.set_at(2, Value::Long(1)).unwrap_err().code,
            "FIELD_OUT_OF_RANGE"
        );
    }

    #[test]
    fn failed_replace_leaves_previous_values() {
        let fields = Fields::Declared(vec![
            Field::new("name"),
            Field::typed("age", FieldType::Long),
        ]);
        let mut t = Tuple::with_values(fields, vec![Value::from("ana"), Value::Long(30)]).unwrap();
        let err = t
            .replace_values(vec![Value::from("bo"), Value::from("old")])
            .unwrap_err();
        assert_eq!(err.code, "COERCION_FAILED");
        assert_eq!(t.values(), &[Value::from("ana"), Value::Long(30)]);
    }
}

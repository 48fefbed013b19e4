//! Shared docbridge data model.
//!
//! Documents, tuples, settings, stats snapshots and the structured error type
//! used by the adapter core and every repository implementation.

pub mod error;
pub mod settings;
pub mod stats;
pub mod tuple;
pub mod value;

pub use error::{BridgeError, ErrorCategory, Stage};
pub use settings::{FormatMode, Settings};
pub use stats::{Counter, StatsSnapshot};
pub use tuple::{Field, FieldType, Fields, Tuple};
pub use value::{Document, Value};

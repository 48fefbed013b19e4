//! Structured error model for adapter operations.
//!
//! [`BridgeError`] carries a category, a machine-readable code and the
//! lifecycle stage it surfaced in. Construct via category-specific factory
//! methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of an adapter error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or invalid settings, or a required resource is absent.
    Config,
    /// Failure raised by a repository or cursor (network, node, bulk).
    Transport,
    /// A value could not be stored in a tuple slot.
    Data,
    /// Tuple schema does not fit the requested operation.
    Schema,
    /// Adapter misuse or broken internal invariant.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Transport => "transport",
            Self::Data => "data",
            Self::Schema => "schema",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Lifecycle step during which an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Configure,
    Open,
    Read,
    Write,
    Close,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configure => "configure",
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
            Self::Close => "close",
        };
        f.write_str(s)
    }
}

/// Structured error from an adapter operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct BridgeError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl BridgeError {
    fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            stage: None,
            details: None,
        }
    }

    /// Configuration error. Always fatal to the task.
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, code, message)
    }

    /// Error raised by a repository or cursor collaborator.
    #[must_use]
    pub fn transport(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Transport, code, message)
    }

    /// Value conversion error for a single tuple slot.
    #[must_use]
    pub fn data(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Data, code, message)
    }

    /// Tuple schema error.
    #[must_use]
    pub fn schema(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Schema, code, message)
    }

    /// Internal adapter error.
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }

    /// Attach structured diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Record the lifecycle stage, keeping the first stage already attached.
    #[must_use]
    pub fn at_stage(mut self, stage: Stage) -> Self {
        self.stage.get_or_insert(stage);
        self
    }

    /// Whether this error must fail the task before any I/O happens.
    pub fn is_fatal_config(&self) -> bool {
        self.category == ErrorCategory::Config
    }
}

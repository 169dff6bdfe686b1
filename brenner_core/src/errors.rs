//! Error types for the Brenner Loop core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-labelled validation finding
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating a record
///
/// Errors block acceptance, warnings are advisory. Validators never fail
/// themselves; callers decide whether to escalate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(field, message));
    }

    pub fn warn(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(field, message));
    }

    /// True when no blocking errors were found
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|issue| issue.field == field)
    }

    pub fn has_warning_for(&self, field: &str) -> bool {
        self.warnings.iter().any(|issue| issue.field == field)
    }

    /// Escalate blocking errors into a `BrennerError::Validation`
    pub fn into_result(self, entity: &'static str) -> Result<Vec<ValidationIssue>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(BrennerError::Validation {
                entity,
                issues: self.errors,
            })
        }
    }
}

/// Main error type for the core
#[derive(Error, Debug)]
pub enum BrennerError {
    /// Record failed validation; carries every blocking issue
    #[error("Invalid {entity}: {}", format_issues(.issues))]
    Validation {
        entity: &'static str,
        issues: Vec<ValidationIssue>,
    },

    /// Malformed or ungeneratable identifier
    #[error("{0}")]
    InvalidId(String),

    /// Referenced record does not exist
    #[error("{0}")]
    NotFound(String),

    /// Record with this key already exists
    #[error("{0}")]
    AlreadyExists(String),

    /// Operation not allowed in the record's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, BrennerError>;

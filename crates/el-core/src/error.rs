//! Error types for the value model and the entry loader.

use thiserror::Error;

use crate::value::ValueKind;

/// Value model contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueKind,
        found: ValueKind,
    },
}

/// A raw log entry that cannot become a snapshot or event.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("Entry has no timestamp")]
    MissingTimestamp,

    #[error("Unparseable timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Event has no type")]
    MissingEventType,

    #[error(transparent)]
    Value(#[from] ValueError),
}

use thiserror::Error;

use crate::tags::Operation;
use crate::value::ValueKind;

pub type Result<T> = std::result::Result<T, FluctError>;

/// Errors raised while building or resolving a composite.
///
/// Every failed resolve leaves the composite dirty; the cached value is only
/// replaced after a combiner returns a well-typed result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FluctError {
    #[error("invalid construction: {message}")]
    InvalidConstruction { message: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("type mismatch: expected {expected}, combiner produced {}", .found.map_or("absent", ValueKind::as_str))]
    TypeMismatch {
        expected: ValueKind,
        found: Option<ValueKind>,
    },

    #[error("unsupported operand for {operation}: {found}")]
    UnsupportedType {
        operation: Operation,
        found: ValueKind,
    },

    #[error("{combiner} combiner expects {expected} source(s), found {found}")]
    Arity {
        combiner: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("{0}")]
    Other(String),
}

impl FluctError {
    #[must_use]
    pub fn construction(message: impl Into<String>) -> Self {
        Self::InvalidConstruction {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether this error came from resolving a halted composite.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}

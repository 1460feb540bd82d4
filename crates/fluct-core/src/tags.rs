#![forbid(unsafe_code)]

//! Tag names and operation codes consulted by the built-in combiners.
//!
//! Tags are free-form metadata on a [`Source`](crate::Source). The engine
//! never requires any tag; combiners look up the names below by convention.

use std::fmt;

use crate::value::Value;

/// Tag holding the [`Operation`] a source applies during ordered merges.
pub const OPERATION: &str = "Operation";

/// Tag holding the field name used by [`Operation::SetKey`].
pub const KEY: &str = "Key";

/// Operation applied by a source when folded into an ordered merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Replace the accumulator with the source value.
    Set,
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Append the source value to a table accumulator.
    Insert,
    /// Remove the first structurally equal item from a table accumulator.
    Remove,
    /// Assign `accumulator[Key] = value` on a table accumulator.
    SetKey,
}

impl Operation {
    pub const ALL: [Self; 8] = [
        Self::Set,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Insert,
        Self::Remove,
        Self::SetKey,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Set => "Set",
            Self::Add => "Add",
            Self::Subtract => "Subtract",
            Self::Multiply => "Multiply",
            Self::Divide => "Divide",
            Self::Insert => "Insert",
            Self::Remove => "Remove",
            Self::SetKey => "SetKey",
        }
    }

    /// Parse an operation name. Names are case-sensitive.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }

    /// Read an operation out of a tag value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().and_then(Self::parse)
    }

    /// Apply an arithmetic operation. Returns `None` for non-arithmetic ops.
    #[must_use]
    pub fn apply_numeric(self, lhs: f64, rhs: f64) -> Option<f64> {
        match self {
            Self::Add => Some(lhs + rhs),
            Self::Subtract => Some(lhs - rhs),
            Self::Multiply => Some(lhs * rhs),
            Self::Divide => Some(lhs / rhs),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Operation> for Value {
    fn from(op: Operation) -> Self {
        Value::text(op.as_str())
    }
}

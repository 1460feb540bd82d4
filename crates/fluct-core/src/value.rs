#![forbid(unsafe_code)]

//! Dynamic values contributed by sources and produced by combiners.
//!
//! A [`Value`] is one of a small closed set of kinds. Composites compare the
//! [`ValueKind`] of every resolved value against the kind of their default,
//! so the kind is the unit of type checking for the whole engine.
//!
//! # Equality
//!
//! Two notions of equality coexist:
//!
//! - [`Value::same`] is the shallow check used for change suppression.
//!   Primitives compare by value; tables compare by `Rc` identity, so
//!   re-submitting a freshly built but equal table counts as a change.
//!   NaN is `same` as NaN, so a composite stuck at NaN stays quiet.
//! - `PartialEq` is structural and is only used where an algorithm needs it
//!   (for example removing a matching element from a table).
//!
//! The "absent" marker is never a `Value`; APIs that may have no value
//! return `Option<Value>`.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// The kind of a [`Value`], used for resolve-time type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Number,
    String,
    Table,
}

impl ValueKind {
    /// Lower-case name used in error messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Table => "table",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value held by a source or a composite.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    Table(Rc<Table>),
}

impl Value {
    /// Build a text value.
    #[must_use]
    pub fn text(s: impl AsRef<str>) -> Self {
        Self::Text(Rc::from(s.as_ref()))
    }

    /// The kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Boolean,
            Self::Number(_) => ValueKind::Number,
            Self::Text(_) => ValueKind::String,
            Self::Table(_) => ValueKind::Table,
        }
    }

    /// Shallow equality used to decide whether an update is a change.
    ///
    /// Tables are compared by identity, everything else by value. Any two
    /// NaNs are the same.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Table(a), Self::Table(b)) => Rc::ptr_eq(a, b),
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// Truthiness for boolean aggregation: only `Bool(false)` is false.
    #[must_use]
    pub const fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            _ => true,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(Rc::from(value))
    }
}

impl From<Table> for Value {
    fn from(value: Table) -> Self {
        Self::Table(Rc::new(value))
    }
}

impl From<Rc<Table>> for Value {
    fn from(value: Rc<Table>) -> Self {
        Self::Table(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Table(t) => write!(f, "table({} items, {} fields)", t.len(), t.fields.len()),
        }
    }
}

/// Structured value: an ordered item list plus string-keyed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    items: Vec<Value>,
    fields: BTreeMap<String, Value>,
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from list items.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            items: items.into_iter().collect(),
            fields: BTreeMap::new(),
        }
    }

    /// Set a field, consuming and returning the table.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Number of list items (fields are not counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.fields.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    /// Remove the first item structurally equal to `value`.
    ///
    /// Returns whether an item was removed.
    pub fn remove_first(&mut self, value: &Value) -> bool {
        match self.items.iter().position(|item| item == value) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }
}

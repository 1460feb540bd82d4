//! Ordered arithmetic merge.
//!
//! Starts from the composite default and folds sources from lowest to
//! highest priority. `Set` replaces the accumulator; the four arithmetic
//! operations require both sides to be numbers. Sources without a
//! recognised arithmetic operation tag contribute nothing.

use crate::composite::Composite;
use crate::error::{FluctError, Result};
use crate::source::Source;
use crate::tags::Operation;
use crate::value::Value;

use super::sort_ascending;

pub(super) fn combine(composite: &Composite) -> Result<Option<Value>> {
    let mut sources = composite.sources();
    sort_ascending(&mut sources);
    fold(composite.default_value().clone(), &sources).map(Some)
}

fn fold(seed: Value, sources: &[Source]) -> Result<Value> {
    let mut acc = seed;
    for source in sources {
        let Some(op) = source.operation() else {
            tracing::trace!(message = "fluct.linear.skip", source = source.id());
            continue;
        };
        let value = source.read();
        acc = match op {
            Operation::Set => value,
            Operation::Add | Operation::Subtract | Operation::Multiply | Operation::Divide => {
                apply(op, &acc, &value)?
            }
            Operation::Insert | Operation::Remove | Operation::SetKey => {
                tracing::trace!(message = "fluct.linear.skip", source = source.id(), operation = %op);
                continue;
            }
        };
    }
    Ok(acc)
}

fn apply(op: Operation, acc: &Value, value: &Value) -> Result<Value> {
    let unsupported = |found: &Value| FluctError::UnsupportedType {
        operation: op,
        found: found.kind(),
    };
    let lhs = acc.as_number().ok_or_else(|| unsupported(acc))?;
    let rhs = value.as_number().ok_or_else(|| unsupported(value))?;
    op.apply_numeric(lhs, rhs)
        .map(Value::Number)
        .ok_or_else(|| unsupported(acc))
}

//! Structural merge over a table default ("LinearTable").
//!
//! Sources carrying a tag map are folded from lowest to highest priority:
//!
//! - `Set` replaces the accumulator with the source's table.
//! - `Insert` appends the source value to the item list.
//! - `Remove` drops the first item structurally equal to the source value.
//! - `SetKey` assigns `accumulator[Key] = value`; it needs a text `Key` tag.
//!
//! The accumulator is copied on first write, so neither the default nor any
//! source table is mutated.

use std::rc::Rc;

use crate::composite::Composite;
use crate::error::{FluctError, Result};
use crate::source::Source;
use crate::tags::{self, Operation};
use crate::value::{Table, Value, ValueKind};

use super::sort_ascending;

pub(super) fn combine(composite: &Composite) -> Result<Option<Value>> {
    let mut sources = composite.sources();
    sort_ascending(&mut sources);
    fold(composite.default_value(), &sources).map(|table| Some(Value::Table(table)))
}

fn fold(seed: &Value, sources: &[Source]) -> Result<Rc<Table>> {
    let Value::Table(seed) = seed else {
        return Err(FluctError::UnsupportedType {
            operation: Operation::Set,
            found: seed.kind(),
        });
    };
    let mut acc = Rc::clone(seed);
    for source in sources.iter().filter(|s| s.has_tags()) {
        let Some(op) = source.operation() else {
            continue;
        };
        match op {
            Operation::Set => match source.read() {
                Value::Table(table) => acc = table,
                other => {
                    return Err(FluctError::UnsupportedType {
                        operation: op,
                        found: other.kind(),
                    });
                }
            },
            Operation::Insert => Rc::make_mut(&mut acc).push(source.read()),
            Operation::Remove => {
                let value = source.read();
                if acc.items().contains(&value) {
                    Rc::make_mut(&mut acc).remove_first(&value);
                }
            }
            Operation::SetKey => match source.tag(tags::KEY) {
                Some(Value::Text(key)) => {
                    Rc::make_mut(&mut acc).set(&*key, source.read());
                }
                Some(other) => {
                    return Err(FluctError::UnsupportedType {
                        operation: op,
                        found: other.kind(),
                    });
                }
                None => {
                    tracing::trace!(message = "fluct.table.skip", source = source.id(), reason = "missing key");
                }
            },
            Operation::Add | Operation::Subtract | Operation::Multiply | Operation::Divide => {
                return Err(FluctError::UnsupportedType {
                    operation: op,
                    found: ValueKind::Table,
                });
            }
        }
    }
    Ok(acc)
}

use crate::error::{FluctError, Result};
use crate::source::Source;
use crate::value::Value;

/// The lone source's value; absent with no sources.
pub(super) fn combine(sources: &[Source]) -> Result<Option<Value>> {
    match sources {
        [] => Ok(None),
        [only] => Ok(Some(only.read())),
        _ => Err(FluctError::Arity {
            combiner: "Single",
            expected: "at most one",
            found: sources.len(),
        }),
    }
}

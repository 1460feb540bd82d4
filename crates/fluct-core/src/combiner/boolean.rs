//! Boolean aggregation combiners.
//!
//! Every source is read, even once the outcome is decided, so compute
//! functions observe the same call pattern regardless of source order.

use crate::source::Source;
use crate::value::Value;

pub(super) fn all_true(sources: &[Source]) -> Value {
    let all = sources
        .iter()
        .fold(true, |acc, source| source.read().is_truthy() && acc);
    Value::Bool(all)
}

pub(super) fn any_true(sources: &[Source]) -> Value {
    let any = sources
        .iter()
        .fold(false, |acc, source| source.read().is_truthy() || acc);
    Value::Bool(any)
}

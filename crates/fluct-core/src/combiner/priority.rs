//! Priority-selection combiners.

use crate::source::Source;
use crate::value::Value;

use super::{sort_ascending, sort_descending};

/// Value of the highest-priority source ("highest wins").
pub(super) fn first_set(mut sources: Vec<Source>) -> Option<Value> {
    sort_ascending(&mut sources);
    sources.last().map(Source::read)
}

/// Value of the lowest-priority source ("lowest wins").
pub(super) fn last_set(mut sources: Vec<Source>) -> Option<Value> {
    sort_descending(&mut sources);
    sources.last().map(Source::read)
}

#![forbid(unsafe_code)]

//! Merge strategies turning a composite's sources into one value.
//!
//! A [`Combiner`] is either one of the built-in strategies or a named
//! user-supplied function with the same shape. Every combiner starts from
//! [`Composite::sources`], a fresh snapshot it may reorder freely; the
//! composite's own ordering is never touched.
//!
//! | Combiner      | Order                      | Result                               |
//! |---------------|----------------------------|--------------------------------------|
//! | `Linear`      | ascending priority         | arithmetic fold over `Operation` tags |
//! | `AllTrue`     | none                       | AND of truthiness, seeded `true`     |
//! | `AnyTrue`     | none                       | OR of truthiness, seeded `false`     |
//! | `FirstSet`    | ascending priority         | value of the highest priority        |
//! | `LastSet`     | descending priority        | value of the lowest priority         |
//! | `Single`      | none                       | the lone source, arity-checked       |
//! | `Random`      | none                       | uniformly chosen source              |
//! | `LinearTable` | ascending priority         | structural fold over a table          |
//!
//! # Priority ordering
//!
//! A source without priority always has the weakest influence. It sorts
//! ahead of every prioritised source in both directions, so ordered merges
//! fold it first and neither `FirstSet` nor `LastSet` (which both take the
//! last element) picks it while a prioritised source exists. Sorts are
//! stable, so equal priorities keep attach order.

mod boolean;
mod linear;
mod priority;
mod random;
mod single;
mod table;

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::composite::Composite;
use crate::error::Result;
use crate::source::Source;
use crate::value::Value;

pub use random::RandomPick;

/// Output of a combiner: `None` is the absent value.
pub type CombineResult = Result<Option<Value>>;

type CombineFn = dyn Fn(&Composite) -> CombineResult;

/// A named user-supplied combiner.
#[derive(Clone)]
pub struct CustomCombiner {
    name: Rc<str>,
    combine: Rc<CombineFn>,
}

impl CustomCombiner {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Merge strategy of a composite, fixed at construction.
#[derive(Clone)]
pub enum Combiner {
    /// Ordered merge ("Linear"): arithmetic fold driven by `Operation` tags.
    Linear,
    AllTrue,
    AnyTrue,
    /// Highest priority wins.
    FirstSet,
    /// Lowest priority wins.
    LastSet,
    /// At most one source; more is an arity error.
    Single,
    Random(RandomPick),
    /// Structural merge ("LinearTable") over a table default.
    LinearTable,
    Custom(CustomCombiner),
}

impl Combiner {
    /// Random combiner backed by the thread RNG.
    #[must_use]
    pub fn random() -> Self {
        Self::Random(RandomPick::thread())
    }

    /// Random combiner with a reproducible seed.
    #[must_use]
    pub fn random_seeded(seed: u64) -> Self {
        Self::Random(RandomPick::seeded(seed))
    }

    /// Wrap a user-supplied merge function.
    pub fn custom(
        name: impl AsRef<str>,
        combine: impl Fn(&Composite) -> CombineResult + 'static,
    ) -> Self {
        Self::Custom(CustomCombiner {
            name: Rc::from(name.as_ref()),
            combine: Rc::new(combine),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Linear => "Linear",
            Self::AllTrue => "AllTrue",
            Self::AnyTrue => "AnyTrue",
            Self::FirstSet => "FirstSet",
            Self::LastSet => "LastSet",
            Self::Single => "Single",
            Self::Random(_) => "Random",
            Self::LinearTable => "LinearTable",
            Self::Custom(custom) => custom.name(),
        }
    }

    /// Run the merge over `composite`'s current sources.
    pub fn combine(&self, composite: &Composite) -> CombineResult {
        match self {
            Self::Linear => linear::combine(composite),
            Self::AllTrue => Ok(Some(boolean::all_true(&composite.sources()))),
            Self::AnyTrue => Ok(Some(boolean::any_true(&composite.sources()))),
            Self::FirstSet => Ok(priority::first_set(composite.sources())),
            Self::LastSet => Ok(priority::last_set(composite.sources())),
            Self::Single => single::combine(&composite.sources()),
            Self::Random(pick) => random::combine(pick, &composite.sources()),
            Self::LinearTable => table::combine(composite),
            Self::Custom(custom) => (custom.combine)(composite),
        }
    }
}

impl fmt::Debug for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(custom) => write!(f, "Custom({:?})", custom.name()),
            other => f.write_str(other.name()),
        }
    }
}

/// Absent priority is weaker than any number in ascending order.
fn cmp_ascending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    }
}

/// Stable sort, lowest priority first; unprioritised sources lead.
pub fn sort_ascending(sources: &mut [Source]) {
    sources.sort_by(|a, b| cmp_ascending(a.priority(), b.priority()));
}

/// Stable sort, highest priority first; unprioritised sources lead.
pub fn sort_descending(sources: &mut [Source]) {
    sources.sort_by(|a, b| match (a.priority(), b.priority()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => y.total_cmp(&x),
    });
}

//! Uniform random selection among attached sources.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{FluctError, Result};
use crate::source::Source;
use crate::value::Value;

/// Randomness used by [`Combiner::Random`](super::Combiner::Random).
///
/// Clones of a seeded pick share one generator.
#[derive(Clone)]
pub struct RandomPick {
    seeded: Option<Rc<RefCell<StdRng>>>,
}

impl RandomPick {
    /// Draw from the thread RNG.
    #[must_use]
    pub fn thread() -> Self {
        Self { seeded: None }
    }

    /// Draw from a generator seeded with `seed`.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Rc::new(RefCell::new(StdRng::seed_from_u64(seed)))),
        }
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn index(&self, len: usize) -> usize {
        match &self.seeded {
            Some(rng) => rng.borrow_mut().gen_range(0..len),
            None => rand::thread_rng().gen_range(0..len),
        }
    }
}

impl Default for RandomPick {
    fn default() -> Self {
        Self::thread()
    }
}

impl fmt::Debug for RandomPick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomPick")
            .field("seeded", &self.seeded.is_some())
            .finish()
    }
}

pub(super) fn combine(pick: &RandomPick, sources: &[Source]) -> Result<Option<Value>> {
    if sources.is_empty() {
        return Err(FluctError::Arity {
            combiner: "Random",
            expected: "at least one",
            found: 0,
        });
    }
    let chosen = &sources[pick.index(sources.len())];
    Ok(Some(chosen.read()))
}

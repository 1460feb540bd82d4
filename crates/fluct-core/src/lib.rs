#![forbid(unsafe_code)]

//! Lazy, event-driven resolution of values with many competing writers.
//!
//! - [`Source`]: an individually updatable contributor with optional
//!   priority and a tag map.
//! - [`Composite`]: owns a set of sources, a default, and a [`Combiner`];
//!   caches the merged value and recomputes it only when needed.
//! - [`Combiner`]: the merge policy, one of the built-ins or a named custom
//!   function.
//! - [`Notifier`] / [`Subscription`]: the synchronous event channel used by
//!   both sources and composites.
//!
//! # Architecture
//!
//! Everything is single-threaded and shares state through `Rc<RefCell<..>>`.
//! A source mutation fires the source's notifier; each owning composite
//! either resolves immediately or, when halted, marks itself dirty. A
//! composite fires its own notifier only when the resolved value actually
//! changes.
//!
//! # Example
//!
//! ```
//! use fluct_core::{Combiner, Composite, Operation, Source, Value};
//!
//! let speed = Composite::new(100, Combiner::Linear).unwrap();
//! let boots = Source::new(10).with_priority(4.0).with_operation(Operation::Add);
//! let haste = Source::new(1.5).with_priority(12.0).with_operation(Operation::Multiply);
//! speed.add_source(&boots).unwrap();
//! speed.add_source(&haste).unwrap();
//! assert_eq!(speed.read().unwrap(), Value::from(165));
//! ```

pub mod combiner;
pub mod composite;
pub mod error;
pub mod notifier;
pub mod source;
pub mod tags;
pub mod value;

pub use combiner::{CombineResult, Combiner, CustomCombiner, RandomPick};
pub use composite::{
    Composite, CompositeBuilder, Properties, resolve_failures_total, resolves_total,
};
pub use error::{FluctError, Result};
pub use notifier::{Notifier, Subscription};
pub use source::{Source, SourceEvent, SourceValue, Tags};
pub use tags::Operation;
pub use value::{Table, Value, ValueKind};

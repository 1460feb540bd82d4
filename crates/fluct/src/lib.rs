#![forbid(unsafe_code)]

//! Fluct public facade crate.
//!
//! Re-exports the resolution engine and, behind the `logging` feature, a
//! one-call tracing subscriber setup.

pub use fluct_core as core;

#[cfg(feature = "logging")]
pub mod logging;

pub mod prelude {
    pub use fluct_core::{
        Combiner, Composite, CompositeBuilder, FluctError, Notifier, Operation, Result, Source,
        SourceEvent, Subscription, Table, Value, ValueKind,
    };
    pub use fluct_core::tags::{KEY, OPERATION};

    #[cfg(feature = "logging")]
    pub use crate::logging::{LogFormat, LoggingConfig};
}

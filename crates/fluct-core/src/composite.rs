#![forbid(unsafe_code)]

//! Lazily resolved values merged from many sources.
//!
//! # Design
//!
//! [`Composite`] wraps a default value, a [`Combiner`], the attached sources,
//! and the cached result in shared, reference-counted storage. Each attached
//! source gets a subscription owned by the composite. When a source changes
//! the composite either resolves on the spot (active) or marks itself dirty
//! (halted). [`read`](Composite::read) recomputes only when dirty.
//!
//! # Invariants
//!
//! 1. While `dirty` is false, the cached value equals the combiner's output
//!    over the current sources.
//! 2. The cached value is replaced only after the combiner succeeds and its
//!    result has the default's [`ValueKind`].
//! 3. The change channel fires only when a resolve produces a value that is
//!    not [`same`](Value::same) as the previous one; never on construction.
//! 4. Each per-source subscription is released exactly once, on removal or
//!    on the source's `Disposed` event.
//! 5. `version` increments by 1 per successful resolve.
//!
//! # Failure Modes
//!
//! - **Combiner error**: the composite stays dirty and keeps its previous
//!   cached value; the error reaches the caller of `resolve`/`read`.
//! - **Error during an automatic resolve**: a resolve triggered by a source
//!   notification has no caller to return to. It is logged at `warn` and the
//!   composite stays dirty, so the next `read` reports it.
//! - **Re-entrant mutation**: a combiner that updates one of its own sources
//!   recurses without bound. Not guarded.

use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::combiner::Combiner;
use crate::error::{FluctError, Result};
use crate::notifier::{Notifier, Subscription};
use crate::source::{Source, SourceEvent};
use crate::value::{Value, ValueKind};

static NEXT_COMPOSITE_ID: AtomicU64 = AtomicU64::new(1);

fn next_composite_id() -> u64 {
    NEXT_COMPOSITE_ID.fetch_add(1, Ordering::Relaxed)
}

// ─── Metrics counters ────────────────────────────────────────────────────────

static RESOLVES_TOTAL: AtomicU64 = AtomicU64::new(0);
static RESOLVE_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Total successful resolves across all composites.
#[must_use]
pub fn resolves_total() -> u64 {
    RESOLVES_TOTAL.load(Ordering::Relaxed)
}

/// Total failed resolves across all composites (halted attempts included).
#[must_use]
pub fn resolve_failures_total() -> u64 {
    RESOLVE_FAILURES_TOTAL.load(Ordering::Relaxed)
}

/// Consumer bookkeeping attached to a composite.
pub type Properties = BTreeMap<String, Value>;

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Configuration for a [`Composite`].
#[derive(Debug, Default)]
pub struct CompositeBuilder {
    default: Option<Value>,
    combiner: Option<Combiner>,
    name: Option<String>,
    properties: Option<Properties>,
    halted: bool,
}

impl CompositeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed and type of every resolved value. Required.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Merge strategy. Required.
    #[must_use]
    pub fn combiner(mut self, combiner: Combiner) -> Self {
        self.combiner = Some(combiner);
        self
    }

    /// Name used in log events.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Properties::new)
            .insert(key.into(), value.into());
        self
    }

    /// Merge several properties at once.
    #[must_use]
    pub fn properties<K, V>(mut self, properties: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let map = self.properties.get_or_insert_with(Properties::new);
        for (key, value) in properties {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Start halted.
    #[must_use]
    pub fn halted(mut self, halted: bool) -> Self {
        self.halted = halted;
        self
    }

    /// Build the composite in the clean state with no sources.
    ///
    /// Fails with [`FluctError::InvalidConstruction`] when the default or
    /// the combiner is missing, or when `LinearTable` gets a non-table
    /// default.
    pub fn build(self) -> Result<Composite> {
        let default = self
            .default
            .ok_or_else(|| FluctError::construction("missing default value"))?;
        let combiner = self
            .combiner
            .ok_or_else(|| FluctError::construction("missing combiner"))?;
        if matches!(combiner, Combiner::LinearTable) && default.kind() != ValueKind::Table {
            return Err(FluctError::construction(format!(
                "LinearTable needs a table default, got {}",
                default.kind()
            )));
        }
        Ok(Composite {
            inner: Rc::new(CompositeInner {
                id: next_composite_id(),
                name: self.name,
                resolved: RefCell::new(default.clone()),
                default,
                combiner,
                entries: RefCell::new(Vec::new()),
                halted: Cell::new(self.halted),
                dirty: Cell::new(false),
                version: Cell::new(0),
                properties: RefCell::new(self.properties),
                changed: Notifier::new(),
            }),
        })
    }
}

// ─── Composite ───────────────────────────────────────────────────────────────

/// An attached source and the subscription the composite holds on it.
struct SourceEntry {
    source: Source,
    _subscription: Subscription,
}

struct CompositeInner {
    id: u64,
    name: Option<String>,
    default: Value,
    combiner: Combiner,
    /// Last resolved value; authoritative only while `dirty` is false.
    resolved: RefCell<Value>,
    entries: RefCell<Vec<SourceEntry>>,
    halted: Cell<bool>,
    dirty: Cell<bool>,
    version: Cell<u64>,
    properties: RefCell<Option<Properties>>,
    changed: Notifier<Value>,
}

/// A value resolved on demand from many [`Source`]s by a [`Combiner`].
///
/// Cloning a `Composite` creates a new handle to the **same** inner state.
pub struct Composite {
    inner: Rc<CompositeInner>,
}

impl Clone for Composite {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composite")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("combiner", &self.inner.combiner)
            .field("resolved", &*self.inner.resolved.borrow())
            .field("sources", &self.inner.entries.borrow().len())
            .field("halted", &self.inner.halted.get())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl Composite {
    /// Shorthand for a builder with a default and combiner.
    pub fn new(default: impl Into<Value>, combiner: Combiner) -> Result<Self> {
        CompositeBuilder::new()
            .default_value(default)
            .combiner(combiner)
            .build()
    }

    #[must_use]
    pub fn builder() -> CompositeBuilder {
        CompositeBuilder::new()
    }

    /// Attach `source` and resolve (or mark dirty when halted).
    ///
    /// The source stays attached even if the resolve fails; the error is
    /// returned and the composite is left dirty. A disposed source is never
    /// attached, but the resolve step still runs.
    pub fn add_source(&self, source: &Source) -> Result<&Self> {
        if source.is_disposed() {
            tracing::trace!(message = "fluct.attach_ignored", composite = self.inner.id, source = source.id());
            self.settle()?;
            return Ok(self);
        }
        let weak = Rc::downgrade(&self.inner);
        let source_id = source.id();
        let subscription = source
            .changed()
            .subscribe(move |event| Self::on_source_event(&weak, source_id, event));
        self.inner.entries.borrow_mut().push(SourceEntry {
            source: source.clone(),
            _subscription: subscription,
        });
        tracing::trace!(message = "fluct.attach", composite = self.inner.id, source = source_id);
        self.settle()?;
        Ok(self)
    }

    /// Detach the first entry for `source`, release its subscription, then
    /// resolve (or mark dirty when halted). Detaching an unknown source
    /// still runs the resolve step.
    pub fn remove_source(&self, source: &Source) -> Result<&Self> {
        self.detach(source.id());
        self.settle()?;
        Ok(self)
    }

    /// Recompute the cached value.
    ///
    /// Fails with [`FluctError::InvalidState`] while halted (marking the
    /// composite dirty), with [`FluctError::TypeMismatch`] when the combiner
    /// result's kind differs from the default's, or with whatever the
    /// combiner reports. On failure the cached value is left untouched and
    /// the composite stays dirty.
    pub fn resolve(&self) -> Result<&Self> {
        let inner = &self.inner;
        if inner.halted.get() {
            inner.dirty.set(true);
            RESOLVE_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed);
            return Err(FluctError::InvalidState(
                "cannot resolve a halted composite".into(),
            ));
        }

        let span = tracing::trace_span!(
            "fluct.resolve",
            composite = inner.id,
            combiner = inner.combiner.name(),
            sources = inner.entries.borrow().len()
        );
        let _guard = span.enter();

        inner.dirty.set(false);
        let value = match self.combine_checked() {
            Ok(value) => value,
            Err(err) => {
                inner.dirty.set(true);
                RESOLVE_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };

        inner.version.set(inner.version.get() + 1);
        RESOLVES_TOTAL.fetch_add(1, Ordering::Relaxed);

        let previous = inner.resolved.replace(value.clone());
        if !previous.same(&value) {
            tracing::debug!(
                message = "fluct.changed",
                composite = inner.id,
                name = inner.name.as_deref().unwrap_or(""),
                version = inner.version.get(),
                value = %value
            );
            inner.changed.fire(&value);
        }
        Ok(self)
    }

    /// Current value, resolving first if dirty and active.
    ///
    /// A halted composite returns its cached value without recomputing and
    /// without error.
    pub fn read(&self) -> Result<Value> {
        self.refresh()?;
        Ok(self.inner.resolved.borrow().clone())
    }

    /// Run `f` on the current value, resolving first if dirty and active.
    ///
    /// The value is a cheap handle clone, so `f` may update this
    /// composite's sources.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> Result<R> {
        let value = self.read()?;
        Ok(f(&value))
    }

    /// Freeze (`true`) or unfreeze (`false`) resolution.
    ///
    /// Unhalting does not resolve; the next `read`/`resolve` does.
    pub fn halt(&self, halted: bool) -> &Self {
        if self.inner.halted.replace(halted) != halted {
            tracing::debug!(message = "fluct.halt", composite = self.inner.id, halted);
        }
        self
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.inner.halted.get()
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Force the next `read` to recompute.
    pub fn invalidate(&self) {
        self.inner.dirty.set(true);
    }

    /// Number of successful resolves so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Merge `properties` into the property map key by key. Never resolves.
    pub fn set_properties<K, V>(&self, properties: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut slot = self.inner.properties.borrow_mut();
        let map = slot.get_or_insert_with(Properties::new);
        for (key, value) in properties {
            map.insert(key.into(), value.into());
        }
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<Value> {
        self.inner
            .properties
            .borrow()
            .as_ref()
            .and_then(|map| map.get(key).cloned())
    }

    /// Borrow the whole property map, if one was ever created.
    #[must_use]
    pub fn properties(&self) -> Ref<'_, Option<Properties>> {
        self.inner.properties.borrow()
    }

    /// Snapshot of the attached sources in attach order.
    ///
    /// Callers may reorder the returned list freely.
    #[must_use]
    pub fn sources(&self) -> Vec<Source> {
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|entry| entry.source.clone())
            .collect()
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    #[must_use]
    pub fn contains(&self, source: &Source) -> bool {
        self.inner
            .entries
            .borrow()
            .iter()
            .any(|entry| entry.source.ptr_eq(source))
    }

    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.inner.default
    }

    #[must_use]
    pub fn combiner(&self) -> &Combiner {
        &self.inner.combiner
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The change channel, fired with each new resolved value.
    #[must_use]
    pub fn changed(&self) -> &Notifier<Value> {
        &self.inner.changed
    }

    fn combine_checked(&self) -> Result<Value> {
        let expected = self.inner.default.kind();
        match self.inner.combiner.combine(self)? {
            Some(value) if value.kind() == expected => Ok(value),
            other => Err(FluctError::TypeMismatch {
                expected,
                found: other.as_ref().map(Value::kind),
            }),
        }
    }

    fn refresh(&self) -> Result<()> {
        if self.inner.dirty.get() && !self.inner.halted.get() {
            self.resolve()?;
        }
        Ok(())
    }

    /// Resolve now when active, otherwise just mark dirty.
    fn settle(&self) -> Result<()> {
        if self.inner.halted.get() {
            self.inner.dirty.set(true);
            return Ok(());
        }
        self.resolve().map(|_| ())
    }

    fn detach(&self, source_id: u64) {
        let removed = {
            let mut entries = self.inner.entries.borrow_mut();
            entries
                .iter()
                .position(|entry| entry.source.id() == source_id)
                .map(|index| entries.remove(index))
        };
        if removed.is_some() {
            tracing::trace!(message = "fluct.detach", composite = self.inner.id, source = source_id);
        }
        drop(removed);
    }

    fn on_source_event(weak: &Weak<CompositeInner>, source_id: u64, event: &SourceEvent) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let composite = Composite { inner };
        let outcome = match event {
            SourceEvent::Disposed => {
                composite.detach(source_id);
                composite.settle()
            }
            SourceEvent::Changed(_) => composite.settle(),
        };
        if let Err(err) = outcome {
            tracing::warn!(
                message = "fluct.resolve_failed",
                composite = composite.inner.id,
                source = source_id,
                error = %err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Operation;
    use crate::value::Table;
    use tracing_test::traced_test;

    fn change_log(composite: &Composite) -> (Rc<RefCell<Vec<Value>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let sub = composite
            .changed()
            .subscribe(move |v| sink.borrow_mut().push(v.clone()));
        (log, sub)
    }

    #[test]
    fn construction_starts_clean_with_default() {
        let composite = Composite::new(100, Combiner::FirstSet).unwrap();
        assert!(!composite.is_dirty());
        assert!(!composite.is_halted());
        assert_eq!(composite.read().unwrap(), Value::from(100));
        assert_eq!(composite.version(), 0);
        assert_eq!(composite.changed().fire_count(), 0);
    }

    #[test]
    fn builder_requires_default_and_combiner() {
        assert!(matches!(
            Composite::builder().combiner(Combiner::FirstSet).build(),
            Err(FluctError::InvalidConstruction { .. })
        ));
        assert!(matches!(
            Composite::builder().default_value(1).build(),
            Err(FluctError::InvalidConstruction { .. })
        ));
        assert!(matches!(
            Composite::new(1, Combiner::LinearTable),
            Err(FluctError::InvalidConstruction { .. })
        ));
        assert!(Composite::new(Table::new(), Combiner::LinearTable).is_ok());
    }

    #[test]
    fn builder_sets_name_properties_and_halt() {
        let composite = Composite::builder()
            .default_value(false)
            .combiner(Combiner::AnyTrue)
            .name("walk-speed")
            .property("owner", "player")
            .properties([("slot", 2), ("owner", 3)])
            .halted(true)
            .build()
            .unwrap();
        assert_eq!(composite.name(), Some("walk-speed"));
        assert_eq!(composite.property("owner"), Some(Value::from(3)));
        assert_eq!(composite.property("slot"), Some(Value::from(2)));
        assert!(composite.is_halted());
    }

    #[test]
    fn add_and_remove_resolve_immediately() {
        let composite = Composite::new(100, Combiner::FirstSet).unwrap();
        let a = Source::new(100).with_priority(1.0);
        let b = Source::new(150).with_priority(5.0);

        composite.add_source(&a).unwrap().add_source(&b).unwrap();
        assert!(!composite.is_dirty());
        assert_eq!(composite.read().unwrap(), Value::from(150));

        composite.remove_source(&b).unwrap();
        assert_eq!(composite.read().unwrap(), Value::from(100));
        assert!(!composite.contains(&b));
        assert_eq!(b.changed().subscriber_count(), 0);
    }

    #[test]
    fn source_update_resolves_active_composite() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        let source = Source::new(1).with_priority(1.0);
        composite.add_source(&source).unwrap();

        source.update(7);
        assert!(!composite.is_dirty());
        assert_eq!(composite.read().unwrap(), Value::from(7));
    }

    #[test]
    fn change_event_fires_only_on_effective_change() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        let low = Source::new(1).with_priority(1.0);
        let high = Source::new(9).with_priority(9.0);
        composite.add_source(&low).unwrap();
        let (log, _sub) = change_log(&composite);
        composite.add_source(&high).unwrap();

        low.update(2);
        low.update(3);
        assert_eq!(*log.borrow(), vec![Value::from(9)]);

        high.update(10);
        assert_eq!(*log.borrow(), vec![Value::from(9), Value::from(10)]);
    }

    #[test]
    fn read_is_idempotent() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        composite.add_source(&Source::new(4)).unwrap();
        let (log, _sub) = change_log(&composite);
        let version = composite.version();
        for _ in 0..5 {
            assert_eq!(composite.read().unwrap(), Value::from(4));
        }
        assert!(log.borrow().is_empty());
        assert_eq!(composite.version(), version);
    }

    #[test]
    fn halted_composite_defers_resolution() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        let source = Source::new(1).with_priority(1.0);
        composite.add_source(&source).unwrap();
        composite.halt(true);

        source.update(2);
        source.update(3);
        assert!(composite.is_dirty());
        assert_eq!(composite.read().unwrap(), Value::from(1));

        composite.halt(false);
        assert!(composite.is_dirty());
        assert_eq!(composite.read().unwrap(), Value::from(3));
        assert!(!composite.is_dirty());
    }

    #[test]
    fn resolve_while_halted_is_invalid_state() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        composite.halt(true);
        let err = composite.resolve().unwrap_err();
        assert!(err.is_invalid_state());
        assert!(composite.is_dirty());
    }

    #[test]
    fn type_mismatch_keeps_cache_and_stays_dirty() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        let source = Source::new(5).with_priority(1.0);
        composite.add_source(&source).unwrap();

        source.update("five");
        assert!(composite.is_dirty());
        assert_eq!(
            composite.read(),
            Err(FluctError::TypeMismatch {
                expected: ValueKind::Number,
                found: Some(ValueKind::String),
            })
        );
        assert!(composite.is_dirty());

        source.update(6);
        assert_eq!(composite.read().unwrap(), Value::from(6));
    }

    #[test]
    fn removing_last_source_of_first_set_reports_absent() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        let source = Source::new(5);
        composite.add_source(&source).unwrap();
        let err = composite.remove_source(&source).unwrap_err();
        assert_eq!(
            err,
            FluctError::TypeMismatch {
                expected: ValueKind::Number,
                found: None,
            }
        );
        assert_eq!(composite.source_count(), 0);
    }

    #[test]
    fn removing_unknown_source_still_resolves() {
        let composite = Composite::new(false, Combiner::AnyTrue).unwrap();
        composite.invalidate();
        composite.remove_source(&Source::new(true)).unwrap();
        assert!(!composite.is_dirty());
    }

    #[test]
    fn dispose_detaches_source() {
        let composite = Composite::new(false, Combiner::AnyTrue).unwrap();
        let source = Source::new(true);
        composite.add_source(&source).unwrap();
        assert_eq!(composite.read().unwrap(), Value::Bool(true));

        source.dispose();
        assert_eq!(composite.source_count(), 0);
        assert_eq!(composite.read().unwrap(), Value::Bool(false));
        assert_eq!(source.changed().subscriber_count(), 0);
    }

    #[test]
    fn disposed_source_is_not_attached() {
        let composite = Composite::new(false, Combiner::AnyTrue).unwrap();
        let source = Source::new(true);
        source.dispose();

        composite.add_source(&source).unwrap();
        assert!(!composite.contains(&source));
        assert_eq!(composite.source_count(), 0);
        assert_eq!(source.changed().subscriber_count(), 0);
        assert_eq!(composite.read().unwrap(), Value::Bool(false));
    }

    #[test]
    fn dispose_while_halted_detaches_and_marks_dirty() {
        let composite = Composite::new(false, Combiner::AnyTrue).unwrap();
        let source = Source::new(true);
        composite.add_source(&source).unwrap();
        composite.halt(true);

        source.dispose();
        assert_eq!(composite.source_count(), 0);
        assert!(composite.is_dirty());
        assert_eq!(composite.read().unwrap(), Value::Bool(true));
        composite.halt(false);
        assert_eq!(composite.read().unwrap(), Value::Bool(false));
    }

    #[test]
    fn shared_source_resolves_every_owner() {
        let speed = Composite::new(1, Combiner::Linear).unwrap();
        let boosted = Composite::new(false, Combiner::AnyTrue).unwrap();
        let source = Source::new(2).with_priority(1.0).with_operation(Operation::Multiply);
        speed.add_source(&source).unwrap();
        boosted.add_source(&source).unwrap();

        source.update(3);
        assert_eq!(speed.read().unwrap(), Value::from(3));
        assert_eq!(boosted.read().unwrap(), Value::Bool(true));

        boosted.remove_source(&source).unwrap();
        source.update(4);
        assert_eq!(speed.read().unwrap(), Value::from(4));
        assert!(!source.is_disposed());
    }

    #[test]
    fn sources_snapshot_keeps_canonical_order() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        let a = Source::new(1).with_priority(9.0);
        let b = Source::new(2).with_priority(1.0);
        composite.add_source(&a).unwrap().add_source(&b).unwrap();

        let mut snapshot = composite.sources();
        snapshot.reverse();
        let again = composite.sources();
        assert!(again[0].ptr_eq(&a));
        assert!(again[1].ptr_eq(&b));
    }

    #[test]
    fn set_properties_merges_without_resolving() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        assert!(composite.properties().is_none());
        composite.set_properties([("a", 1), ("b", 2)]);
        composite.set_properties([("b", 3)]);
        assert_eq!(composite.property("a"), Some(Value::from(1)));
        assert_eq!(composite.property("b"), Some(Value::from(3)));
        assert_eq!(composite.version(), 0);
    }

    #[test]
    fn custom_combiner_sees_composite() {
        let max = Combiner::custom("Max", |composite| {
            let best = composite
                .sources()
                .iter()
                .filter_map(|s| s.read().as_number())
                .fold(composite.default_value().as_number().unwrap_or(0.0), f64::max);
            Ok(Some(Value::Number(best)))
        });
        let composite = Composite::new(0, max).unwrap();
        composite.add_source(&Source::new(3)).unwrap();
        composite.add_source(&Source::new(8)).unwrap();
        composite.add_source(&Source::new(5)).unwrap();
        assert_eq!(composite.read().unwrap(), Value::from(8));
    }

    #[test]
    fn with_sees_resolved_value() {
        let composite = Composite::new(Table::new(), Combiner::LinearTable).unwrap();
        let source = Source::new("x").with_priority(1.0).with_operation(Operation::Insert);
        composite.add_source(&source).unwrap();
        let len = composite.with(|v| v.as_table().map_or(0, Table::len)).unwrap();
        assert_eq!(len, 1);
    }

    #[test]
    fn with_closure_may_update_own_source() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        let source = Source::new(1).with_priority(1.0);
        composite.add_source(&source).unwrap();

        let seen = composite.with(|v| {
            source.update(5);
            v.clone()
        });
        assert_eq!(seen.unwrap(), Value::from(1));
        assert_eq!(composite.read().unwrap(), Value::from(5));
    }

    #[test]
    fn nan_result_does_not_refire() {
        let composite = Composite::new(0, Combiner::Linear).unwrap();
        let divisor = Source::new(0).with_priority(1.0).with_operation(Operation::Divide);
        let idle = Source::new(1);
        composite.add_source(&divisor).unwrap();
        composite.add_source(&idle).unwrap();
        assert!(composite.read().unwrap().as_number().is_some_and(f64::is_nan));

        let (log, _sub) = change_log(&composite);
        idle.update(2);
        idle.update(3);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn dropping_composite_releases_subscriptions() {
        let source = Source::new(1);
        {
            let composite = Composite::new(0, Combiner::FirstSet).unwrap();
            composite.add_source(&source).unwrap();
            assert_eq!(source.changed().subscriber_count(), 1);
        }
        assert_eq!(source.changed().subscriber_count(), 0);
        source.update(2);
    }

    #[test]
    fn counters_are_monotonic() {
        let before = resolves_total();
        let failures = resolve_failures_total();
        let composite = Composite::new(0, Combiner::Single).unwrap();
        composite.add_source(&Source::new(1)).unwrap();
        let _ = composite.add_source(&Source::new(2));
        assert!(resolves_total() > before);
        assert!(resolve_failures_total() > failures);
    }

    #[traced_test]
    #[test]
    fn automatic_resolve_failure_is_logged() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        let source = Source::new(1);
        composite.add_source(&source).unwrap();
        source.update("oops");
        assert!(logs_contain("fluct.resolve_failed"));
        assert!(composite.read().is_err());
    }

    #[traced_test]
    #[test]
    fn change_and_halt_are_logged() {
        let composite = Composite::new(0, Combiner::FirstSet).unwrap();
        composite.add_source(&Source::new(4)).unwrap();
        composite.halt(true);
        assert!(logs_contain("fluct.changed"));
        assert!(logs_contain("fluct.halt"));
    }
}

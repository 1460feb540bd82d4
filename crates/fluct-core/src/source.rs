#![forbid(unsafe_code)]

//! Individually updatable contributors to a composite.
//!
//! # Design
//!
//! [`Source`] is a cheaply cloneable handle around shared, reference-counted
//! state. A source holds either a literal [`Value`] or a compute function
//! evaluated on every [`read`](Source::read). Every effective change is
//! announced on the source's [`Notifier<SourceEvent>`]; disposal is announced
//! through the same channel as [`SourceEvent::Disposed`], so owners detach
//! without a second subscription.
//!
//! # Invariants
//!
//! 1. `read()` never returns an absent value.
//! 2. `update()` notifies only when the stored value is not
//!    [`same`](Value::same) as the previous one.
//! 3. At most one external binding is live at a time.
//! 4. `Disposed` is fired at most once.
//!
//! # Failure Modes
//!
//! - **Re-entrant mutation**: a compute function or predicate that updates a
//!   source feeding the composite currently resolving will recurse. This is
//!   not guarded; callers must avoid such cycles.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::notifier::{Notifier, Subscription};
use crate::tags::{self, Operation};
use crate::value::{Table, Value};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_source_id() -> u64 {
    NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Tag map carried by a source.
pub type Tags = BTreeMap<String, Value>;

type ComputeFn = dyn Fn(&Source) -> Value;

/// What a source stores: a literal or a function computed at read time.
#[derive(Clone)]
pub enum SourceValue {
    Literal(Value),
    Computed(Rc<ComputeFn>),
}

impl SourceValue {
    /// Build a computed value.
    pub fn computed(f: impl Fn(&Source) -> Value + 'static) -> Self {
        Self::Computed(Rc::new(f))
    }

    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a.same(b),
            (Self::Computed(a), Self::Computed(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for SourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

macro_rules! literal_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for SourceValue {
                fn from(value: $ty) -> Self {
                    Self::Literal(value.into())
                }
            }
        )*
    };
}

literal_from!(Value, bool, f64, i32, &str, String, Table);

/// Payload of a source's change channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// The effective value changed to the carried value.
    Changed(Value),
    /// The source was disposed; owners must detach it.
    Disposed,
}

struct SourceInner {
    id: u64,
    value: RefCell<SourceValue>,
    priority: Cell<Option<f64>>,
    tags: RefCell<Option<Tags>>,
    changed: Notifier<SourceEvent>,
    binding: RefCell<Option<Subscription>>,
    disposed: Cell<bool>,
}

/// An individually updatable value holder.
///
/// Cloning a `Source` creates a new handle to the **same** source; identity
/// is preserved across clones.
#[derive(Clone)]
pub struct Source {
    inner: Rc<SourceInner>,
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("priority", &self.inner.priority.get())
            .field("tags", &*self.inner.tags.borrow())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

impl Source {
    /// Create a source with an initial value.
    pub fn new(initial: impl Into<SourceValue>) -> Self {
        Self {
            inner: Rc::new(SourceInner {
                id: next_source_id(),
                value: RefCell::new(initial.into()),
                priority: Cell::new(None),
                tags: RefCell::new(None),
                changed: Notifier::new(),
                binding: RefCell::new(None),
                disposed: Cell::new(false),
            }),
        }
    }

    /// Create a source whose value is computed on every read.
    pub fn computed(f: impl Fn(&Source) -> Value + 'static) -> Self {
        Self::new(SourceValue::computed(f))
    }

    /// Set the priority, consuming and returning the source.
    #[must_use]
    pub fn with_priority(self, priority: f64) -> Self {
        self.inner.priority.set(Some(priority));
        self
    }

    /// Add a tag, consuming and returning the source.
    #[must_use]
    pub fn with_tag(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_tag(name, value);
        self
    }

    /// Shorthand for tagging the [`Operation`].
    #[must_use]
    pub fn with_operation(self, op: Operation) -> Self {
        self.with_tag(tags::OPERATION, op)
    }

    /// Process-unique identity of this source.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether both handles refer to the same source.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn priority(&self) -> Option<f64> {
        self.inner.priority.get()
    }

    /// Change the priority. Does not notify; owners see it on their next
    /// resolve.
    pub fn set_priority(&self, priority: Option<f64>) {
        self.inner.priority.set(priority);
    }

    /// The change channel. Fires [`SourceEvent::Changed`] on effective
    /// changes and [`SourceEvent::Disposed`] once on disposal.
    #[must_use]
    pub fn changed(&self) -> &Notifier<SourceEvent> {
        &self.inner.changed
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Current effective value.
    ///
    /// Compute functions are invoked with this source on every call; nothing
    /// is cached.
    #[must_use]
    pub fn read(&self) -> Value {
        let stored = self.inner.value.borrow().clone();
        match stored {
            SourceValue::Literal(value) => value,
            SourceValue::Computed(compute) => compute(self),
        }
    }

    /// Replace the stored value, notifying if it changed.
    pub fn update(&self, value: impl Into<SourceValue>) {
        if self.is_disposed() {
            tracing::trace!(message = "fluct.source.update_ignored", source = self.inner.id);
            return;
        }
        let value = value.into();
        let changed = {
            let mut slot = self.inner.value.borrow_mut();
            let changed = !slot.same(&value);
            *slot = value;
            changed
        };
        if changed {
            let current = self.read();
            tracing::trace!(message = "fluct.source.changed", source = self.inner.id, value = %current);
            self.inner.changed.fire(&SourceEvent::Changed(current));
        }
    }

    /// Follow an external event: every firing updates this source with the
    /// payload.
    ///
    /// Replaces any previous binding.
    pub fn bind_to_event<P>(&self, event: &Notifier<P>)
    where
        P: Clone + Into<Value> + 'static,
    {
        self.bind_to_predicate(event, |payload: &P| Some(payload.clone().into()));
    }

    /// Follow an external event through `predicate`.
    ///
    /// Every firing calls `predicate` with the payload; `None` ignores the
    /// firing, `Some(value)` updates this source. Multi-value payloads are
    /// tuples for the predicate to destructure. Replaces any previous
    /// binding.
    pub fn bind_to_predicate<P, F>(&self, event: &Notifier<P>, predicate: F)
    where
        P: 'static,
        F: Fn(&P) -> Option<Value> + 'static,
    {
        self.unbind();
        let weak = Rc::downgrade(&self.inner);
        let subscription = event.subscribe(move |payload| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Some(value) = predicate(payload) {
                Source { inner }.update(value);
            }
        });
        *self.inner.binding.borrow_mut() = Some(subscription);
    }

    /// Release the external binding, if any.
    pub fn unbind(&self) {
        let previous = self.inner.binding.borrow_mut().take();
        drop(previous);
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.binding.borrow().is_some()
    }

    /// Look up a tag. Returns `None` when the source has no tag map.
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<Value> {
        self.inner
            .tags
            .borrow()
            .as_ref()
            .and_then(|tags| tags.get(name).cloned())
    }

    pub fn add_tag(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .tags
            .borrow_mut()
            .get_or_insert_with(Tags::new)
            .insert(name.into(), value.into());
    }

    pub fn remove_tag(&self, name: &str) -> Option<Value> {
        self.inner
            .tags
            .borrow_mut()
            .as_mut()
            .and_then(|tags| tags.remove(name))
    }

    /// Whether a tag map exists (possibly empty after removals).
    #[must_use]
    pub fn has_tags(&self) -> bool {
        self.inner.tags.borrow().is_some()
    }

    /// The parsed `Operation` tag, if present and recognised.
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        self.tag(tags::OPERATION)
            .as_ref()
            .and_then(Operation::from_value)
    }

    /// Announce disposal to every owner, then release the external binding.
    ///
    /// Disposing twice is a no-op.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        tracing::trace!(message = "fluct.source.disposed", source = self.inner.id);
        self.inner.changed.fire(&SourceEvent::Disposed);
        self.unbind();
    }
}

#![forbid(unsafe_code)]

//! Single-channel synchronous event emitter.
//!
//! # Design
//!
//! [`Notifier<P>`] stores its handlers as `Weak` references. The strong
//! reference lives in the [`Subscription`] returned by
//! [`subscribe`](Notifier::subscribe), so dropping the guard is all it takes
//! to unsubscribe. Dead entries are pruned lazily on the next fire or
//! subscribe.
//!
//! # Invariants
//!
//! 1. Handlers run in subscription order, each exactly once per fire.
//! 2. A handler whose subscription is released before its turn in the current
//!    fire is skipped.
//! 3. Handlers may subscribe, unsubscribe, or fire re-entrantly; the handler
//!    list is never borrowed while a handler runs.
//!
//! # Failure Modes
//!
//! - **Re-entrant fire loops**: a handler that fires the notifier it is
//!   subscribed to recurses without bound. Guarding against this is the
//!   caller's job.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Handler<P> = dyn Fn(&P);

struct NotifierInner<P> {
    handlers: Vec<Weak<Handler<P>>>,
    fired: u64,
}

/// A cloneable handle to a single-threaded event channel.
///
/// Cloning a `Notifier` creates a new handle to the **same** channel.
pub struct Notifier<P> {
    inner: Rc<RefCell<NotifierInner<P>>>,
}

impl<P> Clone for Notifier<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: 'static> Default for Notifier<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for Notifier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Notifier")
            .field("subscribers", &inner.handlers.len())
            .field("fired", &inner.fired)
            .finish()
    }
}

impl<P: 'static> Notifier<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(NotifierInner {
                handlers: Vec::new(),
                fired: 0,
            })),
        }
    }

    /// Register `handler`; it stays registered while the returned guard lives.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, handler: impl Fn(&P) + 'static) -> Subscription {
        let strong: Rc<Handler<P>> = Rc::new(handler);
        {
            let mut inner = self.inner.borrow_mut();
            inner.handlers.retain(|weak| weak.strong_count() > 0);
            inner.handlers.push(Rc::downgrade(&strong));
        }
        Subscription {
            guard: Some(Box::new(strong)),
        }
    }

    /// Invoke every live handler with `payload`.
    pub fn fire(&self, payload: &P) {
        let snapshot = {
            let mut inner = self.inner.borrow_mut();
            inner.fired += 1;
            inner.handlers.retain(|weak| weak.strong_count() > 0);
            inner.handlers.clone()
        };
        for weak in snapshot {
            if let Some(handler) = weak.upgrade() {
                handler(payload);
            }
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .handlers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of times [`fire`](Self::fire) has been called.
    #[must_use]
    pub fn fire_count(&self) -> u64 {
        self.inner.borrow().fired
    }
}

/// RAII guard for a registered handler.
///
/// Dropping the guard or calling [`unsubscribe`](Self::unsubscribe) removes
/// the handler. Because `unsubscribe` consumes the guard, a handle can be
/// released at most once.
pub struct Subscription {
    guard: Option<Box<dyn Any>>,
}

impl Subscription {
    /// Release the handler now.
    pub fn unsubscribe(mut self) {
        self.guard.take();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.guard.is_some())
            .finish()
    }
}

//! Event bus — publish/subscribe with replay of the last value.
//!
//! DESIGN
//! ======
//! Every engine owns its own bus, so two engines in one process never see
//! each other's transitions. The bus keeps exactly one buffered value: the
//! last one published. A new subscriber receives it synchronously before
//! `subscribe` returns, then every later publish in order.
//!
//! RE-ENTRANCY
//! ===========
//! `publish` copies the observer list while holding the lock and invokes the
//! copies after releasing it. An observer may therefore publish, subscribe,
//! or drop its own subscription from inside its callback without corrupting
//! the list. Observers added during a delivery only see later publishes.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::lock;

/// Callback registered on an [`EventBus`].
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Handle returned by every subscribe-style call in this crate.
///
/// Dropping the handle unsubscribes. Call [`Subscription::detach`] to keep
/// the registration alive for the lifetime of the source instead.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap a cancellation closure. It runs at most once.
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    /// A handle with nothing to cancel.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Remove the registration now.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the registration alive without holding the handle.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// =============================================================================
// EVENT BUS
// =============================================================================

struct BusInner<T> {
    next_id: u64,
    /// Observers in subscription order.
    observers: Vec<(u64, Observer<T>)>,
    last: Option<T>,
}

/// Publish/subscribe primitive with replay-last semantics.
pub struct EventBus<T> {
    inner: Arc<Mutex<BusInner<T>>>,
}

impl<T> EventBus<T>
where
    T: Clone + Send + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(BusInner { next_id: 0, observers: Vec::new(), last: None })) }
    }

    /// Store `value` as the last value and deliver it to every current
    /// subscriber in subscription order.
    pub fn publish(&self, value: T) {
        let observers: Vec<Observer<T>> = {
            let mut inner = lock(&self.inner);
            inner.last = Some(value.clone());
            inner
                .observers
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect()
        };
        for observer in observers {
            observer(&value);
        }
    }

    /// Subscribe with replay of the last published value.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_with(observer, true)
    }

    /// Subscribe, replaying the last value first when `replay_last` is set
    /// and something has been published.
    pub fn subscribe_with<F>(&self, observer: F, replay_last: bool) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let observer: Observer<T> = Arc::new(observer);
        let (id, replay) = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.observers.push((id, Arc::clone(&observer)));
            let replay = if replay_last { inner.last.clone() } else { None };
            (id, replay)
        };

        if let Some(value) = replay {
            observer(&value);
        }

        let weak: Weak<Mutex<BusInner<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).observers.retain(|(oid, _)| *oid != id);
            }
        })
    }

    /// The last published value, if any.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        lock(&self.inner).last.clone()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).observers.len()
    }
}

impl<T> Default for EventBus<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_test.rs"]
mod tests;

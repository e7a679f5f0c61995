//! Push notifications with scoped subscriptions.
//!
//! A [`Publisher`] keeps an ordered list of callbacks. Subscribing hands back a
//! [`Subscription`] token; the callback stays registered exactly as long as
//! the token is alive (or until [`Subscription::cancel`] is called). The
//! publisher never holds a subscriber alive on its own.
//!
//! Publishing takes a snapshot of the callback list and invokes it with no
//! lock held, so a callback may cancel its own subscription (or subscribe new
//! ones) while it runs.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Shared callback type used by all publishers
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    callback: Callback<T>,
}

struct Registry<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Registry<T> {
    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking subscriber must not take the whole publisher down with it
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Ordered fan-out of values to registered callbacks
pub struct Publisher<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T: 'static> Publisher<T> {
    pub fn new() -> Self {
        Publisher {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                entries: Vec::new(),
            })),
        }
    }

    /// Register a callback. It is removed when the returned token is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(callback))
    }

    /// Register an already shared callback
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_arc(&self, callback: Callback<T>) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push(Entry { id, callback });

        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    lock(&registry).remove(id);
                }
            })),
        }
    }

    /// Deliver `value` to every current subscriber, in subscription order.
    pub fn publish(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = lock(&self.registry)
            .entries
            .iter()
            .map(|e| e.callback.clone())
            .collect();

        for callback in callbacks {
            callback(value);
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).entries.len()
    }
}

impl<T: 'static> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = lock(&self.registry).entries.len();
        write!(f, "Publisher {{ subscribers: {} }}", count)
    }
}

/// Token for a registered callback.
///
/// Cancelling is idempotent and safe from inside the callback itself.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unsubscribe now
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether this token still holds a registration
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription {{ active: {} }}", self.is_active())
    }
}

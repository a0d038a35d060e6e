//! Listener registries and the handles that release them.
//!
//! Registrations are never dropped implicitly: whoever owns a
//! [`Subscription`] must call [`Subscription::dispose`] when the
//! listening object goes away.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Release = Box<dyn FnOnce() + Send>;
type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;
type Entries<E> = Mutex<Vec<(u64, Callback<E>)>>;

/// Handle to a listener registration.
#[must_use = "a dropped subscription can no longer be released"]
pub struct Subscription {
    release: Option<Release>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release.
    pub fn empty() -> Self {
        Self { release: None }
    }

    /// Remove the listener this handle was issued for.
    pub fn dispose(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Owned group of subscriptions released together.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn dispose_all(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.dispose();
        }
    }
}

/// Registry of callbacks for events of type `E`.
///
/// Callbacks run on the emitting thread, outside the registry lock, so a
/// callback may register or release listeners itself.
pub struct Listeners<E> {
    entries: Arc<Entries<E>>,
    next_id: AtomicU64,
}

impl<E: 'static> Listeners<E> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        self.add_boxed(Arc::new(callback))
    }

    pub fn add_boxed(&self, callback: Callback<E>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, callback));

        let entries: Weak<Entries<E>> = Arc::downgrade(&self.entries);
        Subscription::new(move || {
            if let Some(entries) = entries.upgrade() {
                entries.lock().retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = self
            .entries
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in snapshot {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

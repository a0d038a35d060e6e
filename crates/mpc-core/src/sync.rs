//! Field synchronization between observable cells and a mutable source.
//!
//! [`FieldSynchronizer`] pulls values from getters into cells, and for
//! two-way bindings pushes local edits back through setters. Each binding
//! carries a syncing flag: while a pull writes the cell, the push listener
//! stays silent, and while a push runs the setter, pulls triggered by the
//! source's own change notification never loop back into another push.
//!
//! Pulls and pushes of one binding are serialized across threads, so a
//! refresh running off the UI loop cannot swallow a local edit.

use crate::property::Property;
use crate::subscription::SubscriptionSet;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

type Getter<S, T> = Box<dyn Fn(&S) -> T + Send + Sync>;
type Setter<S, T> = Box<dyn Fn(&S, T) + Send + Sync>;

trait Binding: Send + Sync {
    fn pull(&self);
}

struct CellBinding<S: ?Sized, T> {
    source: Arc<S>,
    cell: Property<T>,
    getter: Getter<S, T>,
    setter: Option<Setter<S, T>>,
    /// Held for a whole pull or push; re-entered by the source's own
    /// change notification on the same thread
    exclusive: ReentrantMutex<()>,
    /// Nesting depth of pulls and pushes on the thread holding `exclusive`
    syncing: AtomicUsize,
}

impl<S, T> CellBinding<S, T>
where
    S: ?Sized + Send + Sync,
    T: Clone + PartialEq + Send + 'static,
{
    fn push(&self, value: &T) {
        let Some(setter) = &self.setter else {
            return;
        };
        let _exclusive = self.exclusive.lock();
        if self.syncing.load(Ordering::Acquire) > 0 {
            return;
        }
        if (self.getter)(&self.source) == *value {
            return;
        }
        let _guard = SyncGuard::enter(&self.syncing);
        setter(&self.source, value.clone());
        // a pull from another thread may have overwritten the cell meanwhile
        self.cell.set((self.getter)(&self.source));
    }
}

impl<S, T> Binding for CellBinding<S, T>
where
    S: ?Sized + Send + Sync,
    T: Clone + PartialEq + Send + 'static,
{
    fn pull(&self) {
        let _exclusive = self.exclusive.lock();
        let value = (self.getter)(&self.source);
        let _guard = SyncGuard::enter(&self.syncing);
        self.cell.set(value);
    }
}

/// One level of syncing depth, released on drop so a panicking setter does
/// not leave the binding stuck.
struct SyncGuard<'a> {
    depth: &'a AtomicUsize,
}

impl<'a> SyncGuard<'a> {
    fn enter(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::AcqRel);
        Self { depth }
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Binds cells to getter/setter pairs on a shared source object.
pub struct FieldSynchronizer<S: ?Sized> {
    source: Arc<S>,
    bindings: Mutex<Vec<Arc<dyn Binding>>>,
    subscriptions: Mutex<SubscriptionSet>,
}

impl<S> FieldSynchronizer<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            bindings: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(SubscriptionSet::default()),
        }
    }

    /// Start a binding for `cell`. The cell is filled as soon as the
    /// binding is completed with [`Bind::to`] or [`Bind::two_way`].
    pub fn bind<T>(&self, cell: &Property<T>) -> Bind<'_, S, T>
    where
        T: Clone + PartialEq + Send + 'static,
    {
        Bind {
            synchronizer: self,
            cell: cell.clone(),
        }
    }

    /// Pull every bound cell from its getter.
    pub fn refresh(&self) {
        let bindings: Vec<Arc<dyn Binding>> = self.bindings.lock().clone();
        for binding in bindings {
            binding.pull();
        }
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.lock().len()
    }

    /// Release every push listener and forget all bindings.
    pub fn dispose(&self) {
        self.subscriptions.lock().dispose_all();
        self.bindings.lock().clear();
    }

    fn register<T>(&self, cell: Property<T>, getter: Getter<S, T>, setter: Option<Setter<S, T>>)
    where
        T: Clone + PartialEq + Send + 'static,
    {
        let two_way = setter.is_some();
        let binding = Arc::new(CellBinding {
            source: Arc::clone(&self.source),
            cell: cell.clone(),
            getter,
            setter,
            exclusive: ReentrantMutex::new(()),
            syncing: AtomicUsize::new(0),
        });

        binding.pull();

        if two_way {
            let weak: Weak<CellBinding<S, T>> = Arc::downgrade(&binding);
            let subscription = cell.add_listener(move |value| {
                if let Some(binding) = weak.upgrade() {
                    binding.push(value);
                }
            });
            self.subscriptions.lock().push(subscription);
        }

        self.bindings.lock().push(binding);
    }
}

/// Pending binding returned by [`FieldSynchronizer::bind`].
pub struct Bind<'a, S: ?Sized, T> {
    synchronizer: &'a FieldSynchronizer<S>,
    cell: Property<T>,
}

impl<S, T> Bind<'_, S, T>
where
    S: ?Sized + Send + Sync + 'static,
    T: Clone + PartialEq + Send + 'static,
{
    /// Read-only binding.
    pub fn to(self, getter: impl Fn(&S) -> T + Send + Sync + 'static) {
        self.synchronizer.register(self.cell, Box::new(getter), None);
    }

    /// Two-way binding: pulls through `getter`, pushes edits through `setter`.
    pub fn two_way(
        self,
        getter: impl Fn(&S) -> T + Send + Sync + 'static,
        setter: impl Fn(&S, T) + Send + Sync + 'static,
    ) {
        self.synchronizer
            .register(self.cell, Box::new(getter), Some(Box::new(setter)));
    }
}

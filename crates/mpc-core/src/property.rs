//! Observable value cells.
//!
//! A [`Property`] notifies its listeners only when the stored value actually
//! changes. A [`ListProperty`] reports additions and removals as batches.
//! Both are cheap to clone; clones share the same cell.

use crate::subscription::{Listeners, Subscription};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

struct PropertyInner<T> {
    value: Mutex<T>,
    listeners: Listeners<T>,
}

/// Single observable value.
pub struct Property<T> {
    inner: Arc<PropertyInner<T>>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Property<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                value: Mutex::new(value),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.lock().clone()
    }

    /// Store `value`, notifying listeners if it differs from the current one.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.lock();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.inner.listeners.emit(&value);
        true
    }

    pub fn add_listener(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.inner.listeners.add(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Whether both handles point at the same cell.
    pub fn same_cell(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Default for Property<T>
where
    T: Clone + PartialEq + Default + Send + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Property")
            .field(&*self.inner.value.lock())
            .finish()
    }
}

/// Batch change reported by a [`ListProperty`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange<T> {
    Added(Vec<T>),
    Removed(Vec<T>),
}

struct ListInner<T> {
    items: Mutex<Vec<T>>,
    listeners: Listeners<ListChange<T>>,
}

/// Observable ordered list.
pub struct ListProperty<T> {
    inner: Arc<ListInner<T>>,
}

impl<T> Clone for ListProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> ListProperty<T>
where
    T: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ListInner {
                items: Mutex::new(Vec::new()),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Snapshot of the current items.
    pub fn get(&self) -> Vec<T> {
        self.inner.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    pub fn push(&self, item: T) {
        self.extend(vec![item]);
    }

    pub fn extend(&self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        self.inner.items.lock().extend(items.iter().cloned());
        self.inner.listeners.emit(&ListChange::Added(items));
    }

    /// Swap the whole content: listeners see every old item removed, then
    /// every new item added.
    pub fn replace_all(&self, items: Vec<T>) {
        let removed = std::mem::replace(&mut *self.inner.items.lock(), items.clone());
        if !removed.is_empty() {
            self.inner.listeners.emit(&ListChange::Removed(removed));
        }
        if !items.is_empty() {
            self.inner.listeners.emit(&ListChange::Added(items));
        }
    }

    /// Remove every item matching `predicate`, returning what was removed.
    pub fn remove_if(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        let removed: Vec<T> = {
            let mut items = self.inner.items.lock();
            let (removed, kept): (Vec<T>, Vec<T>) = items.drain(..).partition(|item| predicate(item));
            *items = kept;
            removed
        };
        if !removed.is_empty() {
            self.inner.listeners.emit(&ListChange::Removed(removed.clone()));
        }
        removed
    }

    pub fn add_listener(
        &self,
        listener: impl Fn(&ListChange<T>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.listeners.add(listener)
    }
}

impl<T> Default for ListProperty<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ListProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.lock().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_notifies_only_on_change() {
        let cell = Property::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = cell.add_listener(move |v| sink.lock().push(*v));

        assert!(cell.set(2));
        assert!(!cell.set(2));
        assert!(cell.set(3));

        assert_eq!(*seen.lock(), vec![2, 3]);
    }

    #[test]
    fn test_listener_may_read_cell() {
        let cell = Property::new(String::from("a"));
        let reader = cell.clone();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        let _subscription = cell.add_listener(move |_| *sink.lock() = reader.get());

        cell.set("b".to_string());
        assert_eq!(*seen.lock(), "b");
    }

    #[test]
    fn test_replace_all_reports_removal_then_addition() {
        let list = ListProperty::new();
        list.extend(vec![1, 2]);

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        let _subscription = list.add_listener(move |change: &ListChange<i32>| {
            sink.lock().push(change.clone())
        });

        list.replace_all(vec![3]);

        assert_eq!(
            *changes.lock(),
            vec![ListChange::Removed(vec![1, 2]), ListChange::Added(vec![3])]
        );
        assert_eq!(list.get(), vec![3]);
    }

    #[test]
    fn test_remove_if_keeps_order() {
        let list = ListProperty::new();
        list.extend(vec![1, 2, 3, 4]);
        let removed = list.remove_if(|v| v % 2 == 0);
        assert_eq!(removed, vec![2, 4]);
        assert_eq!(list.get(), vec![1, 3]);
    }
}

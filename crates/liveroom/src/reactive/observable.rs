#![forbid(unsafe_code)]

//! A shared, version-tracked value wrapper with change notification.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use liveroom_core::Subscription;

type Callback<T> = Rc<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: T,
    version: u64,
    subscribers: Vec<(u64, Callback<T>)>,
    next_subscriber_id: u64,
}

/// A reactive cell holding one value.
///
/// Cloning an `Observable` creates a new handle to the **same** inner
/// state. Dependents register callbacks with [`subscribe`](Self::subscribe)
/// and are invoked, in registration order, every time a new value is
/// published.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create a cell seeded with `value`. Seeding does not notify.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version: 0,
                subscribers: Vec::new(),
                next_subscriber_id: 0,
            })),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure publishes into the same cell (re-entrant
    /// borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Publish `value` unconditionally, returning the previous value.
    pub fn replace(&self, value: T) -> T {
        let old = {
            let mut inner = self.inner.borrow_mut();
            inner.version += 1;
            std::mem::replace(&mut inner.value, value)
        };
        self.notify();
        old
    }

    /// Mutate the value in place and publish.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut inner = self.inner.borrow_mut();
            f(&mut inner.value);
            inner.version += 1;
        }
        self.notify();
    }

    /// Publish `value` unless it equals the current value.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        if self.inner.borrow().value == value {
            return;
        }
        self.replace(value);
    }

    /// Register a change callback. The callback stays registered until
    /// the returned guard is released or dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_subscriber_id;
            inner.next_subscriber_id += 1;
            inner.subscribers.push((id, Rc::new(callback)));
            id
        };
        let weak: Weak<RefCell<ObservableInner<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().subscribers.retain(|(sid, _)| *sid != id);
            }
        })
    }

    /// Publication count: increments by exactly 1 per publication.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    fn notify(&self) {
        let (callbacks, value) = {
            let inner = self.inner.borrow();
            let callbacks: Vec<Callback<T>> =
                inner.subscribers.iter().map(|(_, cb)| Rc::clone(cb)).collect();
            (callbacks, inner.value.clone())
        };
        for callback in callbacks {
            callback(&value);
        }
    }
}

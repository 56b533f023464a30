#![forbid(unsafe_code)]

//! Registration-order listener registries backing the mock room's
//! topics.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. Removing a listener (including from inside a notification)
//!    affects the next notification, not the one in flight.
//! 3. A listener added with [`ListenerSet::add_once`] fires at most
//!    once and removes itself when it does.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use liveroom_core::Subscription;

type Callback<A> = Rc<dyn Fn(&A)>;

struct SetInner<A> {
    entries: Vec<(u64, Callback<A>)>,
    next_id: u64,
}

/// An ordered set of listeners for one topic.
pub struct ListenerSet<A> {
    inner: Rc<RefCell<SetInner<A>>>,
}

impl<A> Clone for ListenerSet<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: 'static> Default for ListenerSet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> ListenerSet<A> {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SetInner {
                entries: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// guard is released or dropped.
    pub fn add(&self, listener: impl Fn(&A) + 'static) -> Subscription {
        let id = self.insert(Rc::new(listener));
        self.removal_guard(id)
    }

    /// Register a listener that fires at most once and removes itself
    /// when it does.
    pub fn add_once(&self, listener: impl Fn(&A) + 'static) -> Subscription {
        let id = self.reserve_id();
        let weak = Rc::downgrade(&self.inner);
        let fired = Cell::new(false);
        let wrapped = move |payload: &A| {
            if fired.get() {
                return;
            }
            fired.set(true);
            remove_entry(&weak, id);
            listener(payload);
        };
        self.inner.borrow_mut().entries.push((id, Rc::new(wrapped)));
        self.removal_guard(id)
    }

    /// Invoke every registered listener, in registration order, with
    /// `payload`. The listener list is snapshotted first, so listeners
    /// may add or remove registrations freely.
    pub fn notify(&self, payload: &A) {
        let callbacks: Vec<Callback<A>> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(payload);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    fn reserve_id(&self) -> u64 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        id
    }

    fn insert(&self, callback: Callback<A>) -> u64 {
        let id = self.reserve_id();
        self.inner.borrow_mut().entries.push((id, callback));
        id
    }

    fn removal_guard(&self, id: u64) -> Subscription {
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || remove_entry(&weak, id))
    }
}

impl ListenerSet<()> {
    /// Notify listeners of a payload-free topic.
    pub fn emit(&self) {
        self.notify(&());
    }
}

fn remove_entry<A>(weak: &Weak<RefCell<SetInner<A>>>, id: u64) {
    if let Some(inner) = weak.upgrade() {
        inner.borrow_mut().entries.retain(|(eid, _)| *eid != id);
    }
}

#![forbid(unsafe_code)]

//! RAII registration guard returned by every subscribe operation.
//!
//! # Invariants
//!
//! 1. The underlying listener is removed at most once, no matter how
//!    many times [`Subscription::unsubscribe`] is called.
//! 2. Dropping the guard removes the listener (no reliance on garbage
//!    collection or finalization).
//! 3. [`Subscription::detach`] leaves the listener registered for the
//!    lifetime of its source.

/// Handle to one registered listener.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap a cancellation closure.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A guard that does nothing on release.
    #[must_use]
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Remove the listener. Safe to call from any teardown path;
    /// subsequent calls are no-ops.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Consume the guard without removing the listener, leaving it
    /// registered for the lifetime of its source.
    pub fn detach(mut self) {
        self.cancel = None;
    }

    /// Whether the listener is still registered through this guard.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn unsubscribe_runs_cancel_once() {
        let count = Rc::new(Cell::new(0u32));
        let count2 = Rc::clone(&count);
        let mut sub = Subscription::new(move || count2.set(count2.get() + 1));

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(count.get(), 1);
        assert!(!sub.is_active());
    }

    #[test]
    fn drop_runs_cancel() {
        let count = Rc::new(Cell::new(0u32));
        let count2 = Rc::clone(&count);
        drop(Subscription::new(move || count2.set(count2.get() + 1)));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn detach_skips_cancel() {
        let count = Rc::new(Cell::new(0u32));
        let count2 = Rc::clone(&count);
        Subscription::new(move || count2.set(count2.get() + 1)).detach();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn noop_is_inert() {
        let mut sub = Subscription::noop();
        assert!(!sub.is_active());
        sub.unsubscribe();
    }
}

#![forbid(unsafe_code)]

//! Reactive cells for the binding layer.
//!
//! - [`Observable`]: a shared, version-tracked value wrapper with
//!   change notification via subscriber callbacks.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. Subscribers are stored strongly in registration order and
//! removed through the [`Subscription`](liveroom_core::Subscription)
//! guard each `subscribe` call returns. Notification snapshots the
//! subscriber list and the value first, so callbacks may freely read
//! the cell or manage subscriptions while a notification is in flight.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per publication.
//! 2. Subscribers are notified in registration order.
//! 3. [`Observable::set`] with a value equal to the current one is a
//!    no-op (no version bump, no notifications); [`Observable::replace`]
//!    always publishes.
//! 4. Releasing a subscription removes the callback before the next
//!    notification cycle.

pub mod observable;

pub use observable::Observable;

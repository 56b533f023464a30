#![forbid(unsafe_code)]

//! The selector-subscription bridge.
//!
//! [`bind`] ties an externally-owned observable data source to a local
//! reactive cell through a pure selector and an equality check: on each
//! source notification the selector is re-run against the latest
//! snapshot, and the result is published only when the equality check
//! fails against the previously published value. Dependents therefore
//! recompute at most once per change-worthy notification, never per
//! elementary mutation.
//!
//! # Invariants
//!
//! 1. After any notification, the published value equals
//!    `selector(latest snapshot)` whenever the equality check failed,
//!    and is unchanged otherwise.
//! 2. The selector runs exactly once per notification and never on
//!    reads.
//! 3. A released binding receives no further publications, no matter
//!    how often the source keeps notifying; release is idempotent and
//!    safe from any teardown path.
//!
//! Selector and equality closures are not guarded: a panic inside one
//! propagates unchanged to whoever triggered the notification.

use std::cell::RefCell;
use std::rc::Rc;

use liveroom_core::{ConnectionId, LiveObject, Others, Result, Room, RoomError, Subscription};

use crate::reactive::Observable;

/// An externally-owned observable data source: a current snapshot plus
/// change notification.
pub trait WatchSource {
    /// The snapshot type handed to selectors.
    type Snapshot;

    /// Read the current authoritative snapshot.
    fn snapshot(&self) -> Self::Snapshot;

    /// Register a no-payload change listener with every underlying
    /// topic this source spans. Returns one guard per registration.
    fn watch(&self, listener: Rc<dyn Fn()>) -> Vec<Subscription>;
}

/// Any reactive cell is itself a watchable source.
impl<T: Clone + 'static> WatchSource for Observable<T> {
    type Snapshot = T;

    fn snapshot(&self) -> T {
        self.get()
    }

    fn watch(&self, listener: Rc<dyn Fn()>) -> Vec<Subscription> {
        vec![self.subscribe(move |_| listener())]
    }
}

/// A reactive handle produced by [`bind`].
///
/// Readable at any time; publishes to its own subscribers only when the
/// projection actually changed.
pub struct Binding<T> {
    cell: Observable<T>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl<T: Clone + 'static> Binding<T> {
    /// Get a clone of the current projection. Never recomputes.
    #[must_use]
    pub fn get(&self) -> T {
        self.cell.get()
    }

    /// Access the current projection by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.cell.with(f)
    }

    /// Register a callback invoked on each publication.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.cell.subscribe(callback)
    }

    /// Publication count since the binding was created.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.cell.version()
    }

    /// Detach from the source. The current value stays readable but
    /// never changes again. Idempotent; dropping the binding has the
    /// same effect.
    pub fn release(&self) {
        let mut subscriptions = self.subscriptions.borrow_mut();
        if !subscriptions.is_empty() {
            tracing::trace!(count = subscriptions.len(), "releasing binding");
        }
        subscriptions.clear();
    }

    /// Whether [`release`](Self::release) has run.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.subscriptions.borrow().is_empty()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("cell", &self.cell)
            .field("released", &self.subscriptions.borrow().is_empty())
            .finish()
    }
}

/// Bind with the default equality: the projection's own `PartialEq`.
pub fn bind<S, T, F>(source: &S, selector: F) -> Binding<T>
where
    S: WatchSource + Clone + 'static,
    T: Clone + PartialEq + 'static,
    F: Fn(&S::Snapshot) -> T + 'static,
{
    bind_with(source, selector, T::eq)
}

/// Bind with an explicit equality check.
///
/// Seeds the cell with `selector(source.snapshot())` immediately, then
/// holds exactly one registration against each of the source's topics
/// until release.
pub fn bind_with<S, T, F, E>(source: &S, selector: F, equals: E) -> Binding<T>
where
    S: WatchSource + Clone + 'static,
    T: Clone + 'static,
    F: Fn(&S::Snapshot) -> T + 'static,
    E: Fn(&T, &T) -> bool + 'static,
{
    let cell = Observable::new(selector(&source.snapshot()));

    let listener: Rc<dyn Fn()> = {
        let source = source.clone();
        let cell = cell.clone();
        Rc::new(move || {
            let candidate = selector(&source.snapshot());
            let changed = cell.with(|previous| !equals(previous, &candidate));
            if changed {
                cell.replace(candidate);
            }
        })
    };
    let subscriptions = source.watch(listener);

    Binding {
        cell,
        subscriptions: RefCell::new(subscriptions),
    }
}

// ─── Indexed bindings ────────────────────────────────────────────────────────

/// Projection slot for an indexed binding: distinguishes "no such
/// entry" from any value a selector could legitimately produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    /// The entry exists; the selector produced this value.
    Found(T),
    /// No entry with the requested identifier exists.
    Missing,
}

impl<T> Slot<T> {
    /// Whether the entry exists.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// A [`Binding`] over the single collection entry with a given
/// connection id. Reading fails while the entry is absent.
pub struct IndexedBinding<T> {
    connection_id: ConnectionId,
    inner: Binding<Slot<T>>,
}

impl<T: Clone + 'static> IndexedBinding<T> {
    /// The identifier this binding filters on.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Get the current projection.
    ///
    /// # Errors
    ///
    /// [`RoomError::NotFound`] while no entry with this connection id
    /// is in the collection.
    pub fn get(&self) -> Result<T> {
        self.inner.with(|slot| match slot {
            Slot::Found(value) => Ok(value.clone()),
            Slot::Missing => Err(RoomError::not_found(self.connection_id)),
        })
    }

    /// Register a callback invoked on each publication, including the
    /// entry appearing or disappearing.
    pub fn subscribe(&self, callback: impl Fn(&Slot<T>) + 'static) -> Subscription {
        self.inner.subscribe(callback)
    }

    /// Publication count since the binding was created.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version()
    }

    /// Detach from the source. Idempotent.
    pub fn release(&self) {
        self.inner.release();
    }
}

/// Bind to one collection entry with the default equality.
pub fn bind_indexed<S, T, F>(
    source: &S,
    connection_id: ConnectionId,
    selector: F,
) -> IndexedBinding<T>
where
    S: WatchSource<Snapshot = Others> + Clone + 'static,
    T: Clone + PartialEq + 'static,
    F: Fn(&liveroom_core::User) -> T + 'static,
{
    bind_indexed_with(source, connection_id, selector, T::eq)
}

/// Bind to one collection entry with an explicit equality check.
///
/// The snapshot is filtered to the entry whose id equals
/// `connection_id` before the selector runs; an entry appearing or
/// disappearing is itself a change.
pub fn bind_indexed_with<S, T, F, E>(
    source: &S,
    connection_id: ConnectionId,
    selector: F,
    equals: E,
) -> IndexedBinding<T>
where
    S: WatchSource<Snapshot = Others> + Clone + 'static,
    T: Clone + 'static,
    F: Fn(&liveroom_core::User) -> T + 'static,
    E: Fn(&T, &T) -> bool + 'static,
{
    let wrapped_selector =
        move |others: &Others| match others.get(connection_id) {
            Some(user) => Slot::Found(selector(user)),
            None => Slot::Missing,
        };
    let wrapped_equals = move |previous: &Slot<T>, candidate: &Slot<T>| match (previous, candidate)
    {
        (Slot::Found(a), Slot::Found(b)) => equals(a, b),
        (Slot::Missing, Slot::Missing) => true,
        _ => false,
    };

    IndexedBinding {
        connection_id,
        inner: bind_with(source, wrapped_selector, wrapped_equals),
    }
}

// ─── Storage root ────────────────────────────────────────────────────────────

/// One-shot bridge for the storage root's `UNLOADED → LOADED`
/// transition.
///
/// Absent before the root loads; after the load-completion signal fires
/// once, holds the root handle permanently. The root's identity never
/// changes afterwards, so no further listener is needed — contents are
/// observed separately through a storage binding.
pub struct RootBinding {
    cell: Observable<Option<LiveObject>>,
    subscription: RefCell<Option<Subscription>>,
}

impl RootBinding {
    /// The root handle, or `None` before the load completes.
    #[must_use]
    pub fn get(&self) -> Option<LiveObject> {
        self.cell.get()
    }

    /// Whether the root has loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.with(Option::is_some)
    }

    /// Register a callback for the load transition (and nothing after
    /// it — the transition happens at most once).
    pub fn subscribe(&self, callback: impl Fn(&Option<LiveObject>) + 'static) -> Subscription {
        self.cell.subscribe(callback)
    }

    /// Publication count; at most 1 over the binding's lifetime.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.cell.version()
    }

    /// Drop the load listener. Idempotent.
    pub fn release(&self) {
        self.subscription.borrow_mut().take();
    }
}

impl std::fmt::Debug for RootBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootBinding")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Bind the storage root's one-shot load transition.
pub fn bind_mutable_root(room: &Rc<dyn Room>) -> RootBinding {
    let cell = Observable::new(room.storage_root());

    let subscription = {
        let room = Rc::clone(room);
        let cell = cell.clone();
        room.clone().subscribe_storage_loaded(Box::new(move || {
            // The load signal fires at most once, but stay inert even
            // if a source violates that.
            if cell.with(Option::is_none) {
                tracing::trace!(room = room.id(), "storage root loaded");
                cell.replace(room.storage_root());
            }
        }))
    };

    RootBinding {
        cell,
        subscription: RefCell::new(Some(subscription)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveroom_core::User;
    use std::cell::Cell;

    #[test]
    fn seeds_immediately_from_the_current_snapshot() {
        let source = Observable::new(10);
        let binding = bind(&source, |v| v * 2);
        assert_eq!(binding.get(), 20);
        assert_eq!(binding.version(), 0);
    }

    #[test]
    fn publishes_only_when_the_projection_changes() {
        let source = Observable::new(10);
        let binding = bind(&source, |v| v / 10);

        source.replace(19); // projection still 1
        assert_eq!(binding.get(), 1);
        assert_eq!(binding.version(), 0);

        source.replace(20); // projection becomes 2
        assert_eq!(binding.get(), 2);
        assert_eq!(binding.version(), 1);
    }

    #[test]
    fn selector_runs_once_per_notification_and_never_on_reads() {
        let evaluations = Rc::new(Cell::new(0u32));
        let evaluations2 = Rc::clone(&evaluations);

        let source = Observable::new(1);
        let binding = bind(&source, move |v| {
            evaluations2.set(evaluations2.get() + 1);
            *v
        });
        assert_eq!(evaluations.get(), 1); // seed

        let _ = binding.get();
        let _ = binding.get();
        assert_eq!(evaluations.get(), 1);

        source.replace(2);
        assert_eq!(evaluations.get(), 2);
        let _ = binding.get();
        assert_eq!(evaluations.get(), 2);
    }

    #[test]
    fn custom_equality_suppresses_publication() {
        let source = Observable::new(3);
        // Projections are equal whenever they match modulo 10.
        let binding = bind_with(&source, |v| *v, |a, b| a % 10 == b % 10);

        source.replace(13);
        assert_eq!(binding.get(), 3);
        assert_eq!(binding.version(), 0);

        source.replace(14);
        assert_eq!(binding.get(), 14);
        assert_eq!(binding.version(), 1);
    }

    #[test]
    fn release_stops_publications_and_is_idempotent() {
        let source = Observable::new(1);
        let binding = bind(&source, |v| *v);

        source.replace(2);
        assert_eq!(binding.get(), 2);

        binding.release();
        binding.release();
        assert!(binding.is_released());

        source.replace(3);
        assert_eq!(binding.get(), 2);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn dropping_the_binding_unregisters_the_listener() {
        let source = Observable::new(1);
        {
            let _binding = bind(&source, |v| *v);
            assert_eq!(source.subscriber_count(), 1);
        }
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn downstream_subscribers_fire_per_publication() {
        let source = Observable::new(0);
        let binding = bind(&source, |v| v / 2);

        let seen = Rc::new(Cell::new(0u32));
        let seen2 = Rc::clone(&seen);
        let _sub = binding.subscribe(move |_| seen2.set(seen2.get() + 1));

        source.replace(1); // projection still 0
        source.replace(2); // projection 1
        source.replace(3); // projection still 1
        assert_eq!(seen.get(), 1);
    }

    fn others_with(ids: &[u64]) -> Others {
        Others::from(
            ids.iter()
                .map(|id| User::new(ConnectionId::new(*id), liveroom_core::JsonObject::new()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn indexed_binding_fails_until_the_entry_appears() {
        let source = Observable::new(others_with(&[]));
        let binding = bind_indexed(&source, ConnectionId::new(1), |u| u.connection_id.raw());

        assert_eq!(
            binding.get(),
            Err(RoomError::not_found(ConnectionId::new(1)))
        );

        source.replace(others_with(&[1]));
        assert_eq!(binding.get(), Ok(1));

        source.replace(others_with(&[]));
        assert_eq!(
            binding.get(),
            Err(RoomError::not_found(ConnectionId::new(1)))
        );
    }

    #[test]
    fn indexed_binding_treats_presence_change_as_publication() {
        let source = Observable::new(others_with(&[1, 2]));
        let binding = bind_indexed(&source, ConnectionId::new(2), |u| u.connection_id.raw());
        assert_eq!(binding.version(), 0);

        // Unrelated entry disappears; the projection for id 2 is
        // unchanged, so no publication.
        source.replace(others_with(&[2]));
        assert_eq!(binding.version(), 0);

        // Tracked entry disappears.
        source.replace(others_with(&[]));
        assert_eq!(binding.version(), 1);
        assert!(binding.get().is_err());
    }
}

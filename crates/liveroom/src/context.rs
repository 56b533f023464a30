#![forbid(unsafe_code)]

//! The provider construct: a room-scoped context tied to a
//! caller-controlled scope.
//!
//! [`RoomContext::provide`] enters the room and returns a
//! [`RoomProvider`] guard; releasing the guard (explicitly through
//! [`RoomProvider::leave`] or by dropping it) leaves the room. Two
//! concurrently active providers for the same room id in one context
//! are forbidden — that is incorrect composition and panics
//! immediately rather than producing two guards that would tear down
//! each other's session.
//!
//! Every binding constructor lives on the provider and fails with
//! [`RoomError::MissingContext`] once the provider has been released.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use liveroom_core::{
    BroadcastOptions, Client, ClientError, ConnectionId, CustomEvent, Json, JsonObject, Others,
    PresenceOptions, Result, Room, RoomError, RoomInit, Subscription, User,
};

use crate::bridge::{
    Binding, IndexedBinding, RootBinding, bind, bind_indexed, bind_indexed_with,
    bind_mutable_root, bind_with,
};
use crate::mutation::{MutationContext, mutate};
use crate::sources::{HistorySource, OthersSource, PresenceSource, SelfSource, StorageSource};

/// Options for entering a room.
#[derive(Debug, Clone, Default)]
pub struct RoomOptions {
    id: String,
    init: RoomInit,
}

impl RoomOptions {
    /// Options for the room with the given id, empty presence and
    /// storage.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            init: RoomInit::new(),
        }
    }

    /// Set the local participant's initial presence snapshot.
    #[must_use]
    pub fn with_presence(mut self, presence: JsonObject) -> Self {
        self.init = self.init.with_presence(presence);
        self
    }

    /// Set the plain-JSON template the storage root loads from.
    #[must_use]
    pub fn with_storage(mut self, storage: Json) -> Self {
        self.init = self.init.with_storage(storage);
        self
    }
}

/// Context bundle created once per client.
///
/// Tracks which room ids currently have an active provider, so the
/// no-two-providers-per-room rule can be enforced across the whole
/// context.
pub struct RoomContext {
    client: Rc<dyn Client>,
    active: Rc<RefCell<HashSet<String>>>,
}

impl RoomContext {
    /// Create a context over a client.
    #[must_use]
    pub fn new(client: Rc<dyn Client>) -> Self {
        Self {
            client,
            active: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// Enter a room and return the provider guard scoping it.
    ///
    /// # Panics
    ///
    /// Panics if a provider for the same room id is already active in
    /// this context.
    #[must_use]
    pub fn provide(&self, options: RoomOptions) -> RoomProvider {
        let RoomOptions { id, init } = options;
        if !self.active.borrow_mut().insert(id.clone()) {
            panic!("a RoomProvider for room `{id}` is already active in this context");
        }
        let room = self.client.enter(&id, init);
        tracing::debug!(room = %id, "entered room");

        RoomProvider {
            id,
            client: Rc::clone(&self.client),
            active: Rc::clone(&self.active),
            room: RefCell::new(Some(room)),
        }
    }
}

/// Imperative handle on the room's undo/redo stacks.
///
/// For reactive availability flags, use
/// [`RoomProvider::can_undo`]/[`RoomProvider::can_redo`] instead.
#[derive(Clone)]
pub struct HistoryHandle {
    room: Rc<dyn Room>,
}

impl HistoryHandle {
    /// Undo the last local history entry, if any.
    pub fn undo(&self) {
        self.room.undo();
    }

    /// Redo the last undone history entry, if any.
    pub fn redo(&self) {
        self.room.redo();
    }

    /// Whether there is anything to undo, read once.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.room.can_undo()
    }

    /// Whether there is anything to redo, read once.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.room.can_redo()
    }
}

/// Updates the local participant's presence.
#[derive(Clone)]
pub struct PresenceUpdater {
    room: Rc<dyn Room>,
}

impl PresenceUpdater {
    /// Apply a key-wise patch to the local presence. A `null` patch
    /// value removes the key.
    pub fn set(&self, patch: JsonObject, options: PresenceOptions) {
        self.room.update_presence(patch, options);
    }
}

/// Guard scoping one active room session.
///
/// All binding constructors hang off this guard. Dropping it leaves
/// the room.
pub struct RoomProvider {
    id: String,
    client: Rc<dyn Client>,
    active: Rc<RefCell<HashSet<String>>>,
    room: RefCell<Option<Rc<dyn Room>>>,
}

impl RoomProvider {
    /// The room id this provider is scoped to.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The raw room handle.
    ///
    /// # Errors
    ///
    /// [`RoomError::MissingContext`] after the provider has been
    /// released.
    pub fn room(&self) -> Result<Rc<dyn Room>> {
        self.room
            .borrow()
            .clone()
            .ok_or(RoomError::MissingContext)
    }

    /// Whether the provider still scopes an active session.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.room.borrow().is_some()
    }

    /// Leave the room. Idempotent; dropping the provider has the same
    /// effect.
    pub fn leave(&self) {
        let room = self.room.borrow_mut().take();
        if room.is_some() {
            self.client.leave(&self.id);
            self.active.borrow_mut().remove(&self.id);
            tracing::debug!(room = %self.id, "left room");
        }
    }

    // ─── Presence ────────────────────────────────────────────────────────

    /// The local presence snapshot plus its updater.
    pub fn my_presence(&self) -> Result<(Binding<JsonObject>, PresenceUpdater)> {
        let room = self.room()?;
        let binding = bind(&PresenceSource::new(Rc::clone(&room)), Clone::clone);
        Ok((binding, PresenceUpdater { room }))
    }

    /// The presence updater alone.
    pub fn update_my_presence(&self) -> Result<PresenceUpdater> {
        Ok(PresenceUpdater { room: self.room()? })
    }

    // ─── Others ──────────────────────────────────────────────────────────

    /// The whole others collection.
    pub fn others(&self) -> Result<Binding<Others>> {
        self.select_others(Clone::clone)
    }

    /// A projection of the others collection, republished when the
    /// projection's value changes.
    pub fn select_others<T>(&self, selector: impl Fn(&Others) -> T + 'static) -> Result<Binding<T>>
    where
        T: Clone + PartialEq + 'static,
    {
        let room = self.room()?;
        Ok(bind(&OthersSource::new(room), selector))
    }

    /// Like [`select_others`](Self::select_others) with an explicit
    /// equality check.
    pub fn select_others_with<T>(
        &self,
        selector: impl Fn(&Others) -> T + 'static,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Result<Binding<T>>
    where
        T: Clone + 'static,
    {
        let room = self.room()?;
        Ok(bind_with(&OthersSource::new(room), selector, equals))
    }

    /// The connection ids of the other participants, in join order.
    pub fn others_connection_ids(&self) -> Result<Binding<Vec<ConnectionId>>> {
        self.select_others(|others| others.connection_ids().collect())
    }

    /// A per-participant projection: `(connection id, data)` pairs,
    /// compared pairwise so one participant's change does not
    /// republish for value-equal neighbors.
    pub fn others_mapped<T>(
        &self,
        item_selector: impl Fn(&User) -> T + 'static,
    ) -> Result<Binding<Vec<(ConnectionId, T)>>>
    where
        T: Clone + PartialEq + 'static,
    {
        self.others_mapped_with(item_selector, T::eq)
    }

    /// Like [`others_mapped`](Self::others_mapped) with an explicit
    /// per-item equality check.
    pub fn others_mapped_with<T>(
        &self,
        item_selector: impl Fn(&User) -> T + 'static,
        item_equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Result<Binding<Vec<(ConnectionId, T)>>>
    where
        T: Clone + 'static,
    {
        let selector = move |others: &Others| {
            others
                .iter()
                .map(|user| (user.connection_id, item_selector(user)))
                .collect::<Vec<_>>()
        };
        let equals = move |a: &Vec<(ConnectionId, T)>, b: &Vec<(ConnectionId, T)>| {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|((id_a, x), (id_b, y))| id_a == id_b && item_equals(x, y))
        };
        self.select_others_with(selector, equals)
    }

    /// A projection of the single participant with the given
    /// connection id. Reading fails with [`RoomError::NotFound`] while
    /// that participant is absent.
    pub fn other<T>(
        &self,
        connection_id: ConnectionId,
        selector: impl Fn(&User) -> T + 'static,
    ) -> Result<IndexedBinding<T>>
    where
        T: Clone + PartialEq + 'static,
    {
        let room = self.room()?;
        Ok(bind_indexed(
            &OthersSource::new(room),
            connection_id,
            selector,
        ))
    }

    /// Like [`other`](Self::other) with an explicit equality check.
    pub fn other_with<T>(
        &self,
        connection_id: ConnectionId,
        selector: impl Fn(&User) -> T + 'static,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Result<IndexedBinding<T>>
    where
        T: Clone + 'static,
    {
        let room = self.room()?;
        Ok(bind_indexed_with(
            &OthersSource::new(room),
            connection_id,
            selector,
            equals,
        ))
    }

    // ─── Self ────────────────────────────────────────────────────────────

    /// The local participant record; `None` until connected.
    pub fn me(&self) -> Result<Binding<Option<User>>> {
        let room = self.room()?;
        Ok(bind(&SelfSource::new(room), Clone::clone))
    }

    /// A projection of the local participant; `None` until connected.
    pub fn select_me<T>(&self, selector: impl Fn(&User) -> T + 'static) -> Result<Binding<Option<T>>>
    where
        T: Clone + PartialEq + 'static,
    {
        self.select_me_with(selector, T::eq)
    }

    /// Like [`select_me`](Self::select_me) with an explicit equality
    /// check over present values.
    pub fn select_me_with<T>(
        &self,
        selector: impl Fn(&User) -> T + 'static,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Result<Binding<Option<T>>>
    where
        T: Clone + 'static,
    {
        let room = self.room()?;
        let wrapped_selector = move |me: &Option<User>| me.as_ref().map(&selector);
        let wrapped_equals = option_equals(equals);
        Ok(bind_with(
            &SelfSource::new(room),
            wrapped_selector,
            wrapped_equals,
        ))
    }

    // ─── Storage ─────────────────────────────────────────────────────────

    /// A projection of the immutable storage snapshot; `None` before
    /// the root loads. Consecutive reads return the cached projection
    /// without re-running the selector.
    pub fn storage<T>(&self, selector: impl Fn(&Json) -> T + 'static) -> Result<Binding<Option<T>>>
    where
        T: Clone + PartialEq + 'static,
    {
        self.storage_with(selector, T::eq)
    }

    /// Like [`storage`](Self::storage) with an explicit equality check
    /// over present values.
    pub fn storage_with<T>(
        &self,
        selector: impl Fn(&Json) -> T + 'static,
        equals: impl Fn(&T, &T) -> bool + 'static,
    ) -> Result<Binding<Option<T>>>
    where
        T: Clone + 'static,
    {
        let room = self.room()?;
        let wrapped_selector = move |root: &Option<Json>| root.as_ref().map(&selector);
        let wrapped_equals = option_equals(equals);
        Ok(bind_with(
            &StorageSource::new(room),
            wrapped_selector,
            wrapped_equals,
        ))
    }

    /// The storage root's one-shot load transition.
    pub fn mutable_root(&self) -> Result<RootBinding> {
        let room = self.room()?;
        Ok(bind_mutable_root(&room))
    }

    // ─── Mutations and history ───────────────────────────────────────────

    /// Run a mutation body inside the room's batch. See
    /// [`mutate`](crate::mutation::mutate).
    pub fn mutation<T>(&self, body: impl FnOnce(&MutationContext) -> T) -> Result<T> {
        let room = self.room()?;
        Ok(mutate(&room, body))
    }

    /// Run a plain body inside the room's batch.
    pub fn batch<T>(&self, body: impl FnOnce() -> T) -> Result<T> {
        let room = self.room()?;
        let mut body = Some(body);
        let mut out = None;
        room.batch(&mut || {
            if let Some(body) = body.take() {
                out = Some(body());
            }
        });
        Ok(out.expect("batch body runs exactly once"))
    }

    /// The imperative history handle.
    pub fn history(&self) -> Result<HistoryHandle> {
        Ok(HistoryHandle { room: self.room()? })
    }

    /// Undo the last local history entry.
    pub fn undo(&self) -> Result<()> {
        self.room()?.undo();
        Ok(())
    }

    /// Redo the last undone history entry.
    pub fn redo(&self) -> Result<()> {
        self.room()?.redo();
        Ok(())
    }

    /// Whether there is anything to undo, as a reactive cell.
    pub fn can_undo(&self) -> Result<Binding<bool>> {
        let room = self.room()?;
        Ok(bind(&HistorySource::new(room), |flags| flags.can_undo))
    }

    /// Whether there is anything to redo, as a reactive cell.
    pub fn can_redo(&self) -> Result<Binding<bool>> {
        let room = self.room()?;
        Ok(bind(&HistorySource::new(room), |flags| flags.can_redo))
    }

    // ─── Events ──────────────────────────────────────────────────────────

    /// Broadcast a custom event to the other participants.
    pub fn broadcast(&self, event: Json, options: BroadcastOptions) -> Result<()> {
        self.room()?.broadcast_event(event, options);
        Ok(())
    }

    /// Listen for custom events broadcast by other participants.
    pub fn on_event(&self, listener: impl Fn(&CustomEvent) + 'static) -> Result<Subscription> {
        Ok(self.room()?.subscribe_event(Box::new(listener)))
    }

    /// Listen for client error events.
    pub fn on_error(&self, listener: impl Fn(&ClientError) + 'static) -> Result<Subscription> {
        Ok(self.room()?.subscribe_error(Box::new(listener)))
    }
}

impl Drop for RoomProvider {
    fn drop(&mut self) {
        self.leave();
    }
}

impl std::fmt::Debug for RoomProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomProvider")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Lift an equality check over present values to optional projections:
/// two absent values are equal, presence transitions never are.
fn option_equals<T: 'static>(
    equals: impl Fn(&T, &T) -> bool + 'static,
) -> impl Fn(&Option<T>, &Option<T>) -> bool + 'static {
    move |a, b| match (a, b) {
        (Some(a), Some(b)) => equals(a, b),
        (None, None) => true,
        _ => false,
    }
}

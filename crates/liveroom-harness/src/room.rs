#![forbid(unsafe_code)]

//! The fake room.
//!
//! `MockRoom` holds all session state in plain single-threaded cells
//! and fans notifications out through per-topic [`ListenerSet`]s.
//! Remote activity is injected through the `pub(crate)` `simulate_*`
//! methods (driven by [`crate::RoomSimulator`]); local activity comes
//! in through the [`Room`] trait like in production.
//!
//! # Batching
//!
//! Every local write path runs inside a batch; unbatched calls open an
//! implicit one-op batch around themselves. A batch captures storage
//! and presence snapshots when the outermost level opens, and on close
//! compares them with the current state to decide what to record in
//! history and which topics to notify — so a batch that ends up
//! changing nothing records nothing and notifies nobody, and nested
//! batches collapse into the outer one. The batch closes even if the
//! body panics.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use liveroom_core::{
    BroadcastOptions, ClientError, ConnectionId, CustomEvent, Json, JsonObject, LiveObject,
    Others, PresenceOptions, Room, RoomInit, RoomTopic, StorageObserver, Subscription, User,
};
use liveroom_core::room::{ErrorListener, EventListener, Listener};

use crate::history::{HistoryEntry, HistoryStack};
use crate::listeners::ListenerSet;

/// The connection id the mock assigns to the local participant.
pub const LOCAL_CONNECTION_ID: ConnectionId = ConnectionId::new(0);

/// Transport close code for an abnormal disconnect.
pub const CLOSE_ABNORMAL: u16 = 1006;

struct OpenBatch {
    storage_before: Option<Json>,
    presence_before: JsonObject,
    storage_changed: bool,
    presence_changed: bool,
    presence_to_history: bool,
}

#[derive(Default)]
struct Topics {
    my_presence: ListenerSet<()>,
    others: ListenerSet<()>,
    me: ListenerSet<()>,
    connection: ListenerSet<()>,
    history: ListenerSet<()>,
    storage_deep: ListenerSet<()>,
    storage_loaded: ListenerSet<()>,
    events: ListenerSet<CustomEvent>,
    errors: ListenerSet<ClientError>,
}

/// One fake collaborative session.
pub struct MockRoom {
    id: String,
    weak_self: Weak<MockRoom>,
    presence: RefCell<JsonObject>,
    others: RefCell<Vec<User>>,
    self_user: RefCell<Option<User>>,
    self_aware: Cell<bool>,
    root: RefCell<Option<LiveObject>>,
    initial_storage: Option<Json>,
    last_snapshot: RefCell<Option<Json>>,
    batch_depth: Cell<u32>,
    open_batch: RefCell<Option<OpenBatch>>,
    restoring: Cell<bool>,
    history: RefCell<HistoryStack>,
    sent_events: RefCell<Vec<Json>>,
    topics: Topics,
}

impl MockRoom {
    pub(crate) fn new(id: &str, init: RoomInit) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            id: id.to_string(),
            weak_self: weak.clone(),
            presence: RefCell::new(init.initial_presence),
            others: RefCell::new(Vec::new()),
            self_user: RefCell::new(None),
            self_aware: Cell::new(false),
            root: RefCell::new(None),
            initial_storage: init.initial_storage,
            last_snapshot: RefCell::new(None),
            batch_depth: Cell::new(0),
            open_batch: RefCell::new(None),
            restoring: Cell::new(false),
            history: RefCell::new(HistoryStack::new()),
            sent_events: RefCell::new(Vec::new()),
            topics: Topics::default(),
        })
    }

    /// Events the local participant has broadcast, oldest first.
    #[must_use]
    pub fn sent_events(&self) -> Vec<Json> {
        self.sent_events.borrow().clone()
    }

    /// Number of recorded history entries.
    #[must_use]
    pub fn history_depth(&self) -> usize {
        self.history.borrow().depth()
    }

    // ─── Batch lifecycle ─────────────────────────────────────────────────

    fn begin_batch(&self) {
        if self.batch_depth.get() == 0 {
            *self.open_batch.borrow_mut() = Some(OpenBatch {
                storage_before: self.current_snapshot(),
                presence_before: self.presence.borrow().clone(),
                storage_changed: false,
                presence_changed: false,
                presence_to_history: false,
            });
        }
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    fn end_batch(&self) {
        let depth = self.batch_depth.get();
        debug_assert!(depth > 0, "end_batch without begin_batch");
        self.batch_depth.set(depth - 1);
        if depth == 1 {
            self.flush();
        }
    }

    fn flush(&self) {
        let Some(batch) = self.open_batch.borrow_mut().take() else {
            return;
        };

        let mut entry = HistoryEntry::default();
        let mut storage_dirty = false;
        if batch.storage_changed {
            let after = self.current_snapshot();
            if batch.storage_before != after {
                storage_dirty = true;
                if let (Some(before), Some(after_snapshot)) =
                    (batch.storage_before, after.clone())
                {
                    entry.storage = Some((before, after_snapshot));
                }
                *self.last_snapshot.borrow_mut() = after;
            }
        }

        let presence_dirty =
            batch.presence_changed && batch.presence_before != *self.presence.borrow();
        if presence_dirty && batch.presence_to_history {
            entry.presence = Some((batch.presence_before, self.presence.borrow().clone()));
        }

        let recorded = !entry.is_empty();
        if recorded {
            self.history.borrow_mut().record(entry);
        }

        if storage_dirty {
            self.topics.storage_deep.emit();
        }
        if presence_dirty {
            self.topics.my_presence.emit();
            if self.self_user.borrow().is_some() {
                self.topics.me.emit();
            }
        }
        if recorded {
            self.topics.history.emit();
        }
    }

    fn current_snapshot(&self) -> Option<Json> {
        let root = self.root.borrow().clone();
        root.map(|r| r.to_immutable())
    }

    fn apply_history(&self, entry: &HistoryEntry, backward: bool) {
        self.restoring.set(true);
        let mut storage_dirty = false;
        let mut presence_dirty = false;

        if let Some((before, after)) = &entry.storage {
            let target = if backward { before } else { after };
            let root = self.root.borrow().clone();
            if let Some(root) = root {
                root.restore_from(target);
                *self.last_snapshot.borrow_mut() = Some(target.clone());
                storage_dirty = true;
            }
        }
        if let Some((before, after)) = &entry.presence {
            let target = if backward { before } else { after };
            *self.presence.borrow_mut() = target.clone();
            presence_dirty = true;
        }
        self.restoring.set(false);

        if storage_dirty {
            self.topics.storage_deep.emit();
        }
        if presence_dirty {
            self.topics.my_presence.emit();
            if self.self_user.borrow().is_some() {
                self.topics.me.emit();
            }
        }
        self.topics.history.emit();
    }

    // ─── Remote activity (driven by RoomSimulator) ───────────────────────

    pub(crate) fn simulate_connect(&self) {
        let already = self.self_user.borrow().is_some();
        if already {
            return;
        }
        let user = User::new(LOCAL_CONNECTION_ID, self.presence.borrow().clone());
        *self.self_user.borrow_mut() = Some(user);
        self.self_aware.set(true);
        tracing::trace!(room = %self.id, "connected");
        self.topics.connection.emit();
        self.topics.me.emit();
    }

    pub(crate) fn simulate_user_joins(&self, connection_id: ConnectionId, presence: JsonObject) {
        let mut others = self.others.borrow_mut();
        others.retain(|u| u.connection_id != connection_id);
        others.push(User::new(connection_id, presence));
        drop(others);
        tracing::trace!(room = %self.id, %connection_id, "user joined");
        self.topics.others.emit();
    }

    pub(crate) fn simulate_remote_presence(&self, connection_id: ConnectionId, patch: JsonObject) {
        let mut changed = false;
        {
            let mut others = self.others.borrow_mut();
            if let Some(user) = others.iter_mut().find(|u| u.connection_id == connection_id) {
                apply_patch(&mut user.presence, patch);
                changed = true;
            }
        }
        if changed {
            self.topics.others.emit();
        }
    }

    pub(crate) fn simulate_user_leaves(&self, connection_id: ConnectionId) {
        let removed = {
            let mut others = self.others.borrow_mut();
            let before = others.len();
            others.retain(|u| u.connection_id != connection_id);
            others.len() != before
        };
        if removed {
            self.topics.others.emit();
        }
    }

    pub(crate) fn simulate_abnormal_close(&self) {
        self.others.borrow_mut().clear();
        *self.self_user.borrow_mut() = None;
        self.self_aware.set(false);
        tracing::trace!(room = %self.id, "abnormal close");
        self.topics.others.emit();
        self.topics.connection.emit();
        self.topics.me.emit();
        self.topics
            .errors
            .notify(&ClientError::new("connection closed abnormally").with_code(CLOSE_ABNORMAL));
    }

    pub(crate) fn simulate_load_storage(&self) {
        let loaded = self.root.borrow().is_some();
        if loaded {
            return;
        }
        let root = match &self.initial_storage {
            Some(Json::Object(map)) => LiveObject::from_json(map),
            _ => LiveObject::new(),
        };
        if let Some(me) = self.weak_self.upgrade() {
            let observer: Rc<dyn StorageObserver> = me;
            root.attach(&observer);
        }
        *self.last_snapshot.borrow_mut() = Some(root.to_immutable());
        *self.root.borrow_mut() = Some(root);
        tracing::trace!(room = %self.id, "storage loaded");
        self.topics.storage_loaded.emit();
    }

    pub(crate) fn simulate_event(&self, connection_id: ConnectionId, event: Json) {
        self.topics.events.notify(&CustomEvent {
            connection_id,
            event,
        });
    }

    pub(crate) fn simulate_error(&self, error: ClientError) {
        self.topics.errors.notify(&error);
    }
}

impl StorageObserver for MockRoom {
    fn on_storage_change(&self) {
        if self.restoring.get() {
            return;
        }
        if self.batch_depth.get() > 0 {
            if let Some(batch) = self.open_batch.borrow_mut().as_mut() {
                batch.storage_changed = true;
            }
            return;
        }

        // Unbatched write: record and notify immediately, one entry per
        // elementary mutation.
        let after = self.current_snapshot();
        let before = self.last_snapshot.borrow().clone();
        if before == after {
            return;
        }
        let mut recorded = false;
        if let (Some(before), Some(after_snapshot)) = (before, after.clone()) {
            self.history.borrow_mut().record(HistoryEntry {
                storage: Some((before, after_snapshot)),
                presence: None,
            });
            recorded = true;
        }
        *self.last_snapshot.borrow_mut() = after;
        self.topics.storage_deep.emit();
        if recorded {
            self.topics.history.emit();
        }
    }
}

impl Room for MockRoom {
    fn id(&self) -> &str {
        &self.id
    }

    fn get_presence(&self) -> JsonObject {
        self.presence.borrow().clone()
    }

    fn update_presence(&self, patch: JsonObject, options: PresenceOptions) {
        self.begin_batch();
        let guard = BatchGuard { room: self };
        apply_patch(&mut self.presence.borrow_mut(), patch);
        if let Some(batch) = self.open_batch.borrow_mut().as_mut() {
            batch.presence_changed = true;
            batch.presence_to_history |= options.add_to_history;
        }
        drop(guard);
    }

    fn get_others(&self) -> Others {
        Others::from(self.others.borrow().clone())
    }

    fn get_self(&self) -> Option<User> {
        let user = self.self_user.borrow().clone();
        user.map(|mut u| {
            u.presence = self.presence.borrow().clone();
            u
        })
    }

    fn is_self_aware(&self) -> bool {
        self.self_aware.get()
    }

    fn storage_root(&self) -> Option<LiveObject> {
        self.root.borrow().clone()
    }

    fn subscribe(&self, topic: RoomTopic, listener: Listener) -> Subscription {
        let set = match topic {
            RoomTopic::MyPresence => &self.topics.my_presence,
            RoomTopic::Others => &self.topics.others,
            RoomTopic::Me => &self.topics.me,
            RoomTopic::Connection => &self.topics.connection,
            RoomTopic::History => &self.topics.history,
        };
        set.add(move |_| listener())
    }

    fn subscribe_storage_deep(&self, listener: Listener) -> Subscription {
        self.topics.storage_deep.add(move |_| listener())
    }

    fn subscribe_storage_loaded(&self, listener: Listener) -> Subscription {
        self.topics.storage_loaded.add_once(move |_| listener())
    }

    fn batch(&self, body: &mut dyn FnMut()) {
        self.begin_batch();
        let guard = BatchGuard { room: self };
        body();
        drop(guard);
    }

    fn undo(&self) {
        let entry = self.history.borrow_mut().undo();
        if let Some(entry) = entry {
            self.apply_history(&entry, true);
        }
    }

    fn redo(&self) {
        let entry = self.history.borrow_mut().redo();
        if let Some(entry) = entry {
            self.apply_history(&entry, false);
        }
    }

    fn can_undo(&self) -> bool {
        self.history.borrow().can_undo()
    }

    fn can_redo(&self) -> bool {
        self.history.borrow().can_redo()
    }

    fn broadcast_event(&self, event: Json, options: BroadcastOptions) {
        if !self.self_aware.get() && !options.should_queue_if_not_ready {
            tracing::trace!(room = %self.id, "dropping broadcast before connection");
            return;
        }
        self.sent_events.borrow_mut().push(event);
    }

    fn subscribe_event(&self, listener: EventListener) -> Subscription {
        self.topics.events.add(move |event| listener(event))
    }

    fn subscribe_error(&self, listener: ErrorListener) -> Subscription {
        self.topics.errors.add(move |error| listener(error))
    }
}

/// Closes the batch even when the body panics.
struct BatchGuard<'a> {
    room: &'a MockRoom,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.room.end_batch();
    }
}

fn apply_patch(presence: &mut JsonObject, patch: JsonObject) {
    for (key, value) in patch {
        if value.is_null() {
            presence.remove(&key);
        } else {
            presence.insert(key, value);
        }
    }
}

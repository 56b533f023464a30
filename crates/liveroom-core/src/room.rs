#![forbid(unsafe_code)]

//! The capability surface consumed from the external client.
//!
//! [`Room`] and [`Client`] describe what the binding layer needs from a
//! real-time collaboration client; they deliberately say nothing about
//! how it is provided. A production client implements them over its
//! connection machinery; `liveroom-harness` implements them in-process
//! over a fake transport.
//!
//! # Invariants required of implementations
//!
//! 1. Listeners for one topic are invoked in registration order.
//! 2. `subscribe_storage_loaded` listeners fire at most once, after the
//!    storage root transitions from absent to loaded; the transition is
//!    one-way.
//! 3. `batch` defers all topic notifications issued inside the body
//!    until the outermost batch closes, coalescing them to at most one
//!    notification per topic; nested batches collapse into the outer
//!    one. The batch closes even if the body panics.
//! 4. All local writes inside one batch form one history entry.

use std::rc::Rc;

use thiserror::Error;

use crate::json::{Json, JsonObject};
use crate::lson::LiveObject;
use crate::subscription::Subscription;
use crate::user::{ConnectionId, Others, User};

/// A change notification callback carrying no payload; the receiver
/// re-reads the relevant snapshot through the room's getters.
pub type Listener = Box<dyn Fn()>;

/// A callback for custom events broadcast by other participants.
pub type EventListener = Box<dyn Fn(&CustomEvent)>;

/// A callback for client error events.
pub type ErrorListener = Box<dyn Fn(&ClientError)>;

/// Change-notification topics a room exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomTopic {
    /// The local participant's presence snapshot changed.
    MyPresence,
    /// The others collection changed (join, leave, or presence update).
    Others,
    /// The local participant record changed.
    Me,
    /// Connection status changed.
    Connection,
    /// The undo/redo stacks changed.
    History,
}

/// A custom event received from another participant.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    /// Connection id of the sender.
    pub connection_id: ConnectionId,
    /// The broadcast payload.
    pub event: Json,
}

/// An error event surfaced by the client (connection failures and the
/// like). Distinct from [`crate::RoomError`], which reports incorrect
/// composition of the binding layer itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("room connection error: {message}")]
pub struct ClientError {
    /// Human-readable description.
    pub message: String,
    /// Transport close code, when one applies.
    pub code: Option<u16>,
}

impl ClientError {
    /// Create an error event with no transport code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach a transport close code.
    #[must_use]
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }
}

/// Options for a presence update.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceOptions {
    /// Whether the update should be undoable.
    pub add_to_history: bool,
}

impl PresenceOptions {
    /// Options recording the update in history.
    #[must_use]
    pub const fn history() -> Self {
        Self {
            add_to_history: true,
        }
    }
}

/// Options for broadcasting a custom event.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastOptions {
    /// Whether to queue the event for delivery when the connection is
    /// not ready, instead of dropping it.
    pub should_queue_if_not_ready: bool,
}

/// Initial state handed to [`Client::enter`].
#[derive(Debug, Clone, Default)]
pub struct RoomInit {
    /// The local participant's initial presence snapshot.
    pub initial_presence: JsonObject,
    /// Plain-JSON template for the storage root, materialized into live
    /// containers when the initial load completes. `None` loads an
    /// empty root.
    pub initial_storage: Option<Json>,
}

impl RoomInit {
    /// Empty presence, empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial presence snapshot.
    #[must_use]
    pub fn with_presence(mut self, presence: JsonObject) -> Self {
        self.initial_presence = presence;
        self
    }

    /// Set the storage template.
    #[must_use]
    pub fn with_storage(mut self, storage: Json) -> Self {
        self.initial_storage = Some(storage);
        self
    }
}

/// One collaborative session, as observed by the binding layer.
pub trait Room {
    /// The room identifier this handle is scoped to.
    fn id(&self) -> &str;

    /// The local participant's current presence snapshot.
    fn get_presence(&self) -> JsonObject;

    /// Apply a key-wise presence patch. A `null` patch value removes
    /// the key.
    fn update_presence(&self, patch: JsonObject, options: PresenceOptions);

    /// The current others collection.
    fn get_others(&self) -> Others;

    /// The local participant record, once connected.
    fn get_self(&self) -> Option<User>;

    /// Whether the local participant's identity has been established.
    fn is_self_aware(&self) -> bool;

    /// The storage root, or `None` before the initial load completes.
    fn storage_root(&self) -> Option<LiveObject>;

    /// Register a listener on a change-notification topic.
    fn subscribe(&self, topic: RoomTopic, listener: Listener) -> Subscription;

    /// Register a listener for deep storage changes (any mutation
    /// anywhere under the root).
    fn subscribe_storage_deep(&self, listener: Listener) -> Subscription;

    /// Register a listener for the storage-load-completion signal.
    /// Fires at most once.
    fn subscribe_storage_loaded(&self, listener: Listener) -> Subscription;

    /// Run `body` with all writes coalesced into one network message,
    /// one history entry, and at most one notification per topic.
    fn batch(&self, body: &mut dyn FnMut());

    /// Undo the last local history entry, if any.
    fn undo(&self);

    /// Redo the last undone history entry, if any.
    fn redo(&self);

    /// Whether there is anything to undo.
    fn can_undo(&self) -> bool;

    /// Whether there is anything to redo.
    fn can_redo(&self) -> bool;

    /// Broadcast a custom event to the other participants. The sender
    /// does not receive its own broadcast.
    fn broadcast_event(&self, event: Json, options: BroadcastOptions);

    /// Register a listener for custom events from other participants.
    fn subscribe_event(&self, listener: EventListener) -> Subscription;

    /// Register a listener for client error events.
    fn subscribe_error(&self, listener: ErrorListener) -> Subscription;
}

/// Entry point to the external client: hands out room handles by id.
pub trait Client {
    /// Enter a room, creating the handle on first entry. Entering an
    /// already-entered room returns the existing handle.
    fn enter(&self, room_id: &str, init: RoomInit) -> Rc<dyn Room>;

    /// Leave a room, releasing its handle.
    fn leave(&self, room_id: &str);
}

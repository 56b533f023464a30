#![forbid(unsafe_code)]

//! [`WatchSource`] adapters over a room handle, one per slice of room
//! state a binding can select from.
//!
//! Each adapter pairs the room's synchronous getter with the topic (or
//! topics) whose notifications can change that getter's result. The
//! storage adapter also listens for the load-completion signal, so a
//! binding created before the root loads publishes once when it does.

use std::rc::Rc;

use liveroom_core::{Json, JsonObject, Others, Room, RoomTopic, Subscription, User};

use crate::bridge::WatchSource;

/// The local participant's presence snapshot.
#[derive(Clone)]
pub struct PresenceSource {
    room: Rc<dyn Room>,
}

impl PresenceSource {
    #[must_use]
    pub fn new(room: Rc<dyn Room>) -> Self {
        Self { room }
    }
}

impl WatchSource for PresenceSource {
    type Snapshot = JsonObject;

    fn snapshot(&self) -> JsonObject {
        self.room.get_presence()
    }

    fn watch(&self, listener: Rc<dyn Fn()>) -> Vec<Subscription> {
        vec![
            self.room
                .subscribe(RoomTopic::MyPresence, Box::new(move || listener())),
        ]
    }
}

/// The others collection.
#[derive(Clone)]
pub struct OthersSource {
    room: Rc<dyn Room>,
}

impl OthersSource {
    #[must_use]
    pub fn new(room: Rc<dyn Room>) -> Self {
        Self { room }
    }
}

impl WatchSource for OthersSource {
    type Snapshot = Others;

    fn snapshot(&self) -> Others {
        self.room.get_others()
    }

    fn watch(&self, listener: Rc<dyn Fn()>) -> Vec<Subscription> {
        vec![
            self.room
                .subscribe(RoomTopic::Others, Box::new(move || listener())),
        ]
    }
}

/// The local participant record. Absent until the room is connected, so
/// changes can arrive through either the self topic or the connection
/// topic; this source spans both.
#[derive(Clone)]
pub struct SelfSource {
    room: Rc<dyn Room>,
}

impl SelfSource {
    #[must_use]
    pub fn new(room: Rc<dyn Room>) -> Self {
        Self { room }
    }
}

impl WatchSource for SelfSource {
    type Snapshot = Option<User>;

    fn snapshot(&self) -> Option<User> {
        self.room.get_self()
    }

    fn watch(&self, listener: Rc<dyn Fn()>) -> Vec<Subscription> {
        let me_listener = Rc::clone(&listener);
        vec![
            self.room
                .subscribe(RoomTopic::Me, Box::new(move || me_listener())),
            self.room
                .subscribe(RoomTopic::Connection, Box::new(move || listener())),
        ]
    }
}

/// The immutable snapshot of the storage root; `None` until loaded.
#[derive(Clone)]
pub struct StorageSource {
    room: Rc<dyn Room>,
}

impl StorageSource {
    #[must_use]
    pub fn new(room: Rc<dyn Room>) -> Self {
        Self { room }
    }
}

impl WatchSource for StorageSource {
    type Snapshot = Option<Json>;

    fn snapshot(&self) -> Option<Json> {
        self.room.storage_root().map(|root| root.to_immutable())
    }

    fn watch(&self, listener: Rc<dyn Fn()>) -> Vec<Subscription> {
        let deep_listener = Rc::clone(&listener);
        vec![
            self.room
                .subscribe_storage_deep(Box::new(move || deep_listener())),
            self.room
                .subscribe_storage_loaded(Box::new(move || listener())),
        ]
    }
}

/// Undo/redo availability, derived from the history topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryFlags {
    pub can_undo: bool,
    pub can_redo: bool,
}

/// The history stack's availability flags.
#[derive(Clone)]
pub struct HistorySource {
    room: Rc<dyn Room>,
}

impl HistorySource {
    #[must_use]
    pub fn new(room: Rc<dyn Room>) -> Self {
        Self { room }
    }
}

impl WatchSource for HistorySource {
    type Snapshot = HistoryFlags;

    fn snapshot(&self) -> HistoryFlags {
        HistoryFlags {
            can_undo: self.room.can_undo(),
            can_redo: self.room.can_redo(),
        }
    }

    fn watch(&self, listener: Rc<dyn Fn()>) -> Vec<Subscription> {
        vec![
            self.room
                .subscribe(RoomTopic::History, Box::new(move || listener())),
        ]
    }
}

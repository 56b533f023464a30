#![forbid(unsafe_code)]

//! Scripts fake remote activity against a mock room.
//!
//! The simulator plays the part of the server and the other
//! participants: connection establishment, joins and leaves, remote
//! presence updates, storage load, custom events, and error injection.
//! Connection ids are taken raw so fixtures read the way the scenarios
//! are written.

use std::rc::Rc;

use liveroom_core::{ClientError, ConnectionId, Json};

use crate::object;
use crate::room::MockRoom;

/// Remote-activity injector for one [`MockRoom`].
pub struct RoomSimulator {
    room: Rc<MockRoom>,
}

impl RoomSimulator {
    /// Wrap a room.
    #[must_use]
    pub fn new(room: Rc<MockRoom>) -> Self {
        Self { room }
    }

    /// The room being driven.
    #[must_use]
    pub fn room(&self) -> &Rc<MockRoom> {
        &self.room
    }

    /// Establish the local connection: the room becomes self-aware and
    /// the local participant record appears. Idempotent.
    pub fn connect(&self) {
        self.room.simulate_connect();
    }

    /// A remote participant joins with the given presence object.
    pub fn user_joins(&self, connection_id: u64, presence: Json) {
        self.room
            .simulate_user_joins(ConnectionId::new(connection_id), object(presence));
    }

    /// A remote participant's presence is patched key-wise. Unknown
    /// participants are ignored, like stray server messages.
    pub fn update_remote_presence(&self, connection_id: u64, patch: Json) {
        self.room
            .simulate_remote_presence(ConnectionId::new(connection_id), object(patch));
    }

    /// A remote participant leaves normally.
    pub fn user_leaves(&self, connection_id: u64) {
        self.room
            .simulate_user_leaves(ConnectionId::new(connection_id));
    }

    /// The connection drops abnormally: others clear, self-awareness is
    /// lost, and an error event fires.
    pub fn abnormal_close(&self) {
        self.room.simulate_abnormal_close();
    }

    /// Complete the initial storage load from the room's initializer
    /// template. The transition is one-way; repeated calls are no-ops.
    pub fn load_storage(&self) {
        self.room.simulate_load_storage();
    }

    /// Deliver a custom event broadcast by a remote participant.
    pub fn emit_event(&self, connection_id: u64, event: Json) {
        self.room
            .simulate_event(ConnectionId::new(connection_id), event);
    }

    /// Deliver a client error event.
    pub fn emit_error(&self, error: ClientError) {
        self.room.simulate_error(error);
    }

    /// Events the local participant has broadcast, oldest first.
    #[must_use]
    pub fn sent_events(&self) -> Vec<Json> {
        self.room.sent_events()
    }
}

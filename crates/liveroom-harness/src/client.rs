#![forbid(unsafe_code)]

//! The fake client: a room registry with no transport behind it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use liveroom_core::{Client, Room, RoomInit};

use crate::room::MockRoom;
use crate::simulator::RoomSimulator;

/// In-process [`Client`] implementation handing out [`MockRoom`]s.
#[derive(Default)]
pub struct MockClient {
    rooms: RefCell<HashMap<String, Rc<MockRoom>>>,
}

impl MockClient {
    /// A client with no rooms entered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The mock room for `room_id`, if entered.
    #[must_use]
    pub fn room(&self, room_id: &str) -> Option<Rc<MockRoom>> {
        self.rooms.borrow().get(room_id).cloned()
    }

    /// Whether `room_id` is currently entered.
    #[must_use]
    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.borrow().contains_key(room_id)
    }

    /// A simulator injecting remote activity into `room_id`.
    ///
    /// # Panics
    ///
    /// Panics if the room has not been entered.
    #[must_use]
    pub fn simulate(&self, room_id: &str) -> RoomSimulator {
        let room = self
            .room(room_id)
            .unwrap_or_else(|| panic!("room `{room_id}` has not been entered"));
        RoomSimulator::new(room)
    }
}

impl Client for MockClient {
    fn enter(&self, room_id: &str, init: RoomInit) -> Rc<dyn Room> {
        let room = self
            .rooms
            .borrow_mut()
            .entry(room_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(room = room_id, "creating mock room");
                MockRoom::new(room_id, init)
            })
            .clone();
        room
    }

    fn leave(&self, room_id: &str) {
        if self.rooms.borrow_mut().remove(room_id).is_some() {
            tracing::debug!(room = room_id, "dropped mock room");
        }
    }
}

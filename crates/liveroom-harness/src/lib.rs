#![forbid(unsafe_code)]

//! In-process fake client for liveroom tests.
//!
//! [`MockClient`] and [`MockRoom`] implement the `liveroom-core`
//! capability traits over no transport at all: remote activity is
//! injected through a [`RoomSimulator`], the way the real client's
//! tests script a fake socket. The mock honors the observable contract
//! a real client provides — registration-order listeners, a one-way
//! storage-load transition, batch coalescing with one history entry
//! per batch — without any of the machinery behind it.

pub mod client;
pub mod history;
pub mod listeners;
pub mod room;
pub mod simulator;

pub use client::MockClient;
pub use history::{HistoryEntry, HistoryStack};
pub use listeners::ListenerSet;
pub use room::MockRoom;
pub use simulator::RoomSimulator;

use liveroom_core::{Json, JsonObject};

/// Unwrap a JSON value into an object map. Test fixture helper.
///
/// # Panics
///
/// Panics if the value is not an object.
#[must_use]
pub fn object(value: Json) -> JsonObject {
    match value {
        Json::Object(map) => map,
        other => panic!("fixture is not a JSON object: {other}"),
    }
}

#![forbid(unsafe_code)]

//! Client-facing data model and capability surface for liveroom.
//!
//! This crate defines everything the binding layer consumes from a
//! real-time collaboration client, without implementing any of it:
//!
//! - [`json`]: JSON-compatible value aliases and the [`json::shallow`]
//!   one-level equality check.
//! - [`lson`]: the shared mutable storage tree ([`LiveObject`],
//!   [`LiveList`]) with snapshot-to-immutable conversion.
//! - [`user`]: participant records ([`User`], [`Others`],
//!   [`ConnectionId`]).
//! - [`room`]: the [`Room`] and [`Client`] capability traits, topic
//!   subscriptions, and option types.
//! - [`subscription`]: the RAII registration guard returned by every
//!   subscribe operation.
//! - [`error`]: the [`RoomError`] kinds surfaced by the binding layer.
//!
//! The actual client (connection lifecycle, wire protocol, presence
//! merging, storage conflict resolution) lives elsewhere; tests use the
//! in-process fake from `liveroom-harness`.

pub mod error;
pub mod json;
pub mod lson;
pub mod room;
pub mod subscription;
pub mod user;

pub use error::{NotReadyKind, Result, RoomError};
pub use json::{Json, JsonObject, shallow};
pub use lson::{LiveList, LiveObject, Lson, StorageObserver};
pub use room::{
    BroadcastOptions, Client, ClientError, CustomEvent, PresenceOptions, Room, RoomInit, RoomTopic,
};
pub use subscription::Subscription;
pub use user::{ConnectionId, Others, User};

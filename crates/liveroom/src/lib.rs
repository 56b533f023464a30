#![forbid(unsafe_code)]

//! Reactive bindings over a real-time collaboration client.
//!
//! This crate turns the change-notification callbacks of an external
//! collaboration client (presence, others, shared storage, history,
//! custom events) into reactive cells with selector/equality semantics,
//! so consumers can watch narrow slices of shared state without
//! spurious recomputation. It performs no networking and no conflict
//! resolution — the client behind the [`liveroom_core::Room`] trait
//! owns all of that.
//!
//! # Layout
//!
//! - [`reactive`]: the [`Observable`](reactive::Observable) cell.
//! - [`bridge`]: the selector-subscription bridge —
//!   [`bind`](bridge::bind), [`bind_indexed`](bridge::bind_indexed),
//!   [`bind_mutable_root`](bridge::bind_mutable_root).
//! - [`sources`]: [`WatchSource`](bridge::WatchSource) adapters over a
//!   room handle, one per slice of room state.
//! - [`context`]: the provider construct scoping one room session and
//!   exposing every binding constructor.
//! - [`mutation`]: batched mutations with a fail-fast capability
//!   context.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use liveroom::prelude::*;
//! use liveroom_harness::MockClient;
//! use serde_json::json;
//!
//! let client = Rc::new(MockClient::new());
//! let context = RoomContext::new(client.clone());
//! let provider = context.provide(
//!     RoomOptions::new("demo").with_storage(json!({"count": 0})),
//! );
//!
//! let count = provider.storage(|root| root["count"].clone()).unwrap();
//! assert_eq!(count.get(), None); // storage not loaded yet
//!
//! client.simulate("demo").load_storage();
//! assert_eq!(count.get(), Some(json!(0)));
//! ```

pub mod bridge;
pub mod context;
pub mod mutation;
pub mod reactive;
pub mod sources;

pub mod prelude {
    pub use crate::bridge::{
        Binding, IndexedBinding, RootBinding, Slot, WatchSource, bind, bind_indexed,
        bind_indexed_with, bind_mutable_root, bind_with,
    };
    pub use crate::context::{
        HistoryHandle, PresenceUpdater, RoomContext, RoomOptions, RoomProvider,
    };
    pub use crate::mutation::{MutationContext, mutate};
    pub use crate::reactive::Observable;
    pub use liveroom_core::{
        BroadcastOptions, Client, ConnectionId, Json, JsonObject, LiveList, LiveObject, Lson,
        Others, PresenceOptions, Result, Room, RoomError, RoomInit, Subscription, User, shallow,
    };
}

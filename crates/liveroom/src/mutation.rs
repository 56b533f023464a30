#![forbid(unsafe_code)]

//! Batched mutations against the shared room state.
//!
//! [`mutate`] runs a body inside the room's batching primitive, so any
//! number of writes issued by the body coalesce into one network
//! message, one history entry, and one downstream re-evaluation per
//! affected binding. The [`MutationContext`] handed to the body is the
//! only sanctioned way to reach mutable storage from a mutation; its
//! accessors fail fast with [`RoomError::NotReady`] rather than hand
//! out half-initialized state.

use std::rc::Rc;

use liveroom_core::{
    JsonObject, LiveObject, NotReadyKind, Others, PresenceOptions, Result, Room, RoomError, User,
};

/// Capabilities available to a mutation body.
pub struct MutationContext {
    room: Rc<dyn Room>,
}

impl MutationContext {
    pub(crate) fn new(room: Rc<dyn Room>) -> Self {
        Self { room }
    }

    /// The mutable storage root.
    ///
    /// # Errors
    ///
    /// [`RoomError::NotReady`] before the initial storage load.
    pub fn storage(&self) -> Result<LiveObject> {
        self.room
            .storage_root()
            .ok_or(RoomError::not_ready(NotReadyKind::Storage))
    }

    /// A read-only snapshot of the local participant.
    ///
    /// # Errors
    ///
    /// [`RoomError::NotReady`] while the participant's identity is not
    /// established.
    pub fn me(&self) -> Result<User> {
        self.room
            .get_self()
            .ok_or(RoomError::not_ready(NotReadyKind::Me))
    }

    /// A read-only snapshot of the other participants.
    ///
    /// # Errors
    ///
    /// [`RoomError::NotReady`] until the room is self-aware, even if a
    /// partial collection is already observable.
    pub fn others(&self) -> Result<Others> {
        if !self.room.is_self_aware() {
            return Err(RoomError::not_ready(NotReadyKind::Others));
        }
        Ok(self.room.get_others())
    }

    /// Apply a key-wise presence patch as part of the mutation.
    pub fn set_presence(&self, patch: JsonObject, options: PresenceOptions) {
        self.room.update_presence(patch, options);
    }
}

/// Run `body` inside the room's batch.
///
/// Returns whatever `body` returns. The batch closes even when the
/// body panics — the batching primitive guarantees that, not this
/// wrapper.
pub fn mutate<T>(room: &Rc<dyn Room>, body: impl FnOnce(&MutationContext) -> T) -> T {
    let context = MutationContext::new(Rc::clone(room));
    let mut body = Some(body);
    let mut out = None;
    room.batch(&mut || {
        if let Some(body) = body.take() {
            out = Some(body(&context));
        }
    });
    out.expect("batch body runs exactly once")
}

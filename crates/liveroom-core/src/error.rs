#![forbid(unsafe_code)]

//! Error kinds surfaced by the binding layer.
//!
//! All three kinds are programmer errors: they indicate incorrect
//! composition, not transient failure, and are never retried or
//! recovered. Connection retry/backoff belongs to the external client.

use thiserror::Error;

use crate::user::ConnectionId;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, RoomError>;

/// What a mutation context tried to access before the room was ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyKind {
    /// The storage root has not loaded yet.
    Storage,
    /// The local participant's identity is not established yet.
    Me,
    /// The room has not become self-aware yet.
    Others,
}

impl std::fmt::Display for NotReadyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage => f.write_str("storage"),
            Self::Me => f.write_str("self"),
            Self::Others => f.write_str("others"),
        }
    }
}

/// Errors raised by binding operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// A binding operation was invoked outside an active provider scope.
    #[error("no active RoomProvider for this operation")]
    MissingContext,

    /// An indexed lookup named a participant that is not in the room.
    #[error("no other user with connection id {connection_id} exists")]
    NotFound { connection_id: ConnectionId },

    /// Mutation-context access before the room is connected/self-aware.
    #[error("cannot access {what} until connected to the room")]
    NotReady { what: NotReadyKind },
}

impl RoomError {
    /// Shorthand for [`RoomError::NotFound`].
    #[must_use]
    pub fn not_found(connection_id: ConnectionId) -> Self {
        Self::NotFound { connection_id }
    }

    /// Shorthand for [`RoomError::NotReady`].
    #[must_use]
    pub fn not_ready(what: NotReadyKind) -> Self {
        Self::NotReady { what }
    }
}

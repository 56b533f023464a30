#![forbid(unsafe_code)]

//! Participant records: the local user, remote users, and the ordered
//! collection of everyone else in the room.

use serde::{Deserialize, Serialize};

use crate::json::{Json, JsonObject};

/// Numeric identifier for one connection to a room.
///
/// Assigned by the external client when a participant connects; stable
/// for the lifetime of that connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Create a connection id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One participant as observed through the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The participant's connection id.
    pub connection_id: ConnectionId,
    /// The participant's current presence snapshot.
    pub presence: JsonObject,
    /// Stable user id from authentication, when available.
    pub id: Option<String>,
    /// Arbitrary per-user metadata from authentication, when available.
    pub info: Option<Json>,
    /// Whether the participant is authorized only to read.
    pub is_read_only: bool,
}

impl User {
    /// Create a user with the given connection id and presence, no
    /// authentication metadata, and write access.
    #[must_use]
    pub fn new(connection_id: ConnectionId, presence: JsonObject) -> Self {
        Self {
            connection_id,
            presence,
            id: None,
            info: None,
            is_read_only: false,
        }
    }
}

/// The ordered collection of remote participants.
///
/// Order is join order as reported by the client; it is preserved across
/// presence updates and only changes on join/leave.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Others {
    users: Vec<User>,
}

impl Others {
    /// An empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remote participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether there are no remote participants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Look up a participant by connection id.
    #[must_use]
    pub fn get(&self, connection_id: ConnectionId) -> Option<&User> {
        self.users.iter().find(|u| u.connection_id == connection_id)
    }

    /// Iterate over the participants in join order.
    pub fn iter(&self) -> std::slice::Iter<'_, User> {
        self.users.iter()
    }

    /// Iterate over the connection ids in join order.
    pub fn connection_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.users.iter().map(|u| u.connection_id)
    }

    /// View the participants as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[User] {
        &self.users
    }
}

impl From<Vec<User>> for Others {
    fn from(users: Vec<User>) -> Self {
        Self { users }
    }
}

impl<'a> IntoIterator for &'a Others {
    type Item = &'a User;
    type IntoIter = std::slice::Iter<'a, User>;

    fn into_iter(self) -> Self::IntoIter {
        self.users.iter()
    }
}

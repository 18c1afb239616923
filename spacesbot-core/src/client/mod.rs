//! Protocol client seam
//!
//! The traversal core and read-marker sweep only ever talk to the
//! homeserver through the traits in this module, so tests can substitute a
//! scripted client. `HttpClient` is the production implementation.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::rooms::{JoinedRoomSet, MessagePage, RoomId, SpaceQueryResult, SyncSnapshot};

mod error;
mod http;
pub mod mock;

pub use error::ClientError;
pub use http::HttpClient;

/// Membership operations: enumerate joined rooms and join new ones.
#[async_trait]
pub trait RoomMembership: Send + Sync {
    /// Fetch the set of rooms the account currently belongs to
    async fn joined_rooms(&self) -> Result<JoinedRoomSet, ClientError>;

    /// Join a room the homeserver already knows about
    async fn join(&self, room: &RoomId) -> Result<(), ClientError>;

    /// Join a room through federation, resolving it via the given server
    async fn join_via(&self, room: &RoomId, server_name: &str) -> Result<(), ClientError>;
}

/// Space-hierarchy queries: list the declared children of a space.
#[async_trait]
pub trait SpaceDirectory: Send + Sync {
    /// Query the rooms and sub-spaces declared as children of `room`
    async fn space_children(&self, room: &RoomId) -> Result<SpaceQueryResult, ClientError>;
}

/// Room history and read-marker operations.
#[async_trait]
pub trait ReadReceipts: Send + Sync {
    /// Page backward through a room's history from a pagination token
    async fn room_messages(
        &self,
        room: &RoomId,
        from: &str,
        limit: u32,
    ) -> Result<MessagePage, ClientError>;

    /// Advance the fully-read and read markers for a room
    async fn set_read_markers(
        &self,
        room: &RoomId,
        fully_read: &str,
        read: &str,
    ) -> Result<(), ClientError>;
}

/// Initial session sync.
#[async_trait]
pub trait SessionSync: Send + Sync {
    /// Perform one sync, returning the position token and per-room new
    /// timeline events
    async fn sync_once(&self, timeout: Duration) -> Result<SyncSnapshot, ClientError>;
}

/// Cosmetic profile operations; callers treat failures as non-fatal.
#[async_trait]
pub trait BotPresence: Send + Sync {
    /// Set the account's display name
    async fn set_display_name(&self, name: &str) -> Result<(), ClientError>;

    /// Set the account's presence state and status message
    async fn set_presence(&self, state: PresenceState, status_msg: &str)
        -> Result<(), ClientError>;
}

/// Presence states the protocol accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceState {
    Online,
    Offline,
    Unavailable,
}

impl PresenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::Online => "online",
            PresenceState::Offline => "offline",
            PresenceState::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Room and space-hierarchy data model
//!
//! Everything here is deserialized fresh from homeserver responses on every
//! query. Nothing is persisted between runs.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The `room_type` value that marks a room as a space container.
pub const SPACE_ROOM_TYPE: &str = "m.space";

/// Federation-qualified room identifier (`!localpart:server.name`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Create a RoomId from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        RoomId(id.into())
    }

    /// Get the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The server part of the identifier, used as the via hint when joining
    /// over federation.
    ///
    /// Returns everything after the first `:`. An identifier without a
    /// server part is rejected rather than producing an empty hint.
    pub fn server_name(&self) -> Result<&str, RoomIdError> {
        match self.0.split_once(':') {
            Some((_, server)) if !server.is_empty() => Ok(server),
            _ => Err(RoomIdError::MissingServerPart(self.0.clone())),
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        RoomId(id)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        RoomId(id.to_string())
    }
}

/// Room identifier errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomIdError {
    #[error("room id `{0}` has no server name part")]
    MissingServerPart(String),
}

/// A room or space discovered through a space-hierarchy query.
///
/// Only `room_id` and `room_type` drive traversal decisions; the remaining
/// fields are directory metadata carried through from the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,

    /// `m.space` marks a space container; anything else (including absent)
    /// is an ordinary room.
    #[serde(default)]
    pub room_type: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub topic: Option<String>,

    #[serde(default)]
    pub avatar_url: Option<String>,

    #[serde(default)]
    pub num_joined_members: u64,

    #[serde(default)]
    pub guest_can_join: bool,

    #[serde(default)]
    pub world_readable: bool,

    #[serde(default)]
    pub join_rules: Option<String>,

    /// Spaces allowed to reference this room, when restricted
    #[serde(default)]
    pub allowed_spaces: Option<Vec<RoomId>>,
}

impl Room {
    /// Create a room record with no directory metadata
    pub fn new(room_id: RoomId) -> Self {
        Room {
            room_id,
            room_type: None,
            name: None,
            topic: None,
            avatar_url: None,
            num_joined_members: 0,
            guest_can_join: false,
            world_readable: false,
            join_rules: None,
            allowed_spaces: None,
        }
    }

    /// Tag this record as a space container
    pub fn as_space(mut self) -> Self {
        self.room_type = Some(SPACE_ROOM_TYPE.to_string());
        self
    }

    /// Whether this room is a space container
    pub fn is_space(&self) -> bool {
        self.room_type.as_deref() == Some(SPACE_ROOM_TYPE)
    }
}

/// Response to a single space-hierarchy query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpaceQueryResult {
    /// Rooms and sub-spaces declared as children of the queried space
    pub rooms: Vec<Room>,

    /// Raw state events from the response; not used by traversal
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

/// Freshly fetched set of rooms the account currently belongs to.
///
/// Never cached across mutating calls: re-fetch after every join so
/// decisions are made against ground truth.
pub type JoinedRoomSet = HashSet<RoomId>;

/// A single timeline event, reduced to the fields the bot inspects.
///
/// `event_id` is optional: some history responses contain entries without
/// one, and callers are expected to skip those rather than fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(default)]
    pub event_id: Option<String>,

    #[serde(default, rename = "type")]
    pub event_type: Option<String>,

    #[serde(default)]
    pub sender: Option<String>,
}

impl TimelineEvent {
    /// Create an event with just an id, as tests and sync diffs use them
    pub fn with_id(event_id: impl Into<String>) -> Self {
        TimelineEvent {
            event_id: Some(event_id.into()),
            ..Default::default()
        }
    }
}

/// One page of room history from a backward pagination request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub start: Option<String>,

    /// Token for the next page; absent when the server has no more history
    #[serde(default)]
    pub end: Option<String>,

    #[serde(default)]
    pub chunk: Vec<TimelineEvent>,
}

/// Result of the initial sync: the position token to page from and the new
/// timeline events per joined room.
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
    pub next_batch: String,
    pub rooms: HashMap<RoomId, Vec<TimelineEvent>>,
}

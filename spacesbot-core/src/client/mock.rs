//! Scripted protocol client for testing
//!
//! Implements every client trait against in-memory state so traversal and
//! sweep logic can be exercised without a homeserver. Joins mutate the
//! joined set the way a real homeserver would, scripted failures consume
//! themselves, and every call is recorded in order for assertions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ClientError;
use super::{BotPresence, PresenceState, ReadReceipts, RoomMembership, SessionSync, SpaceDirectory};
use crate::rooms::{
    JoinedRoomSet, MessagePage, Room, RoomId, SpaceQueryResult, SyncSnapshot,
};

/// Record of one call made against the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    JoinedRooms,
    Join(RoomId),
    JoinVia(RoomId, String),
    SpaceChildren(RoomId),
    RoomMessages(RoomId, String),
    SetReadMarkers(RoomId, String, String),
    Sync,
    SetDisplayName(String),
    SetPresence(String, String),
}

#[derive(Default)]
struct MockState {
    joined: JoinedRoomSet,
    children: Vec<Room>,
    /// Children appended to the hierarchy once the key room has been joined
    unlocked: HashMap<RoomId, Vec<Room>>,
    /// Remaining scripted failures per room; a join attempt consumes one
    join_failures: HashMap<RoomId, u32>,
    fail_joined_rooms: bool,
    /// Scripted history pages per room, served in order then empty
    pages: HashMap<RoomId, Vec<MessagePage>>,
    fail_markers: bool,
    sync: SyncSnapshot,
    calls: Vec<MockCall>,
}

/// Scripted client for tests.
///
/// Clones share state, so tests can keep a handle for assertions after
/// handing the client to the code under test.
#[derive(Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark rooms as already joined
    pub fn with_joined(self, rooms: impl IntoIterator<Item = RoomId>) -> Self {
        self.state.lock().unwrap().joined.extend(rooms);
        self
    }

    /// Set the rooms returned by every space-hierarchy query
    pub fn with_children(self, rooms: Vec<Room>) -> Self {
        self.state.lock().unwrap().children = rooms;
        self
    }

    /// Append extra children to the hierarchy once `parent` has been joined
    pub fn unlock_after_join(self, parent: RoomId, rooms: Vec<Room>) -> Self {
        self.state.lock().unwrap().unlocked.insert(parent, rooms);
        self
    }

    /// Make the next `count` join attempts for `room` fail
    pub fn fail_joins(self, room: RoomId, count: u32) -> Self {
        self.state.lock().unwrap().join_failures.insert(room, count);
        self
    }

    /// Make every joined-rooms fetch fail
    pub fn fail_joined_rooms(self) -> Self {
        self.state.lock().unwrap().fail_joined_rooms = true;
        self
    }

    /// Script the history pages served for `room`, in order
    pub fn with_pages(self, room: RoomId, pages: Vec<MessagePage>) -> Self {
        self.state.lock().unwrap().pages.insert(room, pages);
        self
    }

    /// Make every read-marker update fail
    pub fn fail_markers(self) -> Self {
        self.state.lock().unwrap().fail_markers = true;
        self
    }

    /// Set the snapshot returned by the initial sync
    pub fn with_sync(self, sync: SyncSnapshot) -> Self {
        self.state.lock().unwrap().sync = sync;
        self
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Join and join-via calls made so far, in order
    pub fn join_calls(&self) -> Vec<MockCall> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::Join(_) | MockCall::JoinVia(..)))
            .cloned()
            .collect()
    }

    /// Current joined set
    pub fn joined(&self) -> JoinedRoomSet {
        self.state.lock().unwrap().joined.clone()
    }

    fn scripted_error() -> ClientError {
        ClientError::Api {
            status: 429,
            errcode: "M_LIMIT_EXCEEDED".to_string(),
            message: "scripted failure".to_string(),
        }
    }

    fn complete_join(state: &mut MockState, room: &RoomId) -> Result<(), ClientError> {
        if let Some(remaining) = state.join_failures.get_mut(room) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Self::scripted_error());
            }
        }
        state.joined.insert(room.clone());
        if let Some(more) = state.unlocked.remove(room) {
            state.children.extend(more);
        }
        Ok(())
    }
}

#[async_trait]
impl RoomMembership for MockClient {
    async fn joined_rooms(&self) -> Result<JoinedRoomSet, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::JoinedRooms);
        if state.fail_joined_rooms {
            return Err(ClientError::Api {
                status: 500,
                errcode: "M_UNKNOWN".to_string(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(state.joined.clone())
    }

    async fn join(&self, room: &RoomId) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Join(room.clone()));
        Self::complete_join(&mut state, room)
    }

    async fn join_via(&self, room: &RoomId, server_name: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(MockCall::JoinVia(room.clone(), server_name.to_string()));
        Self::complete_join(&mut state, room)
    }
}

#[async_trait]
impl SpaceDirectory for MockClient {
    async fn space_children(&self, room: &RoomId) -> Result<SpaceQueryResult, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::SpaceChildren(room.clone()));
        Ok(SpaceQueryResult {
            rooms: state.children.clone(),
            events: Vec::new(),
        })
    }
}

#[async_trait]
impl ReadReceipts for MockClient {
    async fn room_messages(
        &self,
        room: &RoomId,
        from: &str,
        _limit: u32,
    ) -> Result<MessagePage, ClientError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(MockCall::RoomMessages(room.clone(), from.to_string()));
        let page = state
            .pages
            .get_mut(room)
            .and_then(|pages| {
                if pages.is_empty() {
                    None
                } else {
                    Some(pages.remove(0))
                }
            })
            .unwrap_or_default();
        Ok(page)
    }

    async fn set_read_markers(
        &self,
        room: &RoomId,
        fully_read: &str,
        read: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::SetReadMarkers(
            room.clone(),
            fully_read.to_string(),
            read.to_string(),
        ));
        if state.fail_markers {
            return Err(Self::scripted_error());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionSync for MockClient {
    async fn sync_once(&self, _timeout: Duration) -> Result<SyncSnapshot, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::Sync);
        Ok(state.sync.clone())
    }
}

#[async_trait]
impl BotPresence for MockClient {
    async fn set_display_name(&self, name: &str) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::SetDisplayName(name.to_string()));
        Ok(())
    }

    async fn set_presence(
        &self,
        state_value: PresenceState,
        status_msg: &str,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall::SetPresence(
            state_value.as_str().to_string(),
            status_msg.to_string(),
        ));
        Ok(())
    }
}

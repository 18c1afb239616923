//! HTTP protocol client
//!
//! Thin reqwest wrapper over the handful of client-server endpoints the bot
//! uses. The session context (homeserver, account, token) is taken at
//! construction and never mutated afterwards.

use async_trait::async_trait;
use reqwest::{Response, Url};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

use super::error::ClientError;
use super::{BotPresence, PresenceState, ReadReceipts, RoomMembership, SessionSync, SpaceDirectory};
use crate::config::BotConfig;
use crate::rooms::{
    JoinedRoomSet, MessagePage, RoomId, SpaceQueryResult, SyncSnapshot, TimelineEvent,
};

/// Stable client-server API prefix
const CLIENT_API: &[&str] = &["_matrix", "client", "r0"];

/// Space-hierarchy endpoint prefix (MSC2946, pre-stabilization)
const SPACES_API: &[&str] = &["_matrix", "client", "unstable", "org.matrix.msc2946"];

/// Production protocol client over HTTP
pub struct HttpClient {
    http: reqwest::Client,
    homeserver: Url,
    user_id: String,
    access_token: Secret<String>,
}

impl HttpClient {
    /// Build a client from the bot configuration.
    ///
    /// Fails when the homeserver URL does not parse or cannot carry path
    /// segments.
    pub fn new(config: &BotConfig) -> Result<Self, ClientError> {
        let homeserver = Url::parse(&config.homeserver)
            .map_err(|e| ClientError::InvalidHomeserver(e.to_string()))?;
        if homeserver.cannot_be_a_base() {
            return Err(ClientError::InvalidHomeserver(format!(
                "{} cannot be used as an API base",
                config.homeserver
            )));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("spacesbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpClient {
            http,
            homeserver,
            user_id: config.user_id.clone(),
            access_token: Secret::new(config.access_token.clone()),
        })
    }

    /// Build an endpoint URL from path segments, percent-encoding each one
    fn endpoint(&self, prefix: &[&str], segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.homeserver.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidHomeserver(self.homeserver.to_string()))?;
            path.pop_if_empty();
            path.extend(prefix);
            path.extend(segments);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        decode(resp).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }

    async fn put_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .put(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }
}

/// Decode a response, mapping non-2xx statuses to `ClientError::Api`
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let parsed: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();
        return Err(ClientError::Api {
            status: status.as_u16(),
            errcode: parsed.errcode,
            message: parsed.error,
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| ClientError::MalformedResponse(e.to_string()))
}

/// Standard error body on non-success responses
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errcode: String,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct JoinedRoomsResponse {
    rooms: Vec<RoomId>,
}

#[derive(Debug, Deserialize)]
struct JoinResponse {
    #[allow(dead_code)]
    room_id: RoomId,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    next_batch: String,
    #[serde(default)]
    rooms: SyncRooms,
}

#[derive(Debug, Default, Deserialize)]
struct SyncRooms {
    #[serde(default)]
    join: HashMap<RoomId, JoinedRoomSync>,
}

#[derive(Debug, Default, Deserialize)]
struct JoinedRoomSync {
    #[serde(default)]
    timeline: SyncTimeline,
}

#[derive(Debug, Default, Deserialize)]
struct SyncTimeline {
    #[serde(default)]
    events: Vec<TimelineEvent>,
}

impl From<SyncResponse> for SyncSnapshot {
    fn from(resp: SyncResponse) -> Self {
        SyncSnapshot {
            next_batch: resp.next_batch,
            rooms: resp
                .rooms
                .join
                .into_iter()
                .map(|(room, sync)| (room, sync.timeline.events))
                .collect(),
        }
    }
}

#[async_trait]
impl RoomMembership for HttpClient {
    async fn joined_rooms(&self) -> Result<JoinedRoomSet, ClientError> {
        let url = self.endpoint(CLIENT_API, &["joined_rooms"])?;
        let resp: JoinedRoomsResponse = self.get_json(url).await?;
        Ok(resp.rooms.into_iter().collect())
    }

    async fn join(&self, room: &RoomId) -> Result<(), ClientError> {
        let url = self.endpoint(CLIENT_API, &["join", room.as_str()])?;
        let _: JoinResponse = self.post_json(url, &json!({})).await?;
        Ok(())
    }

    async fn join_via(&self, room: &RoomId, server_name: &str) -> Result<(), ClientError> {
        let mut url = self.endpoint(CLIENT_API, &["join", room.as_str()])?;
        url.query_pairs_mut().append_pair("server_name", server_name);
        let _: JoinResponse = self.post_json(url, &json!({})).await?;
        Ok(())
    }
}

#[async_trait]
impl SpaceDirectory for HttpClient {
    async fn space_children(&self, room: &RoomId) -> Result<SpaceQueryResult, ClientError> {
        let url = self.endpoint(SPACES_API, &["rooms", room.as_str(), "spaces"])?;
        self.get_json(url).await
    }
}

#[async_trait]
impl ReadReceipts for HttpClient {
    async fn room_messages(
        &self,
        room: &RoomId,
        from: &str,
        limit: u32,
    ) -> Result<MessagePage, ClientError> {
        let mut url = self.endpoint(CLIENT_API, &["rooms", room.as_str(), "messages"])?;
        url.query_pairs_mut()
            .append_pair("from", from)
            .append_pair("dir", "b")
            .append_pair("limit", &limit.to_string());
        self.get_json(url).await
    }

    async fn set_read_markers(
        &self,
        room: &RoomId,
        fully_read: &str,
        read: &str,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(CLIENT_API, &["rooms", room.as_str(), "read_markers"])?;
        let body = json!({ "m.fully_read": fully_read, "m.read": read });
        let _: serde_json::Value = self.post_json(url, &body).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionSync for HttpClient {
    async fn sync_once(&self, timeout: Duration) -> Result<SyncSnapshot, ClientError> {
        let mut url = self.endpoint(CLIENT_API, &["sync"])?;
        url.query_pairs_mut()
            .append_pair("timeout", &timeout.as_millis().to_string());
        let resp: SyncResponse = self.get_json(url).await?;
        Ok(resp.into())
    }
}

#[async_trait]
impl BotPresence for HttpClient {
    async fn set_display_name(&self, name: &str) -> Result<(), ClientError> {
        let url = self.endpoint(CLIENT_API, &["profile", &self.user_id, "displayname"])?;
        let _: serde_json::Value = self.put_json(url, &json!({ "displayname": name })).await?;
        Ok(())
    }

    async fn set_presence(
        &self,
        state: PresenceState,
        status_msg: &str,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(CLIENT_API, &["presence", &self.user_id, "status"])?;
        let body = json!({ "presence": state.as_str(), "status_msg": status_msg });
        let _: serde_json::Value = self.put_json(url, &body).await?;
        Ok(())
    }
}

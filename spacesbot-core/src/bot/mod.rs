//! Bot orchestration
//!
//! One run: announce the bot profile, sync once, join everything reachable
//! from the configured root space, then sweep read markers. The session is
//! never logged out — the access token stays valid only while logged in.

use tracing::{info, warn};

use crate::client::{
    BotPresence, ClientError, HttpClient, PresenceState, ReadReceipts, RoomMembership,
    SessionSync, SpaceDirectory,
};
use crate::config::BotConfig;
use crate::reader::{ReadMarkerStrategy, ReadMarkerSweep, SweepReport};
use crate::traversal::{SpaceWalker, TraversalReport};

/// What a completed run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub traversal: TraversalReport,
    pub sweep: SweepReport,
}

/// The spaces bot: joins a space tree and keeps the account's rooms read
pub struct SpacesBot<C = HttpClient> {
    config: BotConfig,
    client: C,
}

impl SpacesBot<HttpClient> {
    /// Build a bot with an HTTP client from the configuration
    pub fn new(config: BotConfig) -> Result<Self, ClientError> {
        let client = HttpClient::new(&config)?;
        Ok(SpacesBot { config, client })
    }
}

impl<C> SpacesBot<C>
where
    C: RoomMembership + SpaceDirectory + ReadReceipts + SessionSync + BotPresence,
{
    /// Build a bot over any client implementation
    pub fn with_client(config: BotConfig, client: C) -> Self {
        SpacesBot { config, client }
    }

    /// Run the bot once
    pub async fn run(&self) -> Result<RunSummary, ClientError> {
        // Profile updates are cosmetic; a failure is not worth aborting for.
        if let Err(e) = self
            .client
            .set_display_name(&self.config.presence.display_name)
            .await
        {
            warn!(error = %e, "failed to set display name");
        }
        if let Err(e) = self
            .client
            .set_presence(PresenceState::Unavailable, &self.config.presence.status_msg)
            .await
        {
            warn!(error = %e, "failed to set presence");
        }

        let snapshot = self.client.sync_once(self.config.reader.sync_timeout).await?;
        info!(rooms = snapshot.rooms.len(), "initial sync complete");

        let walker = SpaceWalker::new(&self.client, &self.config.traversal);
        let traversal = walker.ensure_space_joined(&self.config.root_space_id).await?;

        let sweep = ReadMarkerSweep::new(&self.client, &self.config.reader);
        let sweep = match self.config.reader.strategy {
            ReadMarkerStrategy::Paginate => sweep.paginate_and_mark(&snapshot.next_batch).await?,
            ReadMarkerStrategy::SyncDiff => sweep.mark_from_sync(&snapshot).await,
        };

        // Deliberately no logout here.
        Ok(RunSummary { traversal, sweep })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockCall, MockClient};
    use crate::rooms::{Room, RoomId, SyncSnapshot, TimelineEvent};
    use std::collections::HashMap;

    fn bot_config() -> BotConfig {
        let mut config = BotConfig::default();
        config.homeserver = "https://matrix.example.org".to_string();
        config.user_id = "@bot:example.org".to_string();
        config.access_token = "token".to_string();
        config.root_space_id = RoomId::new("!root:example.org");
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_announces_syncs_joins_and_sweeps() {
        let root = RoomId::new("!root:example.org");
        let leaf = RoomId::new("!b:example.org");
        let client = MockClient::new()
            .with_children(vec![
                Room::new(RoomId::new("!a:example.org")).as_space(),
                Room::new(leaf.clone()),
            ])
            .with_sync(SyncSnapshot {
                next_batch: "s0".to_string(),
                rooms: HashMap::new(),
            });
        let bot = SpacesBot::with_client(bot_config(), client);

        let summary = bot.run().await.unwrap();

        assert_eq!(summary.traversal.spaces_joined, 1);
        assert_eq!(summary.traversal.rooms_joined, 1);

        let calls = bot.client.calls();
        assert_eq!(
            calls[0],
            MockCall::SetDisplayName("spacesbot".to_string())
        );
        assert_eq!(
            calls[1],
            MockCall::SetPresence("unavailable".to_string(), "I am just a bot".to_string())
        );
        assert_eq!(calls[2], MockCall::Sync);
        assert!(bot.client.joined().contains(&root));
        assert!(bot.client.joined().contains(&leaf));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_sync_diff_strategy() {
        let room = RoomId::new("!a:example.org");
        let mut config = bot_config();
        config.reader.strategy = ReadMarkerStrategy::SyncDiff;

        let client = MockClient::new()
            .with_joined([config.root_space_id.clone()])
            .with_sync(SyncSnapshot {
                next_batch: "s0".to_string(),
                rooms: HashMap::from([(room.clone(), vec![TimelineEvent::with_id("$e1")])]),
            });
        let bot = SpacesBot::with_client(config, client);

        let summary = bot.run().await.unwrap();

        assert_eq!(summary.sweep.rooms_marked, 1);
        assert!(bot.client.calls().contains(&MockCall::SetReadMarkers(
            room,
            "$e1".to_string(),
            "$e1".to_string()
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_aborts_when_joined_rooms_unavailable() {
        let client = MockClient::new().fail_joined_rooms();
        let bot = SpacesBot::with_client(bot_config(), client);

        assert!(bot.run().await.is_err());
    }
}

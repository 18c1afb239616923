//! Space-tree join traversal
//!
//! Starting from a root space, repeatedly queries its declared children,
//! joins every sub-space that is not yet joined, and once no iteration
//! produces a new join, sweeps up the remaining leaf rooms. The hierarchy
//! endpoint returns the flattened tree below the root, so re-querying the
//! root is sufficient to see children unlocked by earlier joins.

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::{ClientError, RoomMembership, SpaceDirectory};
use crate::config::TraversalConfig;
use crate::metrics;
use crate::rooms::RoomId;

/// What a join attempt was targeting, for logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Space,
    Leaf,
}

impl JoinKind {
    fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Space => "space",
            JoinKind::Leaf => "leaf",
        }
    }
}

/// Outcome of one traversal run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalReport {
    /// Sub-spaces joined during the discovery loop
    pub spaces_joined: usize,

    /// Rooms joined during the leaf pass
    pub rooms_joined: usize,

    /// Rooms given up on after exhausting the join attempt budget
    pub abandoned: Vec<RoomId>,
}

/// Walks a space tree and joins everything reachable from its root.
///
/// Joined-set fetch failures abort the walk; individual join failures are
/// logged and retried on later iterations, bounded per room by
/// `max_join_attempts`.
pub struct SpaceWalker<'a, C> {
    client: &'a C,
    join_delay: Duration,
    max_join_attempts: u32,
}

impl<'a, C> SpaceWalker<'a, C>
where
    C: RoomMembership + SpaceDirectory,
{
    pub fn new(client: &'a C, config: &TraversalConfig) -> Self {
        SpaceWalker {
            client,
            join_delay: config.join_delay,
            max_join_attempts: config.max_join_attempts,
        }
    }

    /// Join the root space, every sub-space reachable from it, and finally
    /// all remaining leaf rooms.
    ///
    /// The session is left logged in: the access token is only valid while
    /// no logout is issued.
    pub async fn ensure_space_joined(
        &self,
        root: &RoomId,
    ) -> Result<TraversalReport, ClientError> {
        let mut report = TraversalReport::default();
        let mut attempts: HashMap<RoomId, u32> = HashMap::new();

        let joined = self.client.joined_rooms().await?;
        if !joined.contains(root) {
            info!(room = %root, "joining root space");
            // The root is the configured entry point; the homeserver can
            // resolve it without a via hint.
            if let Err(e) = self.client.join(root).await {
                warn!(room = %root, error = %e, "failed to join root space");
            }
            let joined = self.client.joined_rooms().await?;
            if !joined.contains(root) {
                warn!(room = %root, "root space still not joined, continuing with discovery");
            }
        }

        // Sub-space discovery: iterate until a pass attempts no join.
        loop {
            let children = self.client.space_children(root).await?;
            metrics::space_query();
            let joined = self.client.joined_rooms().await?;

            let mut progressed = false;
            let mut attempted_this_pass = HashSet::new();
            for room in children.rooms.iter().filter(|r| r.is_space()) {
                if joined.contains(&room.room_id)
                    || !attempted_this_pass.insert(room.room_id.clone())
                {
                    continue;
                }
                if self
                    .attempt_join(&room.room_id, JoinKind::Space, &mut attempts, &mut report)
                    .await
                {
                    progressed = true;
                }
            }

            if !progressed {
                debug!(room = %root, "no new sub-spaces, discovery complete");
                break;
            }
        }

        // Leaf pass: join everything still missing, regardless of type.
        let children = self.client.space_children(root).await?;
        metrics::space_query();
        let joined = self.client.joined_rooms().await?;

        let mut attempted_this_pass = HashSet::new();
        for room in &children.rooms {
            if joined.contains(&room.room_id) || !attempted_this_pass.insert(room.room_id.clone())
            {
                continue;
            }
            let kind = if room.is_space() {
                JoinKind::Space
            } else {
                JoinKind::Leaf
            };
            self.attempt_join(&room.room_id, kind, &mut attempts, &mut report)
                .await;
        }

        info!(
            spaces = report.spaces_joined,
            rooms = report.rooms_joined,
            abandoned = report.abandoned.len(),
            "space traversal finished"
        );
        Ok(report)
    }

    /// Try one via-join, honoring the per-room attempt budget.
    ///
    /// Returns whether a join call was actually attempted. Rooms whose
    /// identifier has no server part can never be joined and are abandoned
    /// on the spot.
    async fn attempt_join(
        &self,
        room: &RoomId,
        kind: JoinKind,
        attempts: &mut HashMap<RoomId, u32>,
        report: &mut TraversalReport,
    ) -> bool {
        let tries = attempts.entry(room.clone()).or_insert(0);
        if *tries >= self.max_join_attempts {
            return false;
        }
        *tries += 1;

        let outcome = match room.server_name() {
            Ok(via) => self.client.join_via(room, via).await,
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(()) => {
                info!(room = %room, kind = kind.as_str(), "joined");
                metrics::join_succeeded(kind.as_str());
                match kind {
                    JoinKind::Space => report.spaces_joined += 1,
                    JoinKind::Leaf => report.rooms_joined += 1,
                }
            }
            Err(e) => {
                warn!(room = %room, error = %e, "join failed");
                metrics::join_failed(kind.as_str());
                if e.is_malformed_room_id() {
                    *tries = self.max_join_attempts;
                }
                if *tries >= self.max_join_attempts {
                    warn!(room = %room, attempts = *tries, "giving up on room");
                    report.abandoned.push(room.clone());
                }
            }
        }

        // Give the remote side room to breathe between federation joins.
        sleep(self.join_delay).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockCall, MockClient};
    use crate::rooms::Room;

    fn walker_config() -> TraversalConfig {
        TraversalConfig {
            join_delay: Duration::from_secs(5),
            max_join_attempts: 3,
        }
    }

    fn space(id: &str) -> Room {
        Room::new(RoomId::new(id)).as_space()
    }

    fn leaf(id: &str) -> Room {
        Room::new(RoomId::new(id))
    }

    #[tokio::test(start_paused = true)]
    async fn test_joins_root_spaces_then_leaves_in_order() {
        let client = MockClient::new()
            .with_children(vec![space("!a:example.org"), leaf("!b:example.org")]);
        let walker = SpaceWalker::new(&client, &walker_config());
        let root = RoomId::new("!root:example.org");

        let report = walker.ensure_space_joined(&root).await.unwrap();

        assert_eq!(
            client.join_calls(),
            vec![
                MockCall::Join(root.clone()),
                MockCall::JoinVia(RoomId::new("!a:example.org"), "example.org".to_string()),
                MockCall::JoinVia(RoomId::new("!b:example.org"), "example.org".to_string()),
            ]
        );
        assert!(client.joined().contains(&root));
        assert!(client.joined().contains(&RoomId::new("!a:example.org")));
        assert!(client.joined().contains(&RoomId::new("!b:example.org")));
        assert_eq!(report.spaces_joined, 1);
        assert_eq!(report.rooms_joined, 1);
        assert!(report.abandoned.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_makes_no_joins() {
        let client = MockClient::new()
            .with_children(vec![space("!a:example.org"), leaf("!b:example.org")]);
        let root = RoomId::new("!root:example.org");

        let walker = SpaceWalker::new(&client, &walker_config());
        walker.ensure_space_joined(&root).await.unwrap();
        let joins_after_first = client.join_calls().len();

        let report = walker.ensure_space_joined(&root).await.unwrap();

        assert_eq!(client.join_calls().len(), joins_after_first);
        assert_eq!(report, TraversalReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nested_spaces_reach_fixed_point() {
        // !nested only appears in the hierarchy once !a has been joined.
        let client = MockClient::new()
            .with_children(vec![space("!a:example.org")])
            .unlock_after_join(
                RoomId::new("!a:example.org"),
                vec![space("!nested:example.org"), leaf("!deep:example.org")],
            );
        let walker = SpaceWalker::new(&client, &walker_config());
        let root = RoomId::new("!root:example.org");

        walker.ensure_space_joined(&root).await.unwrap();

        let joined = client.joined();
        assert!(joined.contains(&RoomId::new("!a:example.org")));
        assert!(joined.contains(&RoomId::new("!nested:example.org")));
        assert!(joined.contains(&RoomId::new("!deep:example.org")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlisted_room_is_never_joined() {
        let client = MockClient::new().with_children(vec![space("!a:example.org")]);
        let walker = SpaceWalker::new(&client, &walker_config());
        let root = RoomId::new("!root:example.org");

        walker.ensure_space_joined(&root).await.unwrap();

        let stranger = RoomId::new("!stranger:example.org");
        assert!(!client.joined().contains(&stranger));
        assert!(!client
            .join_calls()
            .iter()
            .any(|c| matches!(c, MockCall::JoinVia(room, _) if *room == stranger)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_child_joined_once() {
        let client = MockClient::new()
            .with_children(vec![leaf("!dup:example.org"), leaf("!dup:example.org")]);
        let walker = SpaceWalker::new(&client, &walker_config());
        let root = RoomId::new("!root:example.org");

        walker.ensure_space_joined(&root).await.unwrap();

        let dup = RoomId::new("!dup:example.org");
        let dup_joins = client
            .join_calls()
            .iter()
            .filter(|c| matches!(c, MockCall::JoinVia(room, _) if *room == dup))
            .count();
        assert_eq!(dup_joins, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_via_hint_is_room_server_part() {
        let client = MockClient::new().with_children(vec![space("!a:chat.example.net")]);
        let walker = SpaceWalker::new(&client, &walker_config());
        let root = RoomId::new("!root:example.org");

        walker.ensure_space_joined(&root).await.unwrap();

        assert!(client.join_calls().contains(&MockCall::JoinVia(
            RoomId::new("!a:chat.example.net"),
            "chat.example.net".to_string()
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_room_id_abandoned_without_join_call() {
        let client = MockClient::new().with_children(vec![leaf("!no-server-part")]);
        let walker = SpaceWalker::new(&client, &walker_config());
        let root = RoomId::new("!root:example.org");

        let report = walker.ensure_space_joined(&root).await.unwrap();

        assert_eq!(report.abandoned, vec![RoomId::new("!no-server-part")]);
        // No join call ever carries an empty via hint.
        assert!(!client
            .join_calls()
            .iter()
            .any(|c| matches!(c, MockCall::JoinVia(room, _) if room.as_str() == "!no-server-part")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_join_failure_hits_attempt_cap() {
        let flaky = RoomId::new("!flaky:example.org");
        let client = MockClient::new()
            .with_children(vec![space("!flaky:example.org")])
            .fail_joins(flaky.clone(), u32::MAX);
        let walker = SpaceWalker::new(&client, &walker_config());
        let root = RoomId::new("!root:example.org");

        let report = walker.ensure_space_joined(&root).await.unwrap();

        assert_eq!(report.abandoned, vec![flaky.clone()]);
        assert_eq!(report.spaces_joined, 0);
        let attempts = client
            .join_calls()
            .iter()
            .filter(|c| matches!(c, MockCall::JoinVia(room, _) if *room == flaky))
            .count();
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_join_failure_recovers() {
        let room = RoomId::new("!a:example.org");
        let client = MockClient::new()
            .with_children(vec![space("!a:example.org")])
            .fail_joins(room.clone(), 1);
        let walker = SpaceWalker::new(&client, &walker_config());
        let root = RoomId::new("!root:example.org");

        let report = walker.ensure_space_joined(&root).await.unwrap();

        assert!(client.joined().contains(&room));
        assert_eq!(report.spaces_joined, 1);
        assert!(report.abandoned.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_joined_rooms_failure_is_fatal() {
        let client = MockClient::new().fail_joined_rooms();
        let walker = SpaceWalker::new(&client, &walker_config());
        let root = RoomId::new("!root:example.org");

        let result = walker.ensure_space_joined(&root).await;

        assert!(matches!(result, Err(ClientError::Api { status: 500, .. })));
        assert!(client.join_calls().is_empty());
    }
}

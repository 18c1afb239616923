//! End-to-end bot run against a scripted client
//!
//! Exercises the public API the way the binary does: one `SpacesBot::run`
//! covering profile setup, sync, space traversal, and the read-marker
//! sweep, with call order and final membership asserted.

use std::collections::HashMap;

use spacesbot_core::client::mock::{MockCall, MockClient};
use spacesbot_core::config::BotConfig;
use spacesbot_core::reader::ReadMarkerStrategy;
use spacesbot_core::rooms::{MessagePage, Room, RoomId, SyncSnapshot, TimelineEvent};
use spacesbot_core::SpacesBot;

fn config() -> BotConfig {
    let mut config = BotConfig::default();
    config.homeserver = "https://matrix.example.org".to_string();
    config.user_id = "@bot:example.org".to_string();
    config.access_token = "token".to_string();
    config.root_space_id = RoomId::new("!root:example.org");
    config
}

#[tokio::test(start_paused = true)]
async fn full_run_joins_tree_and_marks_rooms_read() {
    let root = RoomId::new("!root:example.org");
    let sub_space = RoomId::new("!sub:example.org");
    let leaf = RoomId::new("!leaf:example.org");
    let nested_leaf = RoomId::new("!nested:example.org");

    let client = MockClient::new()
        .with_children(vec![
            Room::new(sub_space.clone()).as_space(),
            Room::new(leaf.clone()),
        ])
        // Joining the sub-space exposes its own child in the hierarchy.
        .unlock_after_join(sub_space.clone(), vec![Room::new(nested_leaf.clone())])
        .with_sync(SyncSnapshot {
            next_batch: "s0".to_string(),
            rooms: HashMap::new(),
        })
        .with_pages(
            leaf.clone(),
            vec![MessagePage {
                start: None,
                end: Some("t1".to_string()),
                chunk: vec![TimelineEvent::with_id("$latest")],
            }],
        );

    let handle = client.clone();
    let bot = SpacesBot::with_client(config(), client);
    let summary = bot.run().await.unwrap();

    assert_eq!(summary.traversal.spaces_joined, 1);
    assert_eq!(summary.traversal.rooms_joined, 2);
    assert!(summary.traversal.abandoned.is_empty());
    assert_eq!(summary.sweep.rooms_marked, 1);

    let joined = handle.joined();
    for room in [&root, &sub_space, &leaf, &nested_leaf] {
        assert!(joined.contains(room), "expected {room} to be joined");
    }

    assert!(handle.calls().contains(&MockCall::SetReadMarkers(
        leaf,
        "$latest".to_string(),
        "$latest".to_string()
    )));
}

#[tokio::test(start_paused = true)]
async fn rerun_is_idempotent() {
    let client = MockClient::new()
        .with_children(vec![
            Room::new(RoomId::new("!sub:example.org")).as_space(),
            Room::new(RoomId::new("!leaf:example.org")),
        ])
        .with_sync(SyncSnapshot {
            next_batch: "s0".to_string(),
            rooms: HashMap::new(),
        });

    let handle = client.clone();
    let bot = SpacesBot::with_client(config(), client);
    bot.run().await.unwrap();
    let joins_after_first = handle.join_calls().len();

    let summary = bot.run().await.unwrap();

    assert_eq!(handle.join_calls().len(), joins_after_first);
    assert_eq!(summary.traversal.spaces_joined, 0);
    assert_eq!(summary.traversal.rooms_joined, 0);
}

#[tokio::test(start_paused = true)]
async fn sync_diff_strategy_marks_synced_rooms() {
    let mut config = config();
    config.reader.strategy = ReadMarkerStrategy::SyncDiff;
    let room = RoomId::new("!busy:example.org");

    let client = MockClient::new()
        .with_joined([config.root_space_id.clone()])
        .with_sync(SyncSnapshot {
            next_batch: "s0".to_string(),
            rooms: HashMap::from([(
                room.clone(),
                vec![
                    TimelineEvent::with_id("$old"),
                    TimelineEvent::with_id("$new"),
                ],
            )]),
        });

    let handle = client.clone();
    let bot = SpacesBot::with_client(config, client);
    let summary = bot.run().await.unwrap();

    assert_eq!(summary.sweep.rooms_marked, 1);
    let markers: Vec<_> = handle
        .calls()
        .into_iter()
        .filter(|c| matches!(c, MockCall::SetReadMarkers(..)))
        .collect();
    assert_eq!(
        markers.last(),
        Some(&MockCall::SetReadMarkers(
            room,
            "$new".to_string(),
            "$new".to_string()
        ))
    );
}

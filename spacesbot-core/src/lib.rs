//! spacesbot-core
//!
//! Library behind the spacesbot binary: a one-shot Matrix automation agent
//! that joins every room reachable from a root space and advances read
//! markers across the account's rooms.
//!
//! The interesting piece is [`traversal::SpaceWalker`], which runs the
//! space-tree join traversal against any client implementing the traits in
//! [`client`]. Everything else is plumbing: the HTTP client, the
//! read-marker sweep, configuration, logging, and metrics.

pub mod bot;
pub mod client;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod reader;
pub mod rooms;
pub mod traversal;

pub use bot::{RunSummary, SpacesBot};
pub use client::{
    BotPresence, ClientError, HttpClient, PresenceState, ReadReceipts, RoomMembership,
    SessionSync, SpaceDirectory,
};
pub use config::BotConfig;
pub use reader::{ReadMarkerStrategy, ReadMarkerSweep, SweepReport};
pub use rooms::{JoinedRoomSet, Room, RoomId, SpaceQueryResult, SPACE_ROOM_TYPE};
pub use traversal::{SpaceWalker, TraversalReport};

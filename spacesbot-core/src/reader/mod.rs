//! Read-marker bookkeeping
//!
//! After a traversal run the bot account is a member of every reachable
//! room; this module advances the read markers so the account does not
//! accumulate unread noise. Two strategies exist: paging backward through
//! each room's history until the terminal event stops changing, or marking
//! the rooms that had new timeline events in the initial sync.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ReadReceipts, RoomMembership};
use crate::config::ReaderConfig;
use crate::metrics;
use crate::rooms::{RoomId, SyncSnapshot};

/// Which read-marker strategy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMarkerStrategy {
    /// Page through each room's history and mark the last seen event
    Paginate,
    /// Mark the events delivered by the initial sync
    SyncDiff,
}

impl ReadMarkerStrategy {
    /// Parse a strategy name as used in configuration
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paginate" => Some(ReadMarkerStrategy::Paginate),
            "sync_diff" => Some(ReadMarkerStrategy::SyncDiff),
            _ => None,
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rooms whose read marker was advanced
    pub rooms_marked: usize,

    /// Rooms skipped because they had no markable event or kept failing
    pub rooms_skipped: usize,
}

/// Advances read markers across every joined room.
///
/// Per-room failures are logged and the sweep moves on; only a failure to
/// enumerate joined rooms aborts it.
pub struct ReadMarkerSweep<'a, C> {
    client: &'a C,
    page_limit: u32,
    page_delay: Duration,
    room_delay: Duration,
}

impl<'a, C> ReadMarkerSweep<'a, C>
where
    C: RoomMembership + ReadReceipts,
{
    pub fn new(client: &'a C, config: &ReaderConfig) -> Self {
        ReadMarkerSweep {
            client,
            page_limit: config.page_limit,
            page_delay: config.page_delay,
            room_delay: config.room_delay,
        }
    }

    /// Page backward through history for every joined room, starting at the
    /// sync position, and set both markers to the last event seen.
    pub async fn paginate_and_mark(&self, from_token: &str) -> Result<SweepReport, ClientError> {
        let joined = self.client.joined_rooms().await?;
        let mut report = SweepReport::default();

        for room in &joined {
            debug!(room = %room, "sweeping room history");
            if self.sweep_room(room, from_token).await {
                report.rooms_marked += 1;
                sleep(self.room_delay).await;
            } else {
                report.rooms_skipped += 1;
            }
        }

        info!(
            marked = report.rooms_marked,
            skipped = report.rooms_skipped,
            "read-marker sweep finished"
        );
        Ok(report)
    }

    /// Returns whether the room's marker was set
    async fn sweep_room(&self, room: &RoomId, from: &str) -> bool {
        let mut page = match self.client.room_messages(room, from, self.page_limit).await {
            Ok(page) => page,
            Err(e) => {
                warn!(room = %room, error = %e, "history fetch failed, skipping room");
                return false;
            }
        };

        let mut last_event_id: Option<String> = None;
        while !page.chunk.is_empty() {
            sleep(self.page_delay).await;

            match page.chunk.last().and_then(|e| e.event_id.clone()) {
                // Same terminal event twice in a row: history exhausted.
                Some(id) if last_event_id.as_deref() == Some(id.as_str()) => break,
                Some(id) => last_event_id = Some(id),
                None => {
                    warn!(room = %room, "terminal event in page has no event id");
                }
            }

            let Some(next) = page.end.clone() else { break };
            page = match self.client.room_messages(room, &next, self.page_limit).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(room = %room, error = %e, "pagination failed, marking what was seen");
                    break;
                }
            };
        }

        let Some(last) = last_event_id else {
            debug!(room = %room, "no markable event found");
            return false;
        };

        match self.client.set_read_markers(room, &last, &last).await {
            Ok(()) => {
                info!(room = %room, event = %last, "read marker set");
                metrics::read_marker_set();
                true
            }
            Err(e) => {
                warn!(room = %room, error = %e, "failed to set read marker");
                false
            }
        }
    }

    /// Mark the events the initial sync delivered, room by room.
    ///
    /// Markers overwrite idempotently, so the last event of each room wins.
    pub async fn mark_from_sync(&self, snapshot: &SyncSnapshot) -> SweepReport {
        let mut report = SweepReport::default();

        for (room, events) in &snapshot.rooms {
            let mut marked = false;
            for event in events {
                let Some(id) = &event.event_id else {
                    warn!(room = %room, "sync event has no event id");
                    continue;
                };
                match self.client.set_read_markers(room, id, id).await {
                    Ok(()) => marked = true,
                    Err(e) => {
                        warn!(room = %room, error = %e, "failed to set read marker");
                    }
                }
            }
            if marked {
                metrics::read_marker_set();
                report.rooms_marked += 1;
            } else {
                report.rooms_skipped += 1;
            }
        }

        info!(
            marked = report.rooms_marked,
            skipped = report.rooms_skipped,
            "sync-diff sweep finished"
        );
        report
    }
}

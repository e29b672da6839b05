use dashmap::DashMap;
use pollcast_core::{PollId, PollSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::rooms::{ConnectionId, RoomRegistry};

/// Event pushed from the server to a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A vote was accepted; `poll` is the state right after it.
    VoteUpdated {
        /// The new poll state.
        poll: PollSnapshot,
    },
    /// The viewer sent something the server could not act on.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Outcome of one [`Broadcaster::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Viewers the snapshot was queued for.
    pub delivered: usize,
    /// Viewers whose queue was full.
    pub dropped: usize,
    /// Viewers found disconnected and removed.
    pub reaped: usize,
    /// The room had already seen a later state; nothing was sent.
    pub stale: bool,
}

/// Fans poll snapshots out to the connections viewing each poll.
///
/// Every connection gets a bounded queue. Publishing never waits: a full
/// queue loses that one event for that viewer, and a closed queue removes
/// the connection. Within a room, snapshots are delivered in increasing
/// vote-total order; an older snapshot arriving after a newer one is skipped.
pub struct Broadcaster {
    connections: DashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    rooms: RoomRegistry,
    queue_capacity: usize,
}

impl Broadcaster {
    /// A broadcaster giving each connection a queue of `queue_capacity` events.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            rooms: RoomRegistry::new(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Room membership.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Register a new viewer connection.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.connections.insert(id, tx);
        debug!(conn = %id, "viewer connected");
        (id, rx)
    }

    /// Forget a connection and remove it from every room.
    pub fn disconnect(&self, id: ConnectionId) {
        self.connections.remove(&id);
        let left = self.rooms.leave_all(id);
        debug!(conn = %id, rooms = left, "viewer disconnected");
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send `snapshot` to every member of the room for `poll`.
    ///
    /// Per-viewer failures are counted in the report, never returned.
    pub fn publish(&self, poll: PollId, snapshot: &PollSnapshot) -> PublishReport {
        let total = snapshot.total_votes();
        let mut report = PublishReport::default();
        let mut closed = Vec::new();

        self.rooms.with_room(poll, |room| {
            if room.watermark.is_some_and(|seen| total <= seen) {
                report.stale = true;
                return;
            }
            room.watermark = Some(total);

            for conn in &room.members {
                let Some(tx) = self.connections.get(conn) else {
                    closed.push(*conn);
                    continue;
                };
                let event = ServerEvent::VoteUpdated {
                    poll: snapshot.clone(),
                };
                match tx.try_send(event) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        report.dropped += 1;
                        warn!(%poll, conn = %conn, "viewer queue full, update dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*conn),
                }
            }
        });

        for conn in closed {
            self.disconnect(conn);
            report.reaped += 1;
        }

        if report.stale {
            debug!(%poll, total, "stale snapshot skipped");
        }
        report
    }
}

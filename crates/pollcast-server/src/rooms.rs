use std::collections::HashSet;
use std::fmt;

use dashmap::DashMap;
use pollcast_core::PollId;
use uuid::Uuid;

/// Identifier of one live viewer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// A fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Connections viewing one poll, plus the highest vote total already
/// delivered to them.
#[derive(Debug, Default)]
pub(crate) struct Room {
    pub(crate) members: HashSet<ConnectionId>,
    pub(crate) watermark: Option<u64>,
}

/// Poll id → viewing connections. Purely in memory.
///
/// Join and leave are idempotent. A room disappears with its last member.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<PollId, Room>,
}

impl RoomRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to the room for `poll`. Returns `false` if it was already there.
    pub fn join(&self, poll: PollId, conn: ConnectionId) -> bool {
        self.rooms.entry(poll).or_default().members.insert(conn)
    }

    /// Remove `conn` from the room for `poll`. Returns `false` if it was not a member.
    pub fn leave(&self, poll: PollId, conn: ConnectionId) -> bool {
        let removed = match self.rooms.get_mut(&poll) {
            Some(mut room) => room.members.remove(&conn),
            None => return false,
        };
        self.rooms.remove_if(&poll, |_, room| room.members.is_empty());
        removed
    }

    /// Remove `conn` from every room. Returns how many rooms it left.
    pub fn leave_all(&self, conn: ConnectionId) -> usize {
        let mut left = 0;
        self.rooms.retain(|_, room| {
            if room.members.remove(&conn) {
                left += 1;
            }
            !room.members.is_empty()
        });
        left
    }

    /// Current members of the room for `poll`, in no particular order.
    pub fn members_of(&self, poll: PollId) -> Vec<ConnectionId> {
        self.rooms
            .get(&poll)
            .map(|room| room.members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of members in the room for `poll`.
    pub fn member_count(&self, poll: PollId) -> usize {
        self.rooms.get(&poll).map_or(0, |room| room.members.len())
    }

    /// Run `f` on the room for `poll` while holding it exclusively.
    pub(crate) fn with_room<R>(&self, poll: PollId, f: impl FnOnce(&mut Room) -> R) -> Option<R> {
        self.rooms.get_mut(&poll).map(|mut room| f(&mut room))
    }
}

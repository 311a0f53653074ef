use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt,
};

use utils::relay_msg::RoomKey;

/// Opaque handle of one live socket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Membership {
    /// Id of the `user-<id>` room the connection joined, if any.
    user_id: Option<String>,
    rooms: HashSet<RoomKey>,
}

/// Room membership of every live connection, indexed both ways.
///
/// Rooms exist only while they have members: the last `leave` (or the
/// disconnect of the last member) drops the room entry.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomKey, BTreeSet<ConnectionId>>,
    connections: HashMap<ConnectionId, Membership>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `connection` to `room`. Returns `false` if it was already a member.
    ///
    /// A connection belongs to at most one user room, so joining a user room
    /// moves the connection out of any other user room first.
    pub fn join(&mut self, connection: ConnectionId, room: RoomKey) -> bool {
        if let RoomKey::User(user_id) = &room {
            let previous = self
                .connections
                .get(&connection)
                .and_then(|m| m.user_id.clone())
                .filter(|previous| previous != user_id);
            if let Some(previous) = previous {
                tracing::debug!(
                    connection_id = %connection,
                    from = %previous,
                    to = %user_id,
                    "Connection switched user room"
                );
                self.leave(connection, &RoomKey::User(previous));
            }
        }

        let membership = self.connections.entry(connection).or_default();
        if let RoomKey::User(user_id) = &room {
            membership.user_id = Some(user_id.clone());
        }
        if !membership.rooms.insert(room.clone()) {
            return false;
        }
        self.rooms.entry(room).or_default().insert(connection);
        true
    }

    /// Removes `connection` from `room`. Returns `false` if it was not a member.
    pub fn leave(&mut self, connection: ConnectionId, room: &RoomKey) -> bool {
        let Some(membership) = self.connections.get_mut(&connection) else {
            return false;
        };
        if !membership.rooms.remove(room) {
            return false;
        }
        if room.is_user_room() {
            membership.user_id = None;
        }
        if membership.rooms.is_empty() {
            self.connections.remove(&connection);
        }
        self.remove_member(room, connection);
        true
    }

    /// Drops every membership of `connection`, returning the rooms it left.
    pub fn on_disconnect(&mut self, connection: ConnectionId) -> Vec<RoomKey> {
        let Some(membership) = self.connections.remove(&connection) else {
            return Vec::new();
        };
        let mut left: Vec<RoomKey> = membership.rooms.into_iter().collect();
        left.sort();
        for room in &left {
            self.remove_member(room, connection);
        }
        left
    }

    /// Current members of `room`, empty if nobody joined it.
    pub fn members_of(&self, room: &RoomKey) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, connection: ConnectionId) -> Vec<RoomKey> {
        let mut rooms: Vec<RoomKey> = self
            .connections
            .get(&connection)
            .map(|m| m.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// User id announced by the connection's `join-user-room`, if any.
    pub fn user_of(&self, connection: ConnectionId) -> Option<&str> {
        self.connections
            .get(&connection)
            .and_then(|m| m.user_id.as_deref())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_member(&mut self, room: &RoomKey, connection: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&connection);
            if members.is_empty() {
                self.rooms.remove(room);
                tracing::debug!(room = %room, "Room emptied");
            }
        }
    }
}

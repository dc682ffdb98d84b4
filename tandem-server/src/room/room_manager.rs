use crate::room::Room;
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{ConnectionId, SignalEvent, SignalMessage};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The connection became a member; `notified` peers got `peer-joined`.
    Joined { notified: usize },
    /// The connection was already in this room. It is acknowledged again but
    /// nobody else is notified.
    AlreadyMember,
    Rejected(JoinRejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    EmptyRoomId,
    RoomFull,
}

/// Transient index of which connection sits in which room.
///
/// Both maps are sharded (`DashMap`), so joins, leaves and relays from many
/// connection tasks run concurrently. No guard is held while output is sent.
#[derive(Clone)]
pub struct RoomManager {
    rooms: Arc<DashMap<String, Room>>,
    memberships: Arc<DashMap<ConnectionId, String>>,
    signaling: Arc<dyn SignalingOutput>,
    max_members: Option<usize>,
}

impl RoomManager {
    pub fn new(signaling: Arc<dyn SignalingOutput>, max_members: Option<usize>) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            memberships: Arc::new(DashMap::new()),
            signaling,
            max_members: max_members.filter(|max| *max > 0),
        }
    }

    /// Seats the connection in `room_id`, leaving its previous room only once
    /// the new seat is secured. A rejected switch keeps the old membership.
    pub async fn join(&self, connection_id: ConnectionId, room_id: &str) -> JoinOutcome {
        if room_id.is_empty() {
            warn!("Rejecting join with empty room id from {}", connection_id);
            return JoinOutcome::Rejected(JoinRejection::EmptyRoomId);
        }

        let current = self.room_of(&connection_id);
        if current.as_deref() == Some(room_id) {
            debug!("{} is already in room '{}'", connection_id, room_id);
            self.signaling
                .send_signal(connection_id, SignalMessage::Joined)
                .await;
            return JoinOutcome::AlreadyMember;
        }

        // No await until both indexes agree on the new membership.
        let others = {
            let mut room = self.rooms.entry(room_id.to_string()).or_default();

            if let Some(max) = self.max_members
                && room.len() >= max
            {
                None
            } else {
                room.insert(connection_id);
                Some(room.others(&connection_id))
            }
        };

        let Some(others) = others else {
            warn!(
                "Room '{}' is full, rejecting {}",
                room_id, connection_id
            );
            self.signaling
                .send_signal(connection_id, SignalMessage::RoomFull)
                .await;
            return JoinOutcome::Rejected(JoinRejection::RoomFull);
        };

        let left = self.detach(connection_id);
        self.memberships.insert(connection_id, room_id.to_string());
        info!(
            "{} joined room '{}' ({} other member(s))",
            connection_id,
            room_id,
            others.len()
        );

        if let Some((previous, remaining)) = left {
            info!("{} left room '{}'", connection_id, previous);
            self.notify_left(&remaining).await;
        }
        for other in &others {
            self.signaling
                .send_signal(*other, SignalMessage::PeerJoined)
                .await;
        }
        self.signaling
            .send_signal(connection_id, SignalMessage::Joined)
            .await;

        JoinOutcome::Joined {
            notified: others.len(),
        }
    }

    /// Forwards `frame` verbatim to every other member of `room_id`.
    ///
    /// Returns how many connections it was delivered to. Frames from
    /// connections that are not members of `room_id` are dropped.
    pub async fn relay(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        event: SignalEvent,
        frame: &str,
    ) -> usize {
        if !event.is_relayed() {
            warn!("Refusing to relay {:?} from {}", event, connection_id);
            return 0;
        }

        let others = match self.rooms.get(room_id) {
            Some(room) if room.contains(&connection_id) => room.others(&connection_id),
            Some(_) => {
                debug!(
                    "Dropping {:?} from {}: not a member of room '{}'",
                    event, connection_id, room_id
                );
                return 0;
            }
            None => {
                debug!(
                    "Dropping {:?} from {}: room '{}' does not exist",
                    event, connection_id, room_id
                );
                return 0;
            }
        };

        for other in &others {
            self.signaling.forward(*other, frame.to_owned()).await;
        }

        debug!(
            "Relayed {:?} from {} to {} peer(s) in '{}'",
            event,
            connection_id,
            others.len(),
            room_id
        );
        others.len()
    }

    /// Removes the connection from its room, if any, and tells the remaining
    /// members with `peer-left`. Returns the room it left.
    pub async fn leave(&self, connection_id: ConnectionId) -> Option<String> {
        let (room_id, remaining) = self.detach(connection_id)?;
        info!("{} left room '{}'", connection_id, room_id);
        self.notify_left(&remaining).await;
        Some(room_id)
    }

    /// Drops the membership without notifying anyone. Returns the room and
    /// whoever is still in it.
    fn detach(&self, connection_id: ConnectionId) -> Option<(String, Vec<ConnectionId>)> {
        let (_, room_id) = self.memberships.remove(&connection_id)?;

        let remaining = match self.rooms.get_mut(&room_id) {
            Some(mut room) => {
                room.remove(&connection_id);
                room.members().to_vec()
            }
            None => Vec::new(),
        };

        if self.rooms.remove_if(&room_id, |_, room| room.is_empty()).is_some() {
            info!("Room '{}' is empty, dropping it", room_id);
        }

        Some((room_id, remaining))
    }

    async fn notify_left(&self, remaining: &[ConnectionId]) {
        for other in remaining {
            self.signaling
                .send_signal(*other, SignalMessage::PeerLeft)
                .await;
        }
    }

    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.members().to_vec())
            .unwrap_or_default()
    }

    pub fn room_of(&self, connection_id: &ConnectionId) -> Option<String> {
        self.memberships
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

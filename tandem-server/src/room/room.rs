use tandem_core::ConnectionId;

/// Membership set of one room, kept in join order.
///
/// A room has no identity of its own beyond this set: the manager creates it on
/// the first join and drops it as soon as it is empty.
#[derive(Debug, Default)]
pub struct Room {
    members: Vec<ConnectionId>,
}

impl Room {
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members.contains(connection_id)
    }

    /// Returns `false` if the connection was already a member.
    pub fn insert(&mut self, connection_id: ConnectionId) -> bool {
        if self.contains(&connection_id) {
            return false;
        }
        self.members.push(connection_id);
        true
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != connection_id);
        self.members.len() != before
    }

    /// Every member except `connection_id`.
    pub fn others(&self, connection_id: &ConnectionId) -> Vec<ConnectionId> {
        self.members
            .iter()
            .filter(|m| *m != connection_id)
            .copied()
            .collect()
    }

    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

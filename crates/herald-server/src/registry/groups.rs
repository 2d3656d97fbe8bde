//! Dynamic group membership (teams, departments, named rooms).
//!
//! Joins are not authorized: any admitted connection may join any group.

use herald_core::{ConnectionId, GroupKey};
use tracing::debug;

use super::ConnectionRegistry;

/// Membership change on a connection the registry does not know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MembershipError {
    /// The connection closed (or never registered).
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),
}

impl ConnectionRegistry {
    /// Add a registered connection to `group`.
    ///
    /// `Ok(false)` if it was already a member.
    pub fn join(&self, id: &ConnectionId, group: &GroupKey) -> Result<bool, MembershipError> {
        let key = group.key();
        let mut state = self.state.write();
        if !state.connections.contains_key(id) {
            return Err(MembershipError::NotRegistered(id.clone()));
        }
        let added = state.add_to_group(id, key.clone());
        debug!(conn_id = %id, group = %key, added, "join group");
        Ok(added)
    }

    /// Remove a registered connection from `group`.
    ///
    /// `Ok(false)` if it was not a member.
    pub fn leave(&self, id: &ConnectionId, group: &GroupKey) -> Result<bool, MembershipError> {
        let key = group.key();
        let mut state = self.state.write();
        if !state.connections.contains_key(id) {
            return Err(MembershipError::NotRegistered(id.clone()));
        }
        let removed = state.remove_from_group(id, &key);
        debug!(conn_id = %id, group = %key, removed, "leave group");
        Ok(removed)
    }

    /// Whether `id` is a member of `group`.
    pub fn is_member(&self, id: &ConnectionId, group: &GroupKey) -> bool {
        self.state
            .read()
            .connections
            .get(id)
            .is_some_and(|entry| entry.groups.contains(&group.key()))
    }
}

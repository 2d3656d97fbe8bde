//! In-memory index of live connections.
//!
//! One lock guards the user index, the group index and each connection's
//! own group list together, so a disconnect removes a handle from every
//! index in a single step. Dispatch takes read-locked snapshots and sends
//! outside the lock; a handle that closes after the snapshot just fails its
//! `send`.

pub mod groups;

use std::collections::{BTreeSet, HashMap};

use herald_core::{ConnectionId, GroupKey};
use parking_lot::RwLock;
use tracing::debug;

use crate::connection::ConnectionHandle;

pub use groups::MembershipError;

type Members = HashMap<ConnectionId, ConnectionHandle>;

/// Registered connection plus the group keys it is indexed under.
struct Entry {
    handle: ConnectionHandle,
    groups: BTreeSet<String>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, Entry>,
    by_user: HashMap<String, Members>,
    groups: HashMap<String, Members>,
}

impl RegistryState {
    fn add_to_group(&mut self, id: &ConnectionId, key: String) -> bool {
        let Some(entry) = self.connections.get_mut(id) else {
            return false;
        };
        if !entry.groups.insert(key.clone()) {
            return false;
        }
        let handle = entry.handle.clone();
        let _ = self.groups.entry(key).or_default().insert(id.clone(), handle);
        true
    }

    fn remove_from_group(&mut self, id: &ConnectionId, key: &str) -> bool {
        let Some(entry) = self.connections.get_mut(id) else {
            return false;
        };
        if !entry.groups.remove(key) {
            return false;
        }
        remove_member(&mut self.groups, key, id);
        true
    }
}

/// Remove `id` from the member set at `key`, dropping the set once empty.
fn remove_member(index: &mut HashMap<String, Members>, key: &str, id: &ConnectionId) {
    if let Some(members) = index.get_mut(key) {
        let _ = members.remove(id);
        if members.is_empty() {
            let _ = index.remove(key);
        }
    }
}

/// Live connections indexed by user id and by group.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection under its user id and seed its default groups
    /// (`user:`, `employee:`, `role:`).
    ///
    /// Returns `false` if the connection was already registered; nothing
    /// changes in that case.
    pub fn register(&self, handle: ConnectionHandle) -> bool {
        let id = handle.id.clone();
        let user_id = handle.user_id().to_string();
        let defaults = handle.identity.default_groups();

        let mut state = self.state.write();
        if state.connections.contains_key(&id) {
            return false;
        }
        let _ = state
            .by_user
            .entry(user_id.clone())
            .or_default()
            .insert(id.clone(), handle.clone());
        let _ = state.connections.insert(
            id.clone(),
            Entry {
                handle,
                groups: BTreeSet::new(),
            },
        );
        for group in defaults {
            let _ = state.add_to_group(&id, group.key());
        }
        debug!(conn_id = %id, user_id, total = state.connections.len(), "connection registered");
        true
    }

    /// Remove a connection from the user index and every group.
    ///
    /// Returns `false` if it was not registered (a repeated call is a no-op).
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let mut state = self.state.write();
        let Some(entry) = state.connections.remove(id) else {
            return false;
        };
        let user_id = entry.handle.user_id();
        remove_member(&mut state.by_user, user_id, id);
        for key in &entry.groups {
            remove_member(&mut state.groups, key, id);
        }
        debug!(
            conn_id = %id,
            user_id,
            groups = entry.groups.len(),
            total = state.connections.len(),
            "connection unregistered"
        );
        true
    }

    /// Every open connection of `user_id` (possibly none).
    pub fn sockets_for(&self, user_id: &str) -> Vec<ConnectionHandle> {
        self.state
            .read()
            .by_user
            .get(user_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Members of `group` at this instant (possibly none).
    pub fn group_members(&self, group: &GroupKey) -> Vec<ConnectionHandle> {
        self.members_of(&group.key())
    }

    /// Members of the group indexed under `key`.
    pub fn members_of(&self, key: &str) -> Vec<ConnectionHandle> {
        self.state
            .read()
            .groups
            .get(key)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every registered connection.
    pub fn all_connections(&self) -> Vec<ConnectionHandle> {
        self.state
            .read()
            .connections
            .values()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.state.read().connections.contains_key(id)
    }

    /// Group keys `id` is currently indexed under, sorted.
    pub fn groups_of(&self, id: &ConnectionId) -> Vec<String> {
        self.state
            .read()
            .connections
            .get(id)
            .map(|entry| entry.groups.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.state.read().connections.len()
    }

    /// Number of distinct user ids with at least one open connection.
    pub fn unique_users(&self) -> usize {
        self.state.read().by_user.len()
    }

    /// Number of non-empty groups.
    pub fn group_count(&self) -> usize {
        self.state.read().groups.len()
    }

    /// Up to `limit` non-empty group keys, sorted.
    pub fn group_names(&self, limit: usize) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().groups.keys().cloned().collect();
        names.sort_unstable();
        names.truncate(limit);
        names
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::connection::ClientConnection;
    use herald_core::Identity;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    pub(crate) fn connect(
        identity: Identity,
    ) -> (ConnectionHandle, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(16);
        (Arc::new(ClientConnection::new(identity, tx)), rx)
    }

    #[test]
    fn register_indexes_user_and_default_groups() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connect(
            Identity::new("u1")
                .with_employee_id("EMP001")
                .with_roles(["manager"]),
        );
        assert!(registry.register(conn.clone()));

        assert_eq!(registry.sockets_for("u1").len(), 1);
        assert_eq!(
            registry.groups_of(&conn.id),
            vec!["employee:EMP001", "role:manager", "user:u1"]
        );
        assert_eq!(registry.group_members(&GroupKey::Role("manager".into())).len(), 1);
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.unique_users(), 1);
    }

    #[test]
    fn register_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connect(Identity::new("u1"));
        assert!(registry.register(conn.clone()));
        assert!(!registry.register(conn));
        assert_eq!(registry.sockets_for("u1").len(), 1);
        assert_eq!(registry.connection_count(), 1);
    }

    #[test]
    fn multi_device_user() {
        let registry = ConnectionRegistry::new();
        let conns: Vec<_> = (0..3).map(|_| connect(Identity::new("u1"))).collect();
        for (conn, _) in &conns {
            let _ = registry.register(conn.clone());
        }
        let live_ids = |user: &str| -> BTreeSet<ConnectionId> {
            registry.sockets_for(user).iter().map(|c| c.id.clone()).collect()
        };
        let registered: BTreeSet<_> = conns.iter().map(|(c, _)| c.id.clone()).collect();
        assert_eq!(registry.sockets_for("u1").len(), 3);
        assert_eq!(live_ids("u1"), registered);
        assert_eq!(registry.unique_users(), 1);

        assert!(registry.unregister(&conns[0].0.id));
        let remaining: BTreeSet<_> = conns[1..].iter().map(|(c, _)| c.id.clone()).collect();
        assert_eq!(live_ids("u1"), remaining);
        assert_eq!(registry.connection_count(), 2);
    }

    #[test]
    fn unregister_twice_is_noop() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connect(Identity::new("u1"));
        let _ = registry.register(conn.clone());
        assert!(registry.unregister(&conn.id));
        assert!(!registry.unregister(&conn.id));
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn unregister_removes_every_index_entry() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = connect(Identity::new("u1").with_roles(["a", "b"]));
        let _ = registry.register(conn.clone());
        let _ = registry.unregister(&conn.id);

        assert!(registry.sockets_for("u1").is_empty());
        assert!(registry.group_members(&GroupKey::Role("a".into())).is_empty());
        assert!(registry.groups_of(&conn.id).is_empty());
        assert_eq!(registry.unique_users(), 0);
        assert_eq!(registry.group_count(), 0);
    }

    #[test]
    fn unknown_user_has_no_sockets() {
        let registry = ConnectionRegistry::new();
        assert!(registry.sockets_for("nobody").is_empty());
        assert!(registry.members_of("team:none").is_empty());
    }

    #[test]
    fn group_names_sorted_and_limited() {
        let registry = ConnectionRegistry::new();
        for i in 0..5 {
            let (conn, _rx) = connect(Identity::new(format!("u{i}")));
            let _ = registry.register(conn);
        }
        assert_eq!(registry.group_count(), 5);
        assert_eq!(registry.group_names(2), vec!["user:u0", "user:u1"]);
        assert_eq!(registry.group_names(100).len(), 5);
    }

    #[test]
    fn all_connections_lists_everyone() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connect(Identity::new("u1"));
        let (b, _rb) = connect(Identity::new("u2"));
        let _ = registry.register(a.clone());
        let _ = registry.register(b);
        assert_eq!(registry.all_connections().len(), 2);
        assert!(registry.contains(&a.id));
    }

    #[test]
    fn concurrent_register_and_unregister() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let identity =
                            Identity::new(format!("u{}", i % 5)).with_roles([format!("r{t}")]);
                        let (conn, _rx) = connect(identity);
                        let _ = registry.register(conn.clone());
                        let _ = registry.sockets_for("u0");
                        let _ = registry.unregister(&conn.id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.unique_users(), 0);
        assert_eq!(registry.group_count(), 0);
    }
}

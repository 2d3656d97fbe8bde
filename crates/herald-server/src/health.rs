//! `/health` and `/stats` endpoints.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::registry::ConnectionRegistry;

/// Group names listed by `/stats`.
pub const STATS_ROOM_LIMIT: usize = 20;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the server is running.
    pub status: &'static str,
    /// Service name from settings.
    pub service: String,
    /// Distinct users with at least one open connection.
    pub connections: usize,
    /// RFC 3339 time of the check.
    pub timestamp: String,
}

/// Stats response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// Distinct users with at least one open connection.
    pub unique_users: usize,
    /// Open connections across all users.
    pub total_connections: usize,
    /// Up to [`STATS_ROOM_LIMIT`] non-empty group names, sorted.
    pub rooms: Vec<String>,
}

/// Build a health response from the registry.
pub fn health_check(service: &str, registry: &ConnectionRegistry) -> HealthResponse {
    HealthResponse {
        status: "healthy",
        service: service.to_string(),
        connections: registry.unique_users(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Build a stats response from the registry.
pub fn stats(registry: &ConnectionRegistry) -> StatsResponse {
    StatsResponse {
        unique_users: registry.unique_users(),
        total_connections: registry.connection_count(),
        rooms: registry.group_names(STATS_ROOM_LIMIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::connect;
    use herald_core::Identity;

    #[test]
    fn empty_registry() {
        let registry = ConnectionRegistry::new();
        let health = health_check("hrm-socket", &registry);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "hrm-socket");
        assert_eq!(health.connections, 0);

        let stats = stats(&registry);
        assert_eq!(stats.unique_users, 0);
        assert_eq!(stats.total_connections, 0);
        assert!(stats.rooms.is_empty());
    }

    #[test]
    fn counts_users_not_devices() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = connect(Identity::new("u1"));
        let (b, _rb) = connect(Identity::new("u1"));
        let (c, _rc) = connect(Identity::new("u2"));
        for conn in [a, b, c] {
            let _ = registry.register(conn);
        }
        assert_eq!(health_check("svc", &registry).connections, 2);
        let stats = stats(&registry);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(stats.total_connections, 3);
    }

    #[test]
    fn rooms_are_capped() {
        let registry = ConnectionRegistry::new();
        let mut keep = Vec::new();
        for i in 0..30 {
            let (conn, rx) = connect(Identity::new(format!("user{i:02}")));
            let _ = registry.register(conn);
            keep.push(rx);
        }
        let stats = stats(&registry);
        assert_eq!(stats.rooms.len(), STATS_ROOM_LIMIT);
        assert_eq!(stats.rooms[0], "user:user00");
    }

    #[test]
    fn serialization_uses_wire_names() {
        let registry = ConnectionRegistry::new();
        let health = serde_json::to_value(health_check("svc", &registry)).unwrap();
        assert!(health["timestamp"].is_string());
        let stats = serde_json::to_value(stats(&registry)).unwrap();
        assert!(stats.get("uniqueUsers").is_some());
        assert!(stats.get("totalConnections").is_some());
        assert!(stats["rooms"].is_array());
    }
}

//! Envelope routing: resolve a target to live connections and push the frame.

use std::sync::Arc;

use herald_core::{EventEnvelope, GroupKey, RoutingTarget};
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::connection::ConnectionHandle;
use crate::metrics::{
    EVENT_DELIVERIES_TOTAL, EVENT_DISPATCH_MISSES_TOTAL, EVENTS_ROUTED_TOTAL, WS_SEND_DROPS_TOTAL,
};
use crate::registry::ConnectionRegistry;
use crate::websocket::protocol;

/// What one `route` call did. Used for logs and metrics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchResult {
    /// Which routing branch was taken.
    pub strategy: &'static str,
    /// Handles the frame was offered to (duplicates counted).
    pub attempted: usize,
    /// Handles that accepted the frame into their outbound queue.
    pub delivered: usize,
}

impl DispatchResult {
    /// No live connection matched the target.
    pub fn is_miss(&self) -> bool {
        self.attempted == 0
    }
}

/// Turns envelopes into frames on the right connections.
pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
}

impl EventRouter {
    /// Router over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Live connections addressed by `target`.
    ///
    /// Per-id and per-role lookups are concatenated, so a connection in two
    /// targeted roles appears twice.
    pub fn resolve(&self, target: &RoutingTarget) -> Vec<ConnectionHandle> {
        match target {
            RoutingTarget::Users(ids) => ids
                .iter()
                .flat_map(|id| self.registry.sockets_for(id))
                .collect(),
            RoutingTarget::Employees(ids) => ids
                .iter()
                .flat_map(|id| self.registry.group_members(&GroupKey::Employee(id.clone())))
                .collect(),
            RoutingTarget::Team(id) => self.registry.group_members(&GroupKey::Team(id.clone())),
            RoutingTarget::Roles(roles) => roles
                .iter()
                .flat_map(|role| self.registry.group_members(&GroupKey::Role(role.clone())))
                .collect(),
            RoutingTarget::Broadcast => self.registry.all_connections(),
        }
    }

    /// Deliver `envelope` to every connection its target resolves to.
    ///
    /// Never fails: closed or saturated connections just don't count as
    /// delivered.
    #[instrument(skip_all, fields(event = %envelope.event, strategy = envelope.target.strategy()))]
    pub fn route(&self, envelope: &EventEnvelope) -> DispatchResult {
        let strategy = envelope.target.strategy();
        counter!(EVENTS_ROUTED_TOTAL, "strategy" => strategy).increment(1);

        let recipients = self.resolve(&envelope.target);
        let mut result = DispatchResult {
            strategy,
            attempted: recipients.len(),
            delivered: 0,
        };
        if recipients.is_empty() {
            counter!(EVENT_DISPATCH_MISSES_TOTAL, "strategy" => strategy).increment(1);
            info!("no live connections for event");
            return result;
        }

        let frame = match protocol::event_frame(&envelope.event, &envelope.payload) {
            Ok(frame) => Arc::new(frame),
            Err(e) => {
                warn!(error = %e, "failed to serialize event frame");
                return result;
            }
        };

        for conn in &recipients {
            if conn.send(Arc::clone(&frame)) {
                result.delivered += 1;
            } else {
                counter!(WS_SEND_DROPS_TOTAL).increment(1);
                debug!(conn_id = %conn.id, "connection did not accept event");
            }
        }
        counter!(EVENT_DELIVERIES_TOTAL).increment(result.delivered as u64);
        info!(
            recipients = result.attempted,
            delivered = result.delivered,
            "event routed"
        );
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

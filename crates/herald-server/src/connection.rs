//! Live client connection handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use herald_core::{ConnectionId, Identity};
use tokio::sync::mpsc;

/// Shared handle to a connection. The registry holds these; the session task
/// owns the socket on the other end of the channel.
pub type ConnectionHandle = Arc<ClientConnection>;

/// An admitted WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Identity verified at admission, fixed for the connection's lifetime.
    pub identity: Identity,
    /// Outbound frames, drained by the session's writer task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has answered since the last ping check.
    is_alive: AtomicBool,
    /// Frames dropped because the outbound queue was full or closed.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection with a fresh id.
    pub fn new(identity: Identity, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self::with_id(ConnectionId::new(), identity, tx)
    }

    /// Create a connection with a given id.
    pub fn with_id(id: ConnectionId, identity: Identity, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            identity,
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// User id of the connected principal.
    pub fn user_id(&self) -> &str {
        &self.identity.id
    }

    /// Queue a text frame for the client.
    ///
    /// Never blocks. Returns `false` if the queue is full or the writer is
    /// gone, and counts the drop.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record client activity (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Check and reset the alive flag. `true` if the client was active since
    /// the previous check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("user_id", &self.identity.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let conn = ClientConnection::with_id("conn_1".into(), Identity::new("u1"), tx);
        (conn, rx)
    }

    #[test]
    fn create_connection() {
        let (conn, _rx) = make_connection(8);
        assert_eq!(conn.id.as_str(), "conn_1");
        assert_eq!(conn.user_id(), "u1");
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn fresh_ids_are_unique() {
        let (tx, _rx) = mpsc::channel(1);
        let a = ClientConnection::new(Identity::new("u1"), tx.clone());
        let b = ClientConnection::new(Identity::new("u1"), tx);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn send_message_success() {
        let (conn, mut rx) = make_connection(8);
        assert!(conn.send(Arc::new("hello".into())));
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn send_to_closed_channel_returns_false() {
        let (conn, rx) = make_connection(8);
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn send_to_full_channel_returns_false() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send(Arc::new("msg1".into())));
        assert!(!conn.send(Arc::new("msg2".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn mark_alive_and_check() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn debug_shows_ids() {
        let (conn, _rx) = make_connection(1);
        let debug = format!("{conn:?}");
        assert!(debug.contains("conn_1"));
        assert!(debug.contains("u1"));
    }
}

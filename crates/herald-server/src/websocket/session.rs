//! WebSocket session lifecycle: handles one admitted client from upgrade
//! through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use herald_core::Identity;
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::protocol::{self, ControlMessage};
use crate::connection::{ClientConnection, ConnectionHandle};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::registry::ConnectionRegistry;

/// Ping checks a client may miss before it is disconnected.
const MAX_MISSED_PINGS: u32 = 2;

/// Per-connection knobs.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Outbound frames buffered before new ones are dropped.
    pub send_queue_size: usize,
    /// Interval between server Ping frames.
    pub ping_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_queue_size: 256,
            ping_interval: Duration::from_secs(25),
        }
    }
}

/// Run a WebSocket session for an admitted client.
///
/// 1. Registers the connection (user, employee and role groups)
/// 2. Pushes the `connected` greeting
/// 3. Forwards queued frames and sends periodic Pings from a writer task
/// 4. Applies join/leave control messages from the client
/// 5. Unregisters on disconnect, dead client or shutdown
#[instrument(skip_all, fields(conn_id, user_id = %identity.id))]
pub async fn run_session(
    ws: WebSocket,
    identity: Identity,
    registry: Arc<ConnectionRegistry>,
    config: SessionConfig,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_queue_size.max(1));
    let connection: ConnectionHandle = Arc::new(ClientConnection::new(identity, send_tx));
    let conn_id = connection.id.clone();
    let _ = tracing::Span::current().record("conn_id", tracing::field::display(&conn_id));

    let _ = registry.register(Arc::clone(&connection));
    info!(
        user = connection.identity.display_name(),
        employee_id = connection.identity.employee_id.as_deref(),
        "client connected"
    );
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    match protocol::connected_frame(connection.user_id()) {
        Ok(frame) => {
            let _ = connection.send(Arc::new(frame));
        }
        Err(e) => warn!(error = %e, "failed to serialize connected frame"),
    }

    // Outbound forwarder with periodic Ping frames.
    let outbound_conn = Arc::clone(&connection);
    let outbound_shutdown = shutdown.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(config.ping_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;
        let mut missed = 0;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(text) = frame else { break };
                    if ws_tx.send(Message::Text((*text).clone().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if outbound_conn.check_alive() {
                        missed = 0;
                    } else {
                        missed += 1;
                        if missed >= MAX_MISSED_PINGS {
                            warn!(missed, "client unresponsive, disconnecting");
                            break;
                        }
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_shutdown.cancelled() => {
                    let close = CloseFrame {
                        code: close_code::AWAY,
                        reason: Utf8Bytes::from_static("server shutting down"),
                    };
                    let _ = ws_tx.send(Message::Close(Some(close))).await;
                    break;
                }
            }
        }
    });

    // Inbound control messages until the client or the writer goes away.
    let mut writer_done = false;
    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        if !handle_frame(&registry, &connection, msg) {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket read error");
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    if !writer_done {
        writer.abort();
    }
    let _ = registry.unregister(&conn_id);
    info!(
        age_secs = connection.age().as_secs(),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}

/// Handle one inbound frame. Returns `false` when the session should end.
fn handle_frame(
    registry: &ConnectionRegistry,
    connection: &ClientConnection,
    msg: Message,
) -> bool {
    connection.mark_alive();
    match msg {
        Message::Text(text) => handle_control(registry, connection, text.as_str()),
        Message::Binary(data) => match std::str::from_utf8(&data) {
            Ok(text) => handle_control(registry, connection, text),
            Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
        },
        Message::Close(_) => {
            debug!("client sent close frame");
            return false;
        }
        Message::Ping(_) | Message::Pong(_) => {}
    }
    true
}

/// Apply a client control message. Malformed or unknown messages are logged
/// and otherwise ignored.
pub fn handle_control(registry: &ConnectionRegistry, connection: &ClientConnection, text: &str) {
    let control = match ControlMessage::parse(text) {
        Ok(control) => control,
        Err(e) => {
            warn!(error = %e, "ignoring client message");
            return;
        }
    };
    let group = control.group();
    let outcome = if control.is_join() {
        registry.join(&connection.id, &group)
    } else {
        registry.leave(&connection.id, &group)
    };
    match outcome {
        Ok(changed) => info!(
            user = connection.identity.display_name(),
            group = %group,
            join = control.is_join(),
            changed,
            "group membership updated"
        ),
        Err(e) => debug!(error = %e, "membership change on closed connection"),
    }
}

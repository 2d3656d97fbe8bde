//! # herald-server
//!
//! The gateway proper.
//!
//! - [`registry`]: live connections indexed by user id and group, plus
//!   dynamic team/department/room membership
//! - [`router`]: envelope → routing priority → destination set → dispatch
//! - [`consumer`]: durable, prefetch-1 work queue consumer with fixed-delay
//!   reconnects
//! - [`websocket`]: the per-connection session loop and client protocol
//! - [`server`]: Axum routes (`/ws`, `/health`, `/stats`, `/metrics`)
//! - [`shutdown`]: `CancellationToken`-based graceful shutdown and signal handling

#![deny(unsafe_code)]

pub mod connection;
pub mod consumer;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use connection::{ClientConnection, ConnectionHandle};
pub use consumer::{ConsumerError, DeliveryOutcome, QueueConsumer};
pub use registry::{ConnectionRegistry, MembershipError};
pub use router::{DispatchResult, EventRouter};
pub use server::{AppState, GatewayServer, ServerConfig};
pub use shutdown::ShutdownCoordinator;
pub use websocket::session::SessionConfig;

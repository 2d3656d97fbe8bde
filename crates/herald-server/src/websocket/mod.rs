//! WebSocket wire protocol and per-connection session loop.

pub mod protocol;
pub mod session;

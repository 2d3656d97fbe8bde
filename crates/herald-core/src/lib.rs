//! # herald-core
//!
//! Foundation types shared by every Herald crate.
//!
//! - **IDs**: [`ConnectionId`], a branded newtype for live connection handles
//! - **Identity**: the verified attributes of a connecting principal
//! - **Groups**: [`GroupKey`], the routing dimensions a connection can belong to
//! - **Envelopes**: [`EventEnvelope`] + [`RoutingTarget`], decoded from queue messages
//! - **Retry**: [`RetryPolicy`], the fixed-delay reconnect parameters

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod group;
pub mod identity;
pub mod ids;
pub mod retry;

pub use envelope::{EventEnvelope, RoutingTarget, scalar_id};
pub use errors::DecodeError;
pub use group::GroupKey;
pub use identity::Identity;
pub use ids::ConnectionId;
pub use retry::RetryPolicy;

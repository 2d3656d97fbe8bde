//! # herald-broker
//!
//! The gateway consumes its work queue through two small traits:
//!
//! - [`Broker`]: opens a fresh connection + channel (one call per reconnect)
//! - [`BrokerChannel`]: declares the queue, sets prefetch, yields deliveries
//!   and acknowledges them
//!
//! [`AmqpBroker`] speaks AMQP 0-9-1 to RabbitMQ via `lapin`.
//! [`ChannelBroker`] keeps queues in process memory and can simulate dropped
//! connections and failed connects; the integration tests run against it.

#![deny(unsafe_code)]

pub mod amqp;
pub mod channel;
pub mod errors;

use async_trait::async_trait;

pub use amqp::AmqpBroker;
pub use channel::ChannelBroker;
pub use errors::{BrokerError, Result};

/// One message taken from the queue and not yet acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-scoped delivery tag used for the acknowledgement.
    pub tag: u64,
    /// Raw message body.
    pub body: Vec<u8>,
}

/// Source of broker connections.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Open a connection and a channel on it.
    async fn connect(&self) -> Result<Box<dyn BrokerChannel>>;

    /// Address for logs, without credentials.
    fn describe(&self) -> String;
}

/// A live channel on an open broker connection.
#[async_trait]
pub trait BrokerChannel: Send {
    /// Declare `queue` as durable (no-op if it already exists with the same flags).
    async fn declare_durable_queue(&mut self, queue: &str) -> Result<()>;

    /// Limit unacknowledged deliveries on this channel to `count`.
    async fn set_prefetch(&mut self, count: u16) -> Result<()>;

    /// Register a consumer on `queue` with manual acknowledgement.
    async fn start_consuming(&mut self, queue: &str, consumer_tag: &str) -> Result<()>;

    /// Next delivery. `None` means the connection or consumer is gone.
    async fn next_delivery(&mut self) -> Option<Result<Delivery>>;

    /// Acknowledge one delivery.
    async fn ack(&mut self, tag: u64) -> Result<()>;
}

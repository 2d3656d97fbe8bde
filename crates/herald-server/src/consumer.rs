//! Work queue consumer: broker deliveries in, routed events out.
//!
//! Strictly sequential. Each delivery is decoded, routed, then acknowledged,
//! whatever the outcome; malformed messages are dropped after logging. A
//! failed or lost broker connection is retried with a fixed delay until
//! shutdown.

use std::sync::Arc;

use herald_broker::{Broker, BrokerError};
use herald_core::{EventEnvelope, RetryPolicy};
use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::{
    BROKER_CONNECTED, BROKER_RECONNECTS_TOTAL, QUEUE_DECODE_FAILURES_TOTAL, QUEUE_MESSAGES_TOTAL,
};
use crate::router::{DispatchResult, EventRouter};

/// Unacknowledged deliveries allowed on the channel.
pub const PREFETCH: u16 = 1;

/// Consumer tag announced to the broker.
pub const CONSUMER_TAG: &str = "herald-gateway";

/// The consumer gave up on the broker.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// A bounded retry policy ran out.
    #[error("broker unavailable after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Consecutive failed attempts.
        attempts: u32,
        /// Last failure.
        #[source]
        source: BrokerError,
    },
}

/// What happened to one delivery. It is acknowledged either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Decoded and routed.
    Routed(DispatchResult),
    /// Not a valid envelope; dropped.
    Discarded,
}

/// Why a consuming session ended without a setup error.
enum SessionEnd {
    Shutdown,
    Lost(String),
}

/// Consumes the gateway's durable work queue.
pub struct QueueConsumer {
    broker: Arc<dyn Broker>,
    router: Arc<EventRouter>,
    queue: String,
    retry: RetryPolicy,
}

impl QueueConsumer {
    /// Consumer of `queue` on `broker`, routing through `router`.
    pub fn new(
        broker: Arc<dyn Broker>,
        router: Arc<EventRouter>,
        queue: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            broker,
            router,
            queue: queue.into(),
            retry,
        }
    }

    /// Consume until `shutdown` fires.
    ///
    /// Returns an error only when a bounded [`RetryPolicy`] is exhausted.
    /// A delivery already taken off the queue is always routed and acked
    /// before shutdown is honored.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), ConsumerError> {
        let mut failures: u32 = 0;
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match self.consume_session(&shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Lost(reason)) => {
                    failures = 0;
                    warn!(
                        broker = %self.broker.describe(),
                        reason = %reason,
                        retry_in = ?self.retry.delay,
                        "broker connection lost, reconnecting"
                    );
                }
                Err(e) => {
                    failures += 1;
                    if !self.retry.should_retry(failures) {
                        error!(
                            broker = %self.broker.describe(),
                            attempts = failures,
                            error = %e,
                            "giving up on broker"
                        );
                        return Err(ConsumerError::RetriesExhausted {
                            attempts: failures,
                            source: e,
                        });
                    }
                    warn!(
                        broker = %self.broker.describe(),
                        attempt = failures,
                        error = %e,
                        retry_in = ?self.retry.delay,
                        "broker connection failed, retrying"
                    );
                }
            }

            counter!(BROKER_RECONNECTS_TOTAL).increment(1);
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.retry.delay) => {}
            }
        }
        info!("queue consumer stopped");
        Ok(())
    }

    /// Decode and route one message body.
    pub fn process(&self, body: &[u8]) -> DeliveryOutcome {
        counter!(QUEUE_MESSAGES_TOTAL).increment(1);
        match EventEnvelope::decode(body) {
            Ok(envelope) => {
                debug!(
                    event = %envelope.event,
                    strategy = envelope.target.strategy(),
                    "queue message decoded"
                );
                DeliveryOutcome::Routed(self.router.route(&envelope))
            }
            Err(e) => {
                counter!(QUEUE_DECODE_FAILURES_TOTAL).increment(1);
                warn!(error = %e, bytes = body.len(), "discarding malformed queue message");
                DeliveryOutcome::Discarded
            }
        }
    }

    /// One connection's worth of consuming. Setup failures are errors;
    /// losing an established connection is a normal end.
    async fn consume_session(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd, BrokerError> {
        let mut channel = self.broker.connect().await?;
        channel.declare_durable_queue(&self.queue).await?;
        channel.set_prefetch(PREFETCH).await?;
        channel.start_consuming(&self.queue, CONSUMER_TAG).await?;
        gauge!(BROKER_CONNECTED).set(1.0);
        info!(broker = %self.broker.describe(), queue = %self.queue, "consuming work queue");

        let end = loop {
            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => break SessionEnd::Shutdown,
                next = channel.next_delivery() => next,
            };
            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => break SessionEnd::Lost(e.to_string()),
                None => break SessionEnd::Lost("consumer stream ended".into()),
            };
            let _ = self.process(&delivery.body);
            if let Err(e) = channel.ack(delivery.tag).await {
                break SessionEnd::Lost(e.to_string());
            }
        };
        gauge!(BROKER_CONNECTED).set(0.0);
        Ok(end)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! In-process broker.
//!
//! Queues live in memory and survive "reconnects" the way durable queues on
//! a real broker do. Unacknowledged deliveries are requeued at the front when
//! the connection drops, giving the same at-least-once behavior.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::pin::pin;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::errors::{BrokerError, Result};
use crate::{Broker, BrokerChannel, Delivery};

/// Cloneable handle to a shared set of in-memory queues.
#[derive(Clone, Default)]
pub struct ChannelBroker {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    changed: Notify,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, VecDeque<Vec<u8>>>,
    durable: BTreeSet<String>,
    prefetch: Option<u16>,
    /// Bumped by [`ChannelBroker::drop_connections`]; channels from an older
    /// generation are dead.
    generation: u64,
    failing_connects: u32,
    connect_attempts: u32,
    next_tag: u64,
    unacked: HashMap<u64, (String, Vec<u8>)>,
    acked: Vec<Vec<u8>>,
}

impl ChannelBroker {
    /// Empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to `queue`, creating the queue if needed.
    pub fn publish(&self, queue: &str, body: impl Into<Vec<u8>>) {
        self.shared
            .state
            .lock()
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(body.into());
        self.shared.changed.notify_waiters();
    }

    /// Make the next `count` calls to [`Broker::connect`] fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.shared.state.lock().failing_connects = count;
    }

    /// Kill every open channel. Unacked deliveries go back to the front of
    /// their queue.
    pub fn drop_connections(&self) {
        {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            let mut requeue: Vec<(u64, (String, Vec<u8>))> = state.unacked.drain().collect();
            requeue.sort_by_key(|(tag, _)| std::cmp::Reverse(*tag));
            for (_, (queue, body)) in requeue {
                state.queues.entry(queue).or_default().push_front(body);
            }
        }
        self.shared.changed.notify_waiters();
    }

    /// Number of times [`Broker::connect`] was called.
    pub fn connect_attempts(&self) -> u32 {
        self.shared.state.lock().connect_attempts
    }

    /// Bodies acknowledged so far, in ack order.
    pub fn acked(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().acked.clone()
    }

    /// Messages waiting in `queue`.
    pub fn pending(&self, queue: &str) -> usize {
        self.shared
            .state
            .lock()
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Deliveries handed out and not yet acknowledged.
    pub fn unacked(&self) -> usize {
        self.shared.state.lock().unacked.len()
    }

    /// Whether `queue` was declared durable.
    pub fn is_durable(&self, queue: &str) -> bool {
        self.shared.state.lock().durable.contains(queue)
    }

    /// Prefetch most recently requested by a channel.
    pub fn prefetch(&self) -> Option<u16> {
        self.shared.state.lock().prefetch
    }
}

#[async_trait]
impl Broker for ChannelBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerChannel>> {
        let mut state = self.shared.state.lock();
        state.connect_attempts += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(BrokerError::Connect("connection refused".into()));
        }
        Ok(Box::new(InProcessChannel {
            shared: Arc::clone(&self.shared),
            generation: state.generation,
            queue: None,
            prefetch: 0,
            in_flight: BTreeSet::new(),
        }))
    }

    fn describe(&self) -> String {
        "in-process".to_string()
    }
}

struct InProcessChannel {
    shared: Arc<Shared>,
    generation: u64,
    queue: Option<String>,
    prefetch: u16,
    in_flight: BTreeSet<u64>,
}

impl InProcessChannel {
    fn check_open(&self, state: &State) -> Result<()> {
        if state.generation == self.generation {
            Ok(())
        } else {
            Err(BrokerError::Closed)
        }
    }

    /// `Some(None)` when the channel is closed or not consuming, `None` when
    /// the caller has to wait.
    fn try_take(&mut self) -> Option<Option<Result<Delivery>>> {
        let mut state = self.shared.state.lock();
        if state.generation != self.generation {
            return Some(None);
        }
        let Some(queue) = self.queue.as_ref() else {
            return Some(None);
        };
        self.in_flight.retain(|tag| state.unacked.contains_key(tag));
        if self.prefetch > 0 && self.in_flight.len() >= usize::from(self.prefetch) {
            return None;
        }
        let body = state.queues.get_mut(queue)?.pop_front()?;
        state.next_tag += 1;
        let tag = state.next_tag;
        let _ = state.unacked.insert(tag, (queue.clone(), body.clone()));
        let _ = self.in_flight.insert(tag);
        Some(Some(Ok(Delivery { tag, body })))
    }
}

#[async_trait]
impl BrokerChannel for InProcessChannel {
    async fn declare_durable_queue(&mut self, queue: &str) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.check_open(&state)?;
        let _ = state.queues.entry(queue.to_string()).or_default();
        let _ = state.durable.insert(queue.to_string());
        Ok(())
    }

    async fn set_prefetch(&mut self, count: u16) -> Result<()> {
        let mut state = self.shared.state.lock();
        self.check_open(&state)?;
        state.prefetch = Some(count);
        self.prefetch = count;
        Ok(())
    }

    async fn start_consuming(&mut self, queue: &str, consumer_tag: &str) -> Result<()> {
        self.check_open(&self.shared.state.lock())?;
        debug!(queue, consumer_tag, "in-process consumer started");
        self.queue = Some(queue.to_string());
        Ok(())
    }

    async fn next_delivery(&mut self) -> Option<Result<Delivery>> {
        let shared = Arc::clone(&self.shared);
        loop {
            let mut notified = pin!(shared.changed.notified());
            let _ = notified.as_mut().enable();
            if let Some(result) = self.try_take() {
                return result;
            }
            notified.await;
        }
    }

    async fn ack(&mut self, tag: u64) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            self.check_open(&state)?;
            let Some((_, body)) = state.unacked.remove(&tag) else {
                return Err(BrokerError::Ack {
                    tag,
                    reason: "unknown delivery tag".into(),
                });
            };
            state.acked.push(body);
        }
        let _ = self.in_flight.remove(&tag);
        self.shared.changed.notify_waiters();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    async fn consuming(broker: &ChannelBroker, queue: &str) -> Box<dyn BrokerChannel> {
        let mut channel = broker.connect().await.unwrap_or_else(|_| panic!("connect"));
        channel.declare_durable_queue(queue).await.unwrap();
        channel.set_prefetch(1).await.unwrap();
        channel.start_consuming(queue, "test").await.unwrap();
        channel
    }

    #[tokio::test]
    async fn publish_then_consume_in_order() {
        let broker = ChannelBroker::new();
        broker.publish("q", "a");
        broker.publish("q", "b");
        let mut channel = consuming(&broker, "q").await;

        let first = channel.next_delivery().await.unwrap().unwrap();
        assert_eq!(first.body, b"a");
        channel.ack(first.tag).await.unwrap();
        let second = channel.next_delivery().await.unwrap().unwrap();
        assert_eq!(second.body, b"b");
        channel.ack(second.tag).await.unwrap();

        assert_eq!(broker.acked(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(broker.pending("q"), 0);
        assert_eq!(broker.unacked(), 0);
    }

    #[tokio::test]
    async fn declare_records_durability_and_prefetch() {
        let broker = ChannelBroker::new();
        let _channel = consuming(&broker, "work").await;
        assert!(broker.is_durable("work"));
        assert!(!broker.is_durable("other"));
        assert_eq!(broker.prefetch(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn prefetch_one_holds_second_delivery_until_ack() {
        let broker = ChannelBroker::new();
        broker.publish("q", "a");
        broker.publish("q", "b");
        let mut channel = consuming(&broker, "q").await;

        let first = channel.next_delivery().await.unwrap().unwrap();
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), channel.next_delivery()).await;
        assert!(blocked.is_err());

        channel.ack(first.tag).await.unwrap();
        let second = channel.next_delivery().await.unwrap().unwrap();
        assert_eq!(second.body, b"b");
    }

    #[tokio::test]
    async fn waiting_consumer_wakes_on_publish() {
        let broker = ChannelBroker::new();
        let mut channel = consuming(&broker, "q").await;
        let publisher = broker.clone();
        let _ = tokio::spawn(async move {
            tokio::task::yield_now().await;
            publisher.publish("q", "late");
        });
        let delivery = channel.next_delivery().await.unwrap().unwrap();
        assert_eq!(delivery.body, b"late");
    }

    #[tokio::test]
    async fn drop_connections_ends_stream_and_requeues() {
        let broker = ChannelBroker::new();
        broker.publish("q", "a");
        broker.publish("q", "b");
        let mut channel = consuming(&broker, "q").await;
        let _first = channel.next_delivery().await.unwrap().unwrap();

        broker.drop_connections();
        assert!(channel.next_delivery().await.is_none());
        assert_matches!(channel.ack(1).await, Err(BrokerError::Closed));
        assert_eq!(broker.pending("q"), 2);

        let mut channel = consuming(&broker, "q").await;
        let again = channel.next_delivery().await.unwrap().unwrap();
        assert_eq!(again.body, b"a");
    }

    #[tokio::test]
    async fn failing_connects_are_counted() {
        let broker = ChannelBroker::new();
        broker.fail_next_connects(2);
        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_ok());
        assert_eq!(broker.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn unknown_tag_ack_fails() {
        let broker = ChannelBroker::new();
        let mut channel = consuming(&broker, "q").await;
        assert_matches!(channel.ack(99).await, Err(BrokerError::Ack { tag: 99, .. }));
    }

    #[test]
    fn describe() {
        assert_eq!(ChannelBroker::new().describe(), "in-process");
    }
}

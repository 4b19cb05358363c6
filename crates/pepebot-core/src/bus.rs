//! Message bus for channel ⇄ agent communication.
//!
//! Provides a thread-safe [`MessageBus`] over two bounded MPSC queues:
//! `inbound` (transport → agent) and `outbound` (agent → transport).
//! FIFO per queue; no ordering across session keys. Messages still
//! queued at process exit are dropped — the bus is deliberately
//! in-memory and lossy.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pepebot_types::error::PepebotError;
use pepebot_types::event::{InboundMessage, OutboundMessage};

/// Default capacity for the bounded queues.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// In-process pub/sub decoupling N chat transports from M agent workers.
pub struct MessageBus {
    inbound_tx: tokio::sync::mpsc::Sender<InboundMessage>,
    inbound_rx: Mutex<tokio::sync::mpsc::Receiver<InboundMessage>>,
    outbound_tx: tokio::sync::mpsc::Sender<OutboundMessage>,
    outbound_rx: Mutex<tokio::sync::mpsc::Receiver<OutboundMessage>>,
}

impl MessageBus {
    /// Create a bus with the default queue capacity (1024).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with a custom queue capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (inbound_tx, inbound_rx) = tokio::sync::mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(capacity);

        debug!(capacity, "message bus created");

        Self {
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
        }
    }

    /// Non-blocking append to the inbound queue.
    ///
    /// Returns an error when the queue is full or closed.
    pub fn publish_inbound(&self, msg: InboundMessage) -> Result<(), PepebotError> {
        debug!(channel = %msg.channel, chat_id = %msg.chat_id, "publishing inbound message");
        self.inbound_tx.try_send(msg).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => {
                PepebotError::Channel("inbound queue full (backpressure)".into())
            }
            tokio::sync::mpsc::error::TrySendError::Closed(_) => {
                PepebotError::Channel("inbound queue closed".into())
            }
        })
    }

    /// Append to the inbound queue, waiting for capacity.
    pub async fn publish_inbound_async(&self, msg: InboundMessage) -> Result<(), PepebotError> {
        self.inbound_tx
            .send(msg)
            .await
            .map_err(|e| PepebotError::Channel(format!("inbound queue closed: {e}")))
    }

    /// Block until an inbound message is available or `cancel` fires.
    ///
    /// Returns `None` on cancellation or when the queue is closed and
    /// drained.
    pub async fn consume_inbound(&self, cancel: &CancellationToken) -> Option<InboundMessage> {
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            msg = rx.recv() => msg,
        }
    }

    /// Non-blocking append to the outbound queue.
    pub fn dispatch_outbound(&self, msg: OutboundMessage) -> Result<(), PepebotError> {
        debug!(channel = %msg.channel, chat_id = %msg.chat_id, "dispatching outbound message");
        self.outbound_tx.try_send(msg).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => {
                PepebotError::Channel("outbound queue full (backpressure)".into())
            }
            tokio::sync::mpsc::error::TrySendError::Closed(_) => {
                PepebotError::Channel("outbound queue closed".into())
            }
        })
    }

    /// Append to the outbound queue, waiting for capacity.
    pub async fn dispatch_outbound_async(&self, msg: OutboundMessage) -> Result<(), PepebotError> {
        self.outbound_tx
            .send(msg)
            .await
            .map_err(|e| PepebotError::Channel(format!("outbound queue closed: {e}")))
    }

    /// Block until an outbound message is available or `cancel` fires.
    pub async fn consume_outbound(&self, cancel: &CancellationToken) -> Option<OutboundMessage> {
        let mut rx = self.outbound_rx.lock().await;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            msg = rx.recv() => msg,
        }
    }

    /// Cloneable sender handle for inbound publishing, so multiple
    /// transports can publish concurrently.
    pub fn inbound_sender(&self) -> tokio::sync::mpsc::Sender<InboundMessage> {
        self.inbound_tx.clone()
    }

    /// Cloneable sender handle for outbound dispatch.
    pub fn outbound_sender(&self) -> tokio::sync::mpsc::Sender<OutboundMessage> {
        self.outbound_tx.clone()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_inbound(content: &str) -> InboundMessage {
        InboundMessage::new("test", "user1", "chat1", content)
    }

    fn make_outbound(content: &str) -> OutboundMessage {
        OutboundMessage::new("test", "chat1", content)
    }

    #[tokio::test]
    async fn publish_and_consume_inbound() {
        let bus = MessageBus::new();
        bus.publish_inbound(make_inbound("hello")).unwrap();

        let cancel = CancellationToken::new();
        let received = bus.consume_inbound(&cancel).await.unwrap();
        assert_eq!(received.content, "hello");
        assert_eq!(received.channel, "test");
    }

    #[tokio::test]
    async fn dispatch_and_consume_outbound() {
        let bus = MessageBus::new();
        bus.dispatch_outbound(make_outbound("reply")).unwrap();

        let cancel = CancellationToken::new();
        let received = bus.consume_outbound(&cancel).await.unwrap();
        assert_eq!(received.content, "reply");
    }

    #[tokio::test]
    async fn fifo_within_a_queue() {
        let bus = MessageBus::new();
        for i in 0..5 {
            bus.publish_inbound(make_inbound(&format!("msg-{i}"))).unwrap();
        }

        let cancel = CancellationToken::new();
        for i in 0..5 {
            let msg = bus.consume_inbound(&cancel).await.unwrap();
            assert_eq!(msg.content, format!("msg-{i}"));
        }
    }

    #[tokio::test]
    async fn consume_returns_none_on_cancellation() {
        let bus = MessageBus::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(bus.consume_inbound(&cancel).await.is_none());
        assert!(bus.consume_outbound(&cancel).await.is_none());
    }

    #[tokio::test]
    async fn cancellation_unblocks_waiting_consumer() {
        let bus = std::sync::Arc::new(MessageBus::new());
        let cancel = CancellationToken::new();

        let consumer_bus = bus.clone();
        let consumer_cancel = cancel.clone();
        let consumer =
            tokio::spawn(async move { consumer_bus.consume_inbound(&consumer_cancel).await });

        tokio::task::yield_now().await;
        cancel.cancel();
        assert!(consumer.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn queues_are_independent() {
        let bus = MessageBus::new();
        bus.publish_inbound(make_inbound("in")).unwrap();
        bus.dispatch_outbound(make_outbound("out")).unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(bus.consume_inbound(&cancel).await.unwrap().content, "in");
        assert_eq!(bus.consume_outbound(&cancel).await.unwrap().content, "out");
    }

    #[tokio::test]
    async fn bounded_queue_backpressure() {
        let bus = MessageBus::with_capacity(2);
        bus.publish_inbound(make_inbound("a")).unwrap();
        bus.publish_inbound(make_inbound("b")).unwrap();

        let err = bus.publish_inbound(make_inbound("overflow")).unwrap_err();
        assert!(err.to_string().contains("backpressure"));
    }

    #[tokio::test]
    async fn async_publish_waits_when_full() {
        let bus = std::sync::Arc::new(MessageBus::with_capacity(1));
        bus.publish_inbound(make_inbound("a")).unwrap();

        let producer_bus = bus.clone();
        let producer = tokio::spawn(async move {
            producer_bus
                .publish_inbound_async(make_inbound("b"))
                .await
                .unwrap();
        });

        tokio::task::yield_now().await;
        let cancel = CancellationToken::new();
        assert_eq!(bus.consume_inbound(&cancel).await.unwrap().content, "a");
        producer.await.unwrap();
        assert_eq!(bus.consume_inbound(&cancel).await.unwrap().content, "b");
    }

    #[tokio::test]
    async fn sender_handles_allow_multi_producer() {
        let bus = MessageBus::new();
        let tx1 = bus.inbound_sender();
        let tx2 = bus.inbound_sender();

        tx1.try_send(make_inbound("from-tx1")).unwrap();
        tx2.try_send(make_inbound("from-tx2")).unwrap();

        let cancel = CancellationToken::new();
        assert_eq!(bus.consume_inbound(&cancel).await.unwrap().content, "from-tx1");
        assert_eq!(bus.consume_inbound(&cancel).await.unwrap().content, "from-tx2");
    }

    #[test]
    fn message_bus_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MessageBus>();
    }
}

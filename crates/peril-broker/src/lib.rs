//! Message broker abstraction for Peril.
//!
//! Provides the [`Broker`], [`BrokerChannel`], [`Consumer`] and
//! [`Delivery`] traits that the pub/sub layer is written against, plus
//! two implementations:
//!
//! - [`AmqpBroker`]: RabbitMQ (AMQP 0-9-1) via `lapin`.
//! - [`MemoryBroker`]: an in-process broker with the same routing,
//!   dead-lettering and redelivery semantics, used by tests and local
//!   demos.
//!
//! # Feature Flags
//!
//! - `amqp` (default): the `lapin` backed broker.

mod error;
mod memory;
mod topic;

#[cfg(feature = "amqp")]
mod amqp;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpBroker, AmqpChannel, AmqpConsumer, AmqpDelivery};
pub use error::BrokerError;
pub use memory::{
    MemoryBroker, MemoryChannel, MemoryConnection, MemoryConsumer,
    MemoryDelivery,
};
pub use topic::topic_matches;

use std::fmt;
use std::future::Future;

/// Queue argument naming the exchange that receives discarded messages.
pub const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";

// ---------------------------------------------------------------------------
// Topology vocabulary
// ---------------------------------------------------------------------------

/// How an exchange matches routing keys against bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Exact routing key match.
    Direct,
    /// Wildcard match (`*` one word, `#` zero or more).
    Topic,
    /// Every bound queue gets every message.
    Fanout,
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Topic => f.write_str("topic"),
            Self::Fanout => f.write_str("fanout"),
        }
    }
}

/// The durability class of a queue.
///
/// | class       | durable | auto-delete | exclusive |
/// |-------------|---------|-------------|-----------|
/// | `Durable`   | yes     | no          | no        |
/// | `Transient` | no      | yes         | yes       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueDurability {
    /// Survives broker restarts and may be shared between consumers.
    Durable,
    /// Owned by one connection and deleted when its consumer goes away.
    Transient,
}

impl QueueDurability {
    pub fn is_durable(self) -> bool {
        matches!(self, Self::Durable)
    }

    pub fn auto_delete(self) -> bool {
        matches!(self, Self::Transient)
    }

    pub fn exclusive(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl fmt::Display for QueueDurability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Durable => f.write_str("durable"),
            Self::Transient => f.write_str("transient"),
        }
    }
}

/// What the broker reports back after a queue declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueInfo {
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

/// A message on its way to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub content_type: String,
    pub body: Vec<u8>,
}

impl OutboundMessage {
    pub fn new(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            body,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A connection to a broker. Channels are opened from it.
///
/// Every returned future is `Send` so the pub/sub layer can drive these
/// calls from spawned tokio tasks without knowing the concrete broker.
pub trait Broker: Send + Sync + 'static {
    /// The channel type produced by this broker.
    type Channel: BrokerChannel;

    /// Opens a new channel on this connection.
    fn open_channel(
        &self,
    ) -> impl Future<Output = Result<Self::Channel, BrokerError>> + Send;

    /// Closes the connection. Every consumer opened through it ends.
    fn close(&self) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

/// A channel: the unit on which topology is declared, messages are
/// published and consumers are started.
pub trait BrokerChannel: Send + Sync + 'static {
    /// The consumer type produced by [`consume`](Self::consume).
    type Consumer: Consumer;

    /// Declares an exchange. Redeclaring with the same kind is a no-op;
    /// a different kind is a [`BrokerError::Declaration`].
    fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Declares a queue with the given durability class and
    /// dead-letter exchange. Idempotent for identical arguments.
    fn declare_queue(
        &self,
        name: &str,
        durability: QueueDurability,
        dead_letter_exchange: &str,
    ) -> impl Future<Output = Result<QueueInfo, BrokerError>> + Send;

    /// Binds `queue` to `exchange` under `routing_key`. Binding the
    /// same triple twice leaves a single binding.
    fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Publishes a message (non-mandatory, non-immediate). Returns once
    /// the broker has taken the message; no publisher confirm is awaited.
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Starts a manual-ack consumer on `queue`.
    fn consume(
        &self,
        queue: &str,
    ) -> impl Future<Output = Result<Self::Consumer, BrokerError>> + Send;
}

/// A stream of deliveries from one queue.
pub trait Consumer: Send + 'static {
    /// The delivery type yielded by this consumer.
    type Delivery: Delivery;

    /// Waits for the next delivery.
    ///
    /// Returns `None` once the stream is closed (channel or connection
    /// torn down, queue deleted).
    fn next_delivery(
        &mut self,
    ) -> impl Future<Output = Option<Result<Self::Delivery, BrokerError>>> + Send;
}

/// One message handed to a consumer, awaiting settlement.
///
/// `ack` and `nack` take `self` by value: once a delivery is settled it
/// is gone, so it cannot be settled twice.
pub trait Delivery: Send + 'static {
    /// The content-type tag set by the publisher, if any.
    fn content_type(&self) -> Option<&str>;

    /// The routing key the message was published with.
    fn routing_key(&self) -> &str;

    /// The raw message body.
    fn body(&self) -> &[u8];

    /// `true` if the broker delivered this message before.
    fn redelivered(&self) -> bool;

    /// Confirms the message is fully processed.
    fn ack(self) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Rejects the message. With `requeue` it goes back on the queue,
    /// otherwise it is routed to the queue's dead-letter exchange.
    fn nack(
        self,
        requeue: bool,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durable_queue_flags() {
        let d = QueueDurability::Durable;
        assert!(d.is_durable());
        assert!(!d.auto_delete());
        assert!(!d.exclusive());
    }

    #[test]
    fn test_transient_queue_flags() {
        let t = QueueDurability::Transient;
        assert!(!t.is_durable());
        assert!(t.auto_delete());
        assert!(t.exclusive());
    }

    #[test]
    fn test_exchange_kind_display() {
        assert_eq!(ExchangeKind::Direct.to_string(), "direct");
        assert_eq!(ExchangeKind::Topic.to_string(), "topic");
        assert_eq!(ExchangeKind::Fanout.to_string(), "fanout");
    }
}

//! Typed subscriptions.
//!
//! [`subscribe`] declares and binds a queue on its own channel, starts a
//! manual-ack consumer on it, and spawns one tokio task that runs the
//! delivery loop:
//!
//! ```text
//! delivery → check content type → decode → handler → AckType → settle
//!                     └──── failure ────┘                 ↑
//!                              └──── NackDiscard ─────────┘
//! ```
//!
//! The loop ends only when the broker closes the delivery stream
//! (channel or connection teardown). There is no unsubscribe.

use std::future::Future;

use peril_broker::{Broker, BrokerChannel, Consumer, Delivery, QueueDurability};
use peril_protocol::{Codec, JsonCodec, MsgpackCodec, ProtocolError};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::{declare_and_bind, AckType, PubSubError};

/// Something that turns a decoded message into an acknowledgment
/// decision.
///
/// Any `Fn(T) -> impl Future<Output = AckType>` closure is a handler,
/// so most call sites just pass an `async move` closure.
pub trait Handler<T>: Send + Sync + 'static {
    fn handle(&self, value: T) -> impl Future<Output = AckType> + Send;
}

impl<T, F, Fut> Handler<T> for F
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AckType> + Send,
{
    fn handle(&self, value: T) -> impl Future<Output = AckType> + Send {
        self(value)
    }
}

/// A running subscription.
///
/// Dropping it does not stop the loop; the task keeps running until the
/// broker closes the stream.
#[derive(Debug)]
pub struct Subscription {
    queue: String,
    task: JoinHandle<u64>,
}

impl Subscription {
    /// The queue this subscription consumes from (as named by the broker).
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Waits for the delivery loop to end and returns how many messages
    /// it settled.
    ///
    /// A panic inside a handler is propagated to the caller.
    pub async fn closed(self) -> u64 {
        match self.task.await {
            Ok(settled) => settled,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => 0,
        }
    }
}

/// Subscribes `handler` to messages routed to `queue`.
///
/// # Errors
/// Fails if the channel, queue, binding or consumer can't be set up.
/// Once this returns `Ok`, nothing that happens to individual messages
/// is reported back here.
pub async fn subscribe<B, C, T, H>(
    broker: &B,
    codec: C,
    exchange: &str,
    queue: &str,
    routing_key: &str,
    durability: QueueDurability,
    handler: H,
) -> Result<Subscription, PubSubError>
where
    B: Broker,
    C: Codec,
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    let (channel, info) =
        declare_and_bind(broker, exchange, queue, routing_key, durability).await?;
    let consumer = channel.consume(&info.name).await?;

    tracing::info!(queue = %info.name, exchange, routing_key, "subscribed");

    let task = tokio::spawn(delivery_loop::<B::Channel, C, T, H>(
        channel,
        consumer,
        codec,
        handler,
        info.name.clone(),
    ));

    Ok(Subscription {
        queue: info.name,
        task,
    })
}

/// [`subscribe`] with the JSON codec.
pub async fn subscribe_json<B, T, H>(
    broker: &B,
    exchange: &str,
    queue: &str,
    routing_key: &str,
    durability: QueueDurability,
    handler: H,
) -> Result<Subscription, PubSubError>
where
    B: Broker,
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    subscribe(broker, JsonCodec, exchange, queue, routing_key, durability, handler).await
}

/// [`subscribe`] with the MessagePack codec.
pub async fn subscribe_msgpack<B, T, H>(
    broker: &B,
    exchange: &str,
    queue: &str,
    routing_key: &str,
    durability: QueueDurability,
    handler: H,
) -> Result<Subscription, PubSubError>
where
    B: Broker,
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    subscribe(broker, MsgpackCodec, exchange, queue, routing_key, durability, handler).await
}

// ---------------------------------------------------------------------------
// Delivery loop
// ---------------------------------------------------------------------------

fn decode_delivery<C: Codec, T: DeserializeOwned, D: Delivery>(
    codec: &C,
    delivery: &D,
) -> Result<T, ProtocolError> {
    codec.check_content_type(delivery.content_type())?;
    codec.decode(delivery.body())
}

/// Runs until the consumer stream closes. Returns the number of
/// deliveries that were settled successfully.
async fn delivery_loop<Ch, C, T, H>(
    channel: Ch,
    mut consumer: Ch::Consumer,
    codec: C,
    handler: H,
    queue: String,
) -> u64
where
    Ch: BrokerChannel,
    C: Codec,
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    let mut settled = 0u64;

    while let Some(next) = consumer.next_delivery().await {
        let delivery = match next {
            Ok(delivery) => delivery,
            Err(error) => {
                tracing::warn!(%queue, %error, "failed to receive delivery");
                continue;
            }
        };

        let ack = match decode_delivery::<C, T, _>(&codec, &delivery) {
            Ok(value) => handler.handle(value).await,
            Err(error) => {
                tracing::warn!(
                    %queue,
                    routing_key = delivery.routing_key(),
                    %error,
                    "undecodable message, discarding"
                );
                AckType::NackDiscard
            }
        };

        tracing::debug!(%queue, routing_key = delivery.routing_key(), %ack, "settling delivery");
        match ack.settle(delivery).await {
            Ok(()) => settled += 1,
            Err(error) => {
                tracing::warn!(%queue, %error, "failed to settle delivery");
            }
        }
    }

    tracing::info!(%queue, settled, "subscription closed");
    drop(channel);
    settled
}

//! Topology declaration: exchanges, queues, bindings.
//!
//! All of it is idempotent. Both binaries declare everything they touch
//! at startup, so it doesn't matter who comes up first against a fresh
//! broker.

use peril_broker::{Broker, BrokerChannel, ExchangeKind, QueueDurability, QueueInfo};
use peril_protocol::routing::{
    EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_DLX, EXCHANGE_PERIL_TOPIC, QUEUE_PERIL_DLQ,
};

use crate::PubSubError;

/// Declares the fixed Peril exchanges and the dead-letter queue.
///
/// | name           | kind   |
/// |----------------|--------|
/// | `peril_direct` | direct |
/// | `peril_topic`  | topic  |
/// | `peril_dlx`    | fanout |
///
/// `peril_dlq` (durable) is bound to `peril_dlx` so discarded messages
/// end up somewhere an operator can look at them.
pub async fn declare_exchanges<Ch: BrokerChannel>(channel: &Ch) -> Result<(), PubSubError> {
    channel
        .declare_exchange(EXCHANGE_PERIL_DIRECT, ExchangeKind::Direct)
        .await?;
    channel
        .declare_exchange(EXCHANGE_PERIL_TOPIC, ExchangeKind::Topic)
        .await?;
    channel
        .declare_exchange(EXCHANGE_PERIL_DLX, ExchangeKind::Fanout)
        .await?;

    // The queue itself has no dead-letter exchange: a message discarded
    // from the DLQ is gone.
    channel
        .declare_queue(QUEUE_PERIL_DLQ, QueueDurability::Durable, "")
        .await?;
    channel
        .bind_queue(QUEUE_PERIL_DLQ, EXCHANGE_PERIL_DLX, "")
        .await?;

    tracing::debug!("peril exchanges declared");
    Ok(())
}

/// Opens a channel, declares `queue` and binds it to `exchange` under
/// `routing_key`.
///
/// Every queue gets `peril_dlx` as its dead-letter exchange. Calling this
/// twice with the same arguments leaves one queue and one binding.
///
/// # Errors
/// Fails if the channel can't be opened or the broker rejects the
/// declaration (for example the queue exists with another durability).
pub async fn declare_and_bind<B: Broker>(
    broker: &B,
    exchange: &str,
    queue: &str,
    routing_key: &str,
    durability: QueueDurability,
) -> Result<(B::Channel, QueueInfo), PubSubError> {
    let channel = broker.open_channel().await?;
    let info = channel
        .declare_queue(queue, durability, EXCHANGE_PERIL_DLX)
        .await?;
    channel.bind_queue(&info.name, exchange, routing_key).await?;

    tracing::debug!(
        queue = %info.name,
        exchange,
        routing_key,
        %durability,
        "queue declared and bound"
    );
    Ok((channel, info))
}

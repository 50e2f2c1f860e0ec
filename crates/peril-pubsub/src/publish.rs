//! Typed publishing.

use std::sync::Arc;

use peril_broker::{BrokerChannel, OutboundMessage};
use peril_protocol::{Codec, JsonCodec, MsgpackCodec, ProtocolError};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::PubSubError;

fn encode_message<C: Codec, T: Serialize>(
    codec: &C,
    value: &T,
) -> Result<OutboundMessage, ProtocolError> {
    let body = codec.encode(value)?;
    Ok(OutboundMessage::new(codec.content_type(), body))
}

/// Encodes `value` with `codec` and publishes it to `exchange` under
/// `routing_key`.
///
/// Fire-and-forget: returns once the channel has taken the message.
///
/// # Errors
/// [`PubSubError::Protocol`] if encoding fails (nothing is sent),
/// [`PubSubError::Broker`] if the channel refuses the message.
pub async fn publish<Ch, C, T>(
    channel: &Ch,
    codec: &C,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PubSubError>
where
    Ch: BrokerChannel,
    C: Codec,
    T: Serialize,
{
    let message = encode_message(codec, value)?;
    channel.publish(exchange, routing_key, message).await?;
    tracing::trace!(exchange, routing_key, content_type = codec.content_type(), "published");
    Ok(())
}

/// [`publish`] with the JSON codec.
pub async fn publish_json<Ch: BrokerChannel, T: Serialize>(
    channel: &Ch,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PubSubError> {
    publish(channel, &JsonCodec, exchange, routing_key, value).await
}

/// [`publish`] with the MessagePack codec.
pub async fn publish_msgpack<Ch: BrokerChannel, T: Serialize>(
    channel: &Ch,
    exchange: &str,
    routing_key: &str,
    value: &T,
) -> Result<(), PubSubError> {
    publish(channel, &MsgpackCodec, exchange, routing_key, value).await
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// A shared publishing channel.
///
/// The command loop and every subscription handler publish through one
/// channel; the mutex serializes them. Cheap to clone.
pub struct Publisher<Ch: BrokerChannel> {
    channel: Arc<Mutex<Ch>>,
}

impl<Ch: BrokerChannel> Clone for Publisher<Ch> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<Ch: BrokerChannel> Publisher<Ch> {
    /// Wraps a channel dedicated to publishing.
    pub fn new(channel: Ch) -> Self {
        Self {
            channel: Arc::new(Mutex::new(channel)),
        }
    }

    /// Encodes and publishes `value`. The payload is encoded before the
    /// channel lock is taken.
    pub async fn publish<C: Codec, T: Serialize>(
        &self,
        codec: &C,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PubSubError> {
        let message = encode_message(codec, value)?;
        let channel = self.channel.lock().await;
        channel.publish(exchange, routing_key, message).await?;
        tracing::trace!(exchange, routing_key, content_type = codec.content_type(), "published");
        Ok(())
    }

    /// Publishes `value` as JSON.
    pub async fn publish_json<T: Serialize>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PubSubError> {
        self.publish(&JsonCodec, exchange, routing_key, value).await
    }

    /// Publishes `value` as MessagePack.
    pub async fn publish_msgpack<T: Serialize>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PubSubError> {
        self.publish(&MsgpackCodec, exchange, routing_key, value).await
    }
}

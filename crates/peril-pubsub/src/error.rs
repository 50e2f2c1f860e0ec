use peril_broker::BrokerError;
use peril_protocol::ProtocolError;

/// Errors from the pub/sub layer.
///
/// Either the broker refused something (connect, declare, publish) or a
/// payload couldn't be encoded. Decode failures inside a subscription
/// never surface here: they are settled as a discard and logged.
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

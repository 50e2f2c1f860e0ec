//! Unified error type for Peril.

use peril_broker::BrokerError;
use peril_game::GameError;
use peril_protocol::ProtocolError;
use peril_pubsub::PubSubError;

/// Top-level error that wraps all crate-specific errors.
///
/// The binaries and sessions deal with this single type instead of
/// importing errors from each sub-crate. `#[from]` on each variant lets
/// `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PerilError {
    /// A broker-level error (connect, declare, publish, consume).
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A protocol-level error (encode, decode, unknown names).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A pub/sub error (topology or publish).
    #[error(transparent)]
    PubSub(#[from] PubSubError),

    /// A game-level error (paused, unknown unit, bad command).
    #[error(transparent)]
    Game(#[from] GameError),

    /// Terminal or log file I/O.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_broker_error() {
        let err: PerilError = BrokerError::Publish("nope".into()).into();
        assert!(matches!(err, PerilError::Broker(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: PerilError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, PerilError::Protocol(_)));
    }

    #[test]
    fn test_from_game_error() {
        let err: PerilError = GameError::Paused.into();
        assert!(matches!(err, PerilError::Game(_)));
        assert_eq!(err.to_string(), "the game is paused");
    }

    #[test]
    fn test_from_pubsub_error() {
        let err: PerilError = PubSubError::from(BrokerError::Closed).into();
        assert!(matches!(err, PerilError::PubSub(_)));
    }
}

//! Acknowledgment policy.

use std::fmt;

use peril_broker::{BrokerError, Delivery};

/// What a handler wants done with the message it just processed.
///
/// Exactly one of these is produced per delivery, and settling consumes
/// the delivery, so a message can't be acknowledged twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckType {
    /// Processed; remove it from the queue.
    Ack,
    /// Not processed here; put it back so another consumer (or a later
    /// attempt) can take it.
    NackRequeue,
    /// Can never be processed; route it to the dead-letter exchange.
    NackDiscard,
}

impl AckType {
    /// Settles `delivery` according to this decision.
    pub async fn settle<D: Delivery>(self, delivery: D) -> Result<(), BrokerError> {
        match self {
            Self::Ack => delivery.ack().await,
            Self::NackRequeue => delivery.nack(true).await,
            Self::NackDiscard => delivery.nack(false).await,
        }
    }
}

impl fmt::Display for AckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => f.write_str("ack"),
            Self::NackRequeue => f.write_str("nack-requeue"),
            Self::NackDiscard => f.write_str("nack-discard"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_type_display() {
        assert_eq!(AckType::Ack.to_string(), "ack");
        assert_eq!(AckType::NackRequeue.to_string(), "nack-requeue");
        assert_eq!(AckType::NackDiscard.to_string(), "nack-discard");
    }
}

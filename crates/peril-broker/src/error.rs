/// Errors that can occur talking to the message broker.
///
/// The variants follow the points where a broker can refuse us: getting
/// a connection or channel, declaring topology, publishing, consuming,
/// and settling a delivery.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Dialing the broker or opening a channel failed.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The broker rejected an exchange, queue or binding declaration
    /// (for example an exchange redeclared with a different kind).
    #[error("declaration failed: {0}")]
    Declaration(String),

    /// Handing a message to the broker failed.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Starting a consumer failed.
    #[error("consume failed: {0}")]
    Consume(String),

    /// An ack or nack could not be delivered.
    #[error("acknowledgement failed: {0}")]
    Acknowledge(String),

    /// The connection was closed.
    #[error("broker connection closed")]
    Closed,
}

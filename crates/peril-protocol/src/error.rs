//! Error types for the protocol layer.
//!
//! Each crate in Peril defines its own error enum. When you see a
//! `ProtocolError`, the problem is in turning payloads into bytes (or
//! back), not in talking to the broker or in game rules.

/// Boxed source error produced by whichever codec failed.
pub type CodecSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in the protocol layer.
///
/// Encoding and decoding are distinct variants on purpose: an encode
/// failure aborts a publish call, while a decode failure only affects
/// the one delivery being consumed.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    ///
    /// The source is the original error from the codec backend
    /// (`serde_json`, `rmp_serde`), boxed so callers handle every
    /// codec the same way.
    #[error("encode failed ({content_type}): {source}")]
    Encode {
        content_type: &'static str,
        #[source]
        source: CodecSource,
    },

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: malformed bytes, missing required fields, an
    /// unknown enum tag, or a body written for a different payload type.
    #[error("decode failed ({content_type}): {source}")]
    Decode {
        content_type: &'static str,
        #[source]
        source: CodecSource,
    },

    /// The delivery was tagged with a content type this codec does not
    /// speak. Decoding anyway would only produce garbage.
    #[error("content type mismatch: expected {expected}, got {actual}")]
    ContentTypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// The message is invalid at the protocol level.
    ///
    /// For values that parse as text but name nothing we know, such as
    /// an unknown location or unit rank.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

//! Codec trait and implementations for serializing/deserializing payloads.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw message
//! bodies. The pub/sub layer doesn't care HOW payloads are serialized, it
//! only needs something that implements [`Codec`]. This is the "strategy
//! pattern": one interface, interchangeable implementations.
//!
//! Two strategies ship with Peril:
//!
//! - [`JsonCodec`]: human-readable, used for pause, move and war payloads.
//! - [`MsgpackCodec`]: compact binary with named fields, used for game logs.
//!
//! Every codec also names the content type it writes, so a consumer can
//! refuse a body that was produced by a different codec instead of
//! decoding garbage.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between the tokio tasks that run
///   subscriptions and the command loop.
/// - `'static` → the codec owns everything it needs, so it can live
///   inside a long-running consumer task.
///
/// `encode` and `decode` are generic, so one codec value serves every
/// payload type. That is what lets the bus stay ignorant of concrete
/// message schemas.
pub trait Codec: Send + Sync + 'static {
    /// The MIME type stamped on every message this codec produces.
    fn content_type(&self) -> &'static str;

    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be
    /// represented in this format.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// Fails closed: a body that doesn't describe a `T` is an error,
    /// never a default-constructed `T`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Checks a delivery's content-type tag against this codec.
    ///
    /// A missing tag is accepted (some publishers never set one); a tag
    /// naming another format is rejected.
    fn check_content_type(
        &self,
        content_type: Option<&str>,
    ) -> Result<(), ProtocolError> {
        match content_type {
            Some(actual) if actual != self.content_type() => {
                Err(ProtocolError::ContentTypeMismatch {
                    expected: self.content_type(),
                    actual: actual.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// Content type written by [`JsonCodec`].
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type written by [`MsgpackCodec`].
pub const CONTENT_TYPE_MSGPACK: &str = "application/x-msgpack";

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON is what peers written in other languages expect for control,
/// move and war payloads, and it is easy to eyeball in the broker's
/// management UI.
///
/// This is behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use peril_protocol::{Codec, JsonCodec, PlayingState};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&PlayingState { is_paused: true }).unwrap();
/// assert_eq!(bytes, br#"{"IsPaused":true}"#);
///
/// let decoded: PlayingState = codec.decode(&bytes).unwrap();
/// assert!(decoded.is_paused);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_JSON
    }

    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(|e| ProtocolError::Encode {
            content_type: CONTENT_TYPE_JSON,
            source: Box::new(e),
        })
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::Decode {
            content_type: CONTENT_TYPE_JSON,
            source: Box::new(e),
        })
    }
}

// ---------------------------------------------------------------------------
// MsgpackCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses MessagePack (via `rmp_serde`).
///
/// Structs are written as maps keyed by field name (`to_vec_named`), so
/// the bytes are self-describing: a reader in another language can find
/// `Username` without knowing our field order. The result is still a
/// fraction of the JSON size.
///
/// This is behind the `msgpack` feature flag (enabled by default).
#[cfg(feature = "msgpack")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgpackCodec;

#[cfg(feature = "msgpack")]
impl Codec for MsgpackCodec {
    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_MSGPACK
    }

    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        rmp_serde::to_vec_named(value).map_err(|e| ProtocolError::Encode {
            content_type: CONTENT_TYPE_MSGPACK,
            source: Box::new(e),
        })
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        rmp_serde::from_slice(data).map_err(|e| ProtocolError::Decode {
            content_type: CONTENT_TYPE_MSGPACK,
            source: Box::new(e),
        })
    }
}

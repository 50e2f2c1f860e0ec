//! Wire protocol for Peril.
//!
//! This crate defines the "language" that Peril clients and the server
//! speak through the broker:
//!
//! - **Types** ([`ArmyMove`], [`RecognitionOfWar`], [`PlayingState`],
//!   [`GameLog`], ...): the payloads carried in message bodies.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`], [`MsgpackCodec`]): how
//!   payloads are converted to/from bytes, and which content type tags
//!   them.
//! - **Routing** ([`routing`]): exchange names, routing keys, queue names.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between the broker (raw bodies) and the game
//! (typed state transitions). It knows nothing about connections or
//! acknowledgments.
//!
//! ```text
//! Broker (bytes + content type) → Protocol (typed payload) → Game (state)
//! ```

mod codec;
mod error;
pub mod routing;
mod types;

pub use codec::{Codec, CONTENT_TYPE_JSON, CONTENT_TYPE_MSGPACK};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
#[cfg(feature = "msgpack")]
pub use codec::MsgpackCodec;
pub use error::{CodecSource, ProtocolError};
pub use types::{
    ArmyMove, GameLog, Location, PlayerSnapshot, PlayingState,
    RecognitionOfWar, Unit, UnitId, UnitRank,
};

//! Typed publish/subscribe for Peril.
//!
//! This crate is the "message bus": it sits on top of a [`Broker`]
//! (any implementation) and a [`Codec`], and gives the game typed
//! operations:
//!
//! - **Topology** ([`declare_exchanges`], [`declare_and_bind`]): the
//!   exchanges, queues and bindings Peril needs, declared idempotently.
//! - **Publish** ([`publish`], [`Publisher`]): encode and send.
//! - **Subscribe** ([`subscribe`], [`Subscription`]): one task per
//!   queue that decodes each delivery, runs a handler, and settles the
//!   delivery with the handler's [`AckType`].
//!
//! Nothing here knows about game rules. The handlers that carry them
//! live in the `peril` crate.
//!
//! [`Broker`]: peril_broker::Broker
//! [`Codec`]: peril_protocol::Codec

mod ack;
mod error;
mod publish;
mod subscribe;
mod topology;

pub use ack::AckType;
pub use error::PubSubError;
pub use publish::{publish, publish_json, publish_msgpack, Publisher};
pub use subscribe::{subscribe, subscribe_json, subscribe_msgpack, Handler, Subscription};
pub use topology::{declare_and_bind, declare_exchanges};

//! # Peril
//!
//! A strategy game whose players never talk to each other directly:
//! every move, war and log line travels through a message broker.
//!
//! This crate ties the layers together:
//!
//! ```text
//! peril-broker (AMQP / in-memory)
//!   → peril-pubsub (topology, typed publish/subscribe, acks)
//!     → handlers (this crate)
//!       → peril-game (coordinator actor)
//! ```
//!
//! and ships the two binaries, `peril-server` and `peril-client`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use peril::prelude::*;
//!
//! # async fn run() -> Result<(), PerilError> {
//! let config = PerilConfig::from_env();
//! let broker = AmqpBroker::connect(&config.amqp_url).await?;
//! let session = ClientSession::start(&broker, "alice", &config).await?;
//! println!("{}", session.execute(ClientCommand::Status).await?);
//! # Ok(())
//! # }
//! ```

mod client;
mod command;
mod config;
mod error;
mod logging;
mod server;

pub use client::{handler_move, handler_pause, handler_war, ClientSession};
pub use command::{
    parse_client, parse_server, validate_username, ClientCommand, ServerCommand,
    CLIENT_HELP, SERVER_HELP,
};
pub use config::{PerilConfig, ENV_AMQP_URL, ENV_LOG_FILE};
pub use error::PerilError;
pub use logging::{init_tracing, DEFAULT_FILTER};
pub use server::{handler_logs, GameLogWriter, ServerSession};

/// Common imports for Peril binaries and tests.
pub mod prelude {
    pub use crate::{
        init_tracing, parse_client, parse_server, ClientCommand, ClientSession,
        PerilConfig, PerilError, ServerCommand, ServerSession, validate_username,
        CLIENT_HELP, SERVER_HELP,
    };
    pub use peril_broker::{AmqpBroker, Broker, MemoryBroker};
    pub use peril_game::{GameError, GameHandle, MoveOutcome, WarOutcome};
    pub use peril_protocol::{Location, UnitRank};
}

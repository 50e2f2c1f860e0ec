//! Game state coordination for Peril.
//!
//! Each participant runs one coordinator: a Tokio task (actor model)
//! that owns the participant's [`GameState`] and applies inbound
//! messages and local commands to it one at a time.
//!
//! # Key types
//!
//! - [`GameState`]: the pure state machine (moves, wars, pause, commands)
//! - [`GameHandle`]: send commands to a running coordinator
//! - [`MoveOutcome`], [`WarOutcome`]: what a move or war meant for us
//! - [`battle`]: the dominance rules wars are decided by

pub mod battle;
mod coordinator;
mod error;
mod state;

pub use coordinator::{spawn_coordinator, GameHandle, MoveReport, DEFAULT_CAPACITY};
pub use error::GameError;
pub use state::{GameState, MoveOutcome, StatusReport, WarOutcome, WarResolution};

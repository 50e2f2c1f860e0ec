//! Error types for the game layer.

use peril_protocol::UnitId;

/// Errors that can occur running a local command against the game state.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The server paused the game; moves are refused until it resumes.
    #[error("the game is paused")]
    Paused,

    /// The player doesn't own a unit with this ID.
    #[error("unit {0} not found")]
    UnknownUnit(UnitId),

    /// The command is malformed (for example a move without units).
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The coordinator's command channel is closed.
    #[error("game coordinator for {0} is unavailable")]
    Unavailable(String),
}

//! Coordinator actor: a Tokio task that owns a participant's game state.
//!
//! Subscription handlers and the command loop all run concurrently, but
//! none of them touch [`GameState`] directly. They send commands through
//! a [`GameHandle`], and the actor applies them one at a time, so there
//! is never more than one transition in flight and no lock is needed.

use peril_protocol::{
    ArmyMove, Location, PlayerSnapshot, PlayingState, RecognitionOfWar, Unit,
    UnitId, UnitRank,
};
use tokio::sync::{mpsc, oneshot};

use crate::{GameError, GameState, MoveOutcome, StatusReport, WarResolution};

/// Default command channel size for the coordinator actor.
pub const DEFAULT_CAPACITY: usize = 64;

/// The coordinator's answer to an inbound army move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub outcome: MoveOutcome,
    /// Set when `outcome` is [`MoveOutcome::MakeWar`]: the declaration to
    /// publish, built in the same transition so the defender snapshot
    /// matches the state the decision was made on.
    pub recognition: Option<RecognitionOfWar>,
}

/// Commands sent to the coordinator through its channel.
///
/// Every variant carries a `oneshot` reply channel: callers always wait
/// for the transition to finish.
pub(crate) enum GameCommand {
    Pause {
        state: PlayingState,
        reply: oneshot::Sender<()>,
    },
    Move {
        army_move: ArmyMove,
        reply: oneshot::Sender<MoveReport>,
    },
    War {
        war: RecognitionOfWar,
        reply: oneshot::Sender<WarResolution>,
    },
    Spawn {
        location: Location,
        rank: UnitRank,
        reply: oneshot::Sender<Unit>,
    },
    MoveUnits {
        to: Location,
        ids: Vec<UnitId>,
        reply: oneshot::Sender<Result<ArmyMove, GameError>>,
    },
    Status {
        reply: oneshot::Sender<StatusReport>,
    },
    Snapshot {
        reply: oneshot::Sender<PlayerSnapshot>,
    },
    Shutdown,
}

/// Handle to a running coordinator. Cheap to clone.
#[derive(Clone)]
pub struct GameHandle {
    username: String,
    sender: mpsc::Sender<GameCommand>,
}

impl GameHandle {
    /// The local player's name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Sends a command built around `reply` and waits for the answer.
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> GameCommand,
    ) -> Result<T, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> GameError {
        GameError::Unavailable(self.username.clone())
    }

    pub async fn handle_pause(&self, state: PlayingState) -> Result<(), GameError> {
        self.request(|reply| GameCommand::Pause { state, reply }).await
    }

    pub async fn handle_move(&self, army_move: ArmyMove) -> Result<MoveReport, GameError> {
        self.request(|reply| GameCommand::Move { army_move, reply })
            .await
    }

    pub async fn handle_war(
        &self,
        war: RecognitionOfWar,
    ) -> Result<WarResolution, GameError> {
        self.request(|reply| GameCommand::War { war, reply }).await
    }

    pub async fn spawn(
        &self,
        location: Location,
        rank: UnitRank,
    ) -> Result<Unit, GameError> {
        self.request(|reply| GameCommand::Spawn {
            location,
            rank,
            reply,
        })
        .await
    }

    /// Moves local units. Fails while paused or for unknown unit IDs.
    pub async fn move_units(
        &self,
        to: Location,
        ids: Vec<UnitId>,
    ) -> Result<ArmyMove, GameError> {
        self.request(|reply| GameCommand::MoveUnits { to, ids, reply })
            .await?
    }

    pub async fn status(&self) -> Result<StatusReport, GameError> {
        self.request(|reply| GameCommand::Status { reply }).await
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot, GameError> {
        self.request(|reply| GameCommand::Snapshot { reply }).await
    }

    /// Stops the actor. Later calls on any handle fail with
    /// [`GameError::Unavailable`].
    pub async fn shutdown(&self) -> Result<(), GameError> {
        self.sender
            .send(GameCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

/// The actor itself. Runs inside a Tokio task.
struct GameActor {
    state: GameState,
    receiver: mpsc::Receiver<GameCommand>,
}

impl GameActor {
    /// Processes commands until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(username = %self.state.username(), "game coordinator started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                GameCommand::Pause { state, reply } => {
                    self.state.handle_pause(state);
                    let _ = reply.send(());
                }
                GameCommand::Move { army_move, reply } => {
                    let outcome = self.state.handle_move(&army_move);
                    let recognition = (outcome == MoveOutcome::MakeWar)
                        .then(|| self.state.recognize_war(&army_move));
                    tracing::debug!(
                        username = %self.state.username(),
                        mover = %army_move.player.username,
                        %outcome,
                        "move handled"
                    );
                    let _ = reply.send(MoveReport {
                        outcome,
                        recognition,
                    });
                }
                GameCommand::War { war, reply } => {
                    let _ = reply.send(self.state.handle_war(&war));
                }
                GameCommand::Spawn {
                    location,
                    rank,
                    reply,
                } => {
                    let _ = reply.send(self.state.spawn(location, rank));
                }
                GameCommand::MoveUnits { to, ids, reply } => {
                    let _ = reply.send(self.state.move_units(to, &ids));
                }
                GameCommand::Status { reply } => {
                    let _ = reply.send(self.state.status());
                }
                GameCommand::Snapshot { reply } => {
                    let _ = reply.send(self.state.snapshot());
                }
                GameCommand::Shutdown => {
                    tracing::info!(username = %self.state.username(), "game coordinator shutting down");
                    break;
                }
            }
        }

        tracing::info!(username = %self.state.username(), "game coordinator stopped");
    }
}

/// Spawns a coordinator for `username` and returns a handle to it.
///
/// `capacity` bounds the command channel; when it is full, senders wait.
pub fn spawn_coordinator(username: impl Into<String>, capacity: usize) -> GameHandle {
    let username = username.into();
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let actor = GameActor {
        state: GameState::new(username.clone()),
        receiver,
    };
    tokio::spawn(actor.run());
    GameHandle { username, sender }
}

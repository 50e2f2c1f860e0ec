//! The client side: message handlers and the command session.
//!
//! A client subscribes three queues, each with its own handler:
//!
//! | queue                 | binding         | class     | handler           |
//! |-----------------------|-----------------|-----------|-------------------|
//! | `pause.<user>`        | `pause`         | transient | [`handler_pause`] |
//! | `army_moves.<user>`   | `army_moves.*`  | transient | [`handler_move`]  |
//! | `war` (shared)        | `war.*`         | durable   | [`handler_war`]   |
//!
//! Handlers never touch game state directly; they go through the
//! coordinator's [`GameHandle`] and publish derived messages on the
//! shared [`Publisher`].

use peril_broker::{Broker, BrokerChannel, QueueDurability};
use peril_game::{spawn_coordinator, GameHandle, WarOutcome};
use peril_protocol::routing::{
    army_moves_key, game_log_key, pause_queue, war_key, wildcard, ARMY_MOVES_PREFIX,
    EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, PAUSE_KEY, WAR_RECOGNITIONS_PREFIX,
};
use peril_protocol::{ArmyMove, GameLog, PlayingState, RecognitionOfWar};
use peril_pubsub::{
    declare_exchanges, subscribe_json, AckType, Handler, Publisher, Subscription,
};
use rand::seq::IndexedRandom;

use crate::{validate_username, ClientCommand, PerilConfig, PerilError};

/// Lines a player can flood the log with using `spam`.
const TAUNTS: &[&str] = &[
    "Never interrupt your enemy when he is making a mistake.",
    "The hardest thing of all for a soldier is to retreat.",
    "A soldier will fight long and hard for a bit of colored ribbon.",
    "It is well that war is so terrible, otherwise we should grow too fond of it.",
    "All warfare is based on deception.",
    "The supreme art of war is to subdue the enemy without fighting.",
];

fn random_taunt() -> &'static str {
    TAUNTS.choose(&mut rand::rng()).copied().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Applies pause/resume broadcasts. Always acknowledged.
pub fn handler_pause(game: GameHandle) -> impl Handler<PlayingState> {
    move |state: PlayingState| {
        let game = game.clone();
        async move {
            if let Err(error) = game.handle_pause(state).await {
                tracing::warn!(%error, "pause not applied");
            }
            AckType::Ack
        }
    }
}

/// Applies another player's move; declares war when it lands on us.
///
/// The declaration goes to `war.<our username>`. If it can't be
/// published the move is requeued so the war isn't lost.
pub fn handler_move<Ch: BrokerChannel>(
    game: GameHandle,
    publisher: Publisher<Ch>,
) -> impl Handler<ArmyMove> {
    move |army_move: ArmyMove| {
        let game = game.clone();
        let publisher = publisher.clone();
        async move {
            let report = match game.handle_move(army_move).await {
                Ok(report) => report,
                Err(error) => {
                    tracing::warn!(%error, "move not applied");
                    return AckType::NackRequeue;
                }
            };

            let Some(war) = report.recognition else {
                return AckType::Ack;
            };

            let key = war_key(game.username());
            match publisher.publish_json(EXCHANGE_PERIL_TOPIC, &key, &war).await {
                Ok(()) => {
                    tracing::info!(
                        attacker = %war.attacker.username,
                        defender = %war.defender.username,
                        "war declared"
                    );
                    AckType::Ack
                }
                Err(error) => {
                    tracing::warn!(%error, routing_key = %key, "failed to declare war");
                    AckType::NackRequeue
                }
            }
        }
    }
}

/// Resolves wars we are part of and logs the result.
///
/// | outcome                    | ack          |
/// |----------------------------|--------------|
/// | not involved               | NackRequeue  |
/// | no units                   | NackDiscard  |
/// | won / lost / draw          | Ack          |
///
/// The game log goes to `game_logs.<attacker>`. Logging is best effort:
/// a failed publish is reported but the war stays acknowledged.
pub fn handler_war<Ch: BrokerChannel>(
    game: GameHandle,
    publisher: Publisher<Ch>,
) -> impl Handler<RecognitionOfWar> {
    move |war: RecognitionOfWar| {
        let game = game.clone();
        let publisher = publisher.clone();
        async move {
            let attacker = war.attacker.username.clone();
            let resolution = match game.handle_war(war).await {
                Ok(resolution) => resolution,
                Err(error) => {
                    tracing::warn!(%error, "war not applied");
                    return AckType::NackRequeue;
                }
            };

            match resolution.outcome {
                WarOutcome::NotInvolved => return AckType::NackRequeue,
                WarOutcome::NoUnits => return AckType::NackDiscard,
                WarOutcome::OpponentWon | WarOutcome::YouWon | WarOutcome::Draw => {}
            }

            if let Some(message) = resolution.log_message() {
                let log = GameLog::new(game.username(), message);
                let key = game_log_key(&attacker);
                if let Err(error) = publisher
                    .publish_msgpack(EXCHANGE_PERIL_TOPIC, &key, &log)
                    .await
                {
                    tracing::warn!(%error, routing_key = %key, "failed to publish game log");
                }
            }
            AckType::Ack
        }
    }
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

/// A connected client: its coordinator, publisher and subscriptions.
pub struct ClientSession<B: Broker> {
    game: GameHandle,
    publisher: Publisher<B::Channel>,
    subscriptions: Vec<Subscription>,
}

impl<B: Broker> ClientSession<B> {
    /// Declares the topology, starts the coordinator for `username` and
    /// subscribes the pause, move and war queues.
    ///
    /// # Errors
    /// [`GameError::InvalidCommand`](peril_game::GameError) if `username`
    /// can't be used in a routing key, otherwise any broker or
    /// declaration failure. These are fatal at startup.
    pub async fn start(
        broker: &B,
        username: &str,
        config: &PerilConfig,
    ) -> Result<Self, PerilError> {
        validate_username(username)?;
        let channel = broker.open_channel().await?;
        declare_exchanges(&channel).await?;
        let publisher = Publisher::new(channel);
        let game = spawn_coordinator(username, config.coordinator_capacity);

        let pause = subscribe_json::<_, PlayingState, _>(
            broker,
            EXCHANGE_PERIL_DIRECT,
            &pause_queue(username),
            PAUSE_KEY,
            QueueDurability::Transient,
            handler_pause(game.clone()),
        )
        .await?;

        let moves = subscribe_json::<_, ArmyMove, _>(
            broker,
            EXCHANGE_PERIL_TOPIC,
            &army_moves_key(username),
            &wildcard(ARMY_MOVES_PREFIX),
            QueueDurability::Transient,
            handler_move(game.clone(), publisher.clone()),
        )
        .await?;

        let wars = subscribe_json::<_, RecognitionOfWar, _>(
            broker,
            EXCHANGE_PERIL_TOPIC,
            WAR_RECOGNITIONS_PREFIX,
            &wildcard(WAR_RECOGNITIONS_PREFIX),
            QueueDurability::Durable,
            handler_war(game.clone(), publisher.clone()),
        )
        .await?;

        tracing::info!(username, "client session started");
        Ok(Self {
            game,
            publisher,
            subscriptions: vec![pause, moves, wars],
        })
    }

    pub fn game(&self) -> &GameHandle {
        &self.game
    }

    pub fn username(&self) -> &str {
        self.game.username()
    }

    /// The queues this session consumes from.
    pub fn queues(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(Subscription::queue)
    }

    /// Runs a game command and returns the text to show the player.
    ///
    /// `help` and `quit` belong to the terminal loop and produce no
    /// output here.
    pub async fn execute(&self, command: ClientCommand) -> Result<String, PerilError> {
        match command {
            ClientCommand::Spawn { location, rank } => {
                let unit = self.game.spawn(location, rank).await?;
                Ok(format!("Spawned a(n) {rank} in {location} with id {}", unit.id))
            }
            ClientCommand::Move { to, units } => {
                let army_move = self.game.move_units(to, units).await?;
                self.publish_move(&army_move).await?;
                Ok(format!("Moved {} units to {to}", army_move.units.len()))
            }
            ClientCommand::Status => Ok(self.game.status().await?.to_string()),
            ClientCommand::Spam(n) => {
                self.spam(n).await?;
                Ok(format!("Published {n} malicious logs"))
            }
            ClientCommand::Help | ClientCommand::Quit => Ok(String::new()),
        }
    }

    async fn publish_move(&self, army_move: &ArmyMove) -> Result<(), PerilError> {
        let key = army_moves_key(self.username());
        self.publisher
            .publish_json(EXCHANGE_PERIL_TOPIC, &key, army_move)
            .await?;
        Ok(())
    }

    /// Publishes `n` game logs with random taunts under our name.
    pub async fn spam(&self, n: usize) -> Result<(), PerilError> {
        let key = game_log_key(self.username());
        for _ in 0..n {
            let log = GameLog::new(self.username(), random_taunt());
            self.publisher
                .publish_msgpack(EXCHANGE_PERIL_TOPIC, &key, &log)
                .await?;
        }
        Ok(())
    }
}

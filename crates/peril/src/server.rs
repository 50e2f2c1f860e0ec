//! The server side: game log sink and pause/resume broadcasts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use peril_broker::{Broker, QueueDurability};
use peril_protocol::routing::{
    wildcard, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG, PAUSE_KEY,
};
use peril_protocol::{GameLog, PlayingState};
use peril_pubsub::{
    declare_exchanges, subscribe_msgpack, AckType, Handler, Publisher, Subscription,
};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{PerilConfig, PerilError};

// ---------------------------------------------------------------------------
// GameLogWriter
// ---------------------------------------------------------------------------

/// Appends game logs to a file, one line per record:
///
/// ```text
/// 2026-01-01T12:00:00+00:00 alice: bob won a against alice
/// ```
///
/// Cheap to clone; clones write to the same file.
#[derive(Clone)]
pub struct GameLogWriter {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl GameLogWriter {
    /// Opens `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PerilError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and flushes it.
    pub async fn write(&self, log: &GameLog) -> std::io::Result<()> {
        let line = format!("{log}\n");
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// Writes each game log to `writer`. A record that can't be written is
/// discarded to the dead-letter queue rather than retried forever.
pub fn handler_logs(writer: GameLogWriter) -> impl Handler<GameLog> {
    move |log: GameLog| {
        let writer = writer.clone();
        async move {
            match writer.write(&log).await {
                Ok(()) => AckType::Ack,
                Err(error) => {
                    tracing::error!(
                        %error,
                        path = %writer.path().display(),
                        username = %log.username,
                        "failed to write game log"
                    );
                    AckType::NackDiscard
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ServerSession
// ---------------------------------------------------------------------------

/// A connected server: the log subscription plus a publisher for
/// pause/resume.
pub struct ServerSession<B: Broker> {
    publisher: Publisher<B::Channel>,
    logs: Subscription,
}

impl<B: Broker> ServerSession<B> {
    /// Declares the topology, opens the log file and subscribes the
    /// durable `game_logs` queue.
    pub async fn start(broker: &B, config: &PerilConfig) -> Result<Self, PerilError> {
        let channel = broker.open_channel().await?;
        declare_exchanges(&channel).await?;
        let publisher = Publisher::new(channel);

        let writer = GameLogWriter::open(&config.log_file).await?;
        let logs = subscribe_msgpack::<_, GameLog, _>(
            broker,
            EXCHANGE_PERIL_TOPIC,
            GAME_LOG_SLUG,
            &wildcard(GAME_LOG_SLUG),
            QueueDurability::Durable,
            handler_logs(writer),
        )
        .await?;

        tracing::info!(log_file = %config.log_file.display(), "server session started");
        Ok(Self { publisher, logs })
    }

    /// Tells every client to pause.
    pub async fn pause(&self) -> Result<(), PerilError> {
        self.broadcast(true).await
    }

    /// Tells every client to resume.
    pub async fn resume(&self) -> Result<(), PerilError> {
        self.broadcast(false).await
    }

    async fn broadcast(&self, is_paused: bool) -> Result<(), PerilError> {
        self.publisher
            .publish_json(EXCHANGE_PERIL_DIRECT, PAUSE_KEY, &PlayingState { is_paused })
            .await?;
        tracing::info!(paused = is_paused, "playing state broadcast");
        Ok(())
    }

    /// The log queue's name.
    pub fn log_queue(&self) -> &str {
        self.logs.queue()
    }

    /// Waits for the log subscription to end (the connection closed) and
    /// returns how many records it settled.
    pub async fn closed(self) -> u64 {
        self.logs.closed().await
    }
}

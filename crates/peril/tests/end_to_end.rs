//! Integration tests: a server and two clients sharing one in-memory
//! broker, driven through the same command API the binaries use.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use peril::prelude::*;
use peril_broker::MemoryConnection;

// =========================================================================
// Helpers
// =========================================================================

const WAIT: Duration = Duration::from_secs(5);

fn unique_log_file(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "peril-e2e-{name}-{}-{n}.log",
        std::process::id()
    ))
}

struct Game {
    broker: MemoryBroker,
    config: PerilConfig,
    server: ServerSession<MemoryConnection>,
}

impl Game {
    async fn start(name: &str) -> Self {
        let path = unique_log_file(name);
        let _ = tokio::fs::remove_file(&path).await;

        let broker = MemoryBroker::new();
        let config = PerilConfig::default().log_file(path);
        let server = ServerSession::start(&broker.connect(), &config)
            .await
            .expect("server start");
        Self {
            broker,
            config,
            server,
        }
    }

    async fn join(&self, username: &str) -> ClientSession<MemoryConnection> {
        ClientSession::start(&self.broker.connect(), username, &self.config)
            .await
            .expect("client start")
    }

    fn log_file(&self) -> &Path {
        &self.config.log_file
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.config.log_file);
    }
}

/// Polls the log file until it has at least `n` lines.
async fn wait_for_lines(path: &Path, n: usize) -> Vec<String> {
    tokio::time::timeout(WAIT, async {
        loop {
            if let Ok(contents) = tokio::fs::read_to_string(path).await {
                let lines: Vec<String> = contents.lines().map(str::to_string).collect();
                if lines.len() >= n {
                    return lines;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for game log lines")
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_sessions_consume_expected_queues() {
    let game = Game::start("queues").await;
    let alice = game.join("alice").await;

    let queues: Vec<&str> = alice.queues().collect();
    assert_eq!(queues, vec!["pause.alice", "army_moves.alice", "war"]);
    assert_eq!(game.server.log_queue(), "game_logs");
    assert!(game.broker.queue_exists("peril_dlq"));
}

#[tokio::test]
async fn test_move_into_enemy_starts_war_and_logs_result() {
    let game = Game::start("war").await;
    let alice = game.join("alice").await;
    let bob = game.join("bob").await;

    alice
        .execute(ClientCommand::Spawn {
            location: Location::Europe,
            rank: UnitRank::Infantry,
        })
        .await
        .unwrap();
    bob.execute(ClientCommand::Spawn {
        location: Location::Asia,
        rank: UnitRank::Cavalry,
    })
    .await
    .unwrap();

    let output = alice
        .execute(ClientCommand::Move {
            to: Location::Asia,
            units: vec![1],
        })
        .await
        .unwrap();
    assert_eq!(output, "Moved 1 units to asia");

    // Cavalry beats infantry: the defender wins.
    let lines = wait_for_lines(game.log_file(), 1).await;
    assert_eq!(lines.len(), 1);
    assert!(
        lines[0].ends_with("bob won a against alice"),
        "unexpected log line: {}",
        lines[0]
    );
}

#[tokio::test]
async fn test_pause_reaches_clients_and_blocks_moves() {
    let game = Game::start("pause").await;
    let alice = game.join("alice").await;
    alice
        .execute(ClientCommand::Spawn {
            location: Location::Europe,
            rank: UnitRank::Artillery,
        })
        .await
        .unwrap();

    game.server.pause().await.unwrap();
    tokio::time::timeout(WAIT, async {
        while !alice.game().status().await.unwrap().paused {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pause never arrived");

    let result = alice
        .execute(ClientCommand::Move {
            to: Location::Asia,
            units: vec![1],
        })
        .await;
    assert!(matches!(
        result,
        Err(PerilError::Game(GameError::Paused))
    ));

    game.server.resume().await.unwrap();
    tokio::time::timeout(WAIT, async {
        while alice.game().status().await.unwrap().paused {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("resume never arrived");

    alice
        .execute(ClientCommand::Move {
            to: Location::Asia,
            units: vec![1],
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_spam_writes_one_line_per_log() {
    let game = Game::start("spam").await;
    let alice = game.join("alice").await;

    let output = alice.execute(ClientCommand::Spam(3)).await.unwrap();
    assert_eq!(output, "Published 3 malicious logs");

    let lines = wait_for_lines(game.log_file(), 3).await;
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|line| line.contains(" alice: ")));
}

#[tokio::test]
async fn test_status_lists_spawned_units() {
    let game = Game::start("status").await;
    let alice = game.join("alice").await;

    alice
        .execute(ClientCommand::Spawn {
            location: Location::Americas,
            rank: UnitRank::Infantry,
        })
        .await
        .unwrap();

    let status = alice.execute(ClientCommand::Status).await.unwrap();
    assert!(status.contains("You are alice, and you have 1 units."), "{status}");
}

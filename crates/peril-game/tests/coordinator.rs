//! Integration tests for the coordinator actor.
//!
//! Two coordinators ("alice" and "bob") exchange moves and wars by hand,
//! standing in for the broker, so the whole negotiation can be checked
//! without any messaging infrastructure.

use peril_game::{spawn_coordinator, GameError, MoveOutcome, WarOutcome, DEFAULT_CAPACITY};
use peril_protocol::{Location, PlayingState, UnitRank};

#[tokio::test]
async fn test_spawn_then_status() {
    let alice = spawn_coordinator("alice", DEFAULT_CAPACITY);
    for _ in 0..3 {
        alice
            .spawn(Location::Europe, UnitRank::Infantry)
            .await
            .expect("spawn");
    }

    let status = alice.status().await.expect("status");
    assert_eq!(status.username, "alice");
    assert_eq!(status.count_at(Location::Europe, UnitRank::Infantry), 3);
    assert_eq!(status.units.len(), 3);
}

#[tokio::test]
async fn test_move_onto_defender_produces_war_declaration() {
    let alice = spawn_coordinator("alice", DEFAULT_CAPACITY);
    let bob = spawn_coordinator("bob", DEFAULT_CAPACITY);

    for _ in 0..2 {
        alice.spawn(Location::Europe, UnitRank::Infantry).await.unwrap();
    }
    bob.spawn(Location::Asia, UnitRank::Cavalry).await.unwrap();

    let mv = alice.move_units(Location::Asia, vec![1, 2]).await.expect("move");

    // The topic exchange echoes the move back to alice as well.
    let echo = alice.handle_move(mv.clone()).await.unwrap();
    assert_eq!(echo.outcome, MoveOutcome::SamePlayer);
    assert!(echo.recognition.is_none());

    let report = bob.handle_move(mv).await.unwrap();
    assert_eq!(report.outcome, MoveOutcome::MakeWar);
    let war = report.recognition.expect("war declaration");
    assert_eq!(war.attacker.username, "alice");
    assert_eq!(war.defender.username, "bob");
    assert_eq!(war.defender, bob.snapshot().await.unwrap());

    // Two infantry against one cavalry: the defender wins.
    let on_bob = bob.handle_war(war.clone()).await.unwrap();
    assert_eq!(on_bob.outcome, WarOutcome::YouWon);
    assert_eq!(on_bob.log_message().as_deref(), Some("bob won a against alice"));

    let on_alice = alice.handle_war(war).await.unwrap();
    assert_eq!(on_alice.outcome, WarOutcome::OpponentWon);
    assert_eq!(alice.status().await.unwrap().units.len(), 0);
}

#[tokio::test]
async fn test_war_for_someone_else_is_not_involved() {
    let alice = spawn_coordinator("alice", DEFAULT_CAPACITY);
    let bob = spawn_coordinator("bob", DEFAULT_CAPACITY);
    let carol = spawn_coordinator("carol", DEFAULT_CAPACITY);

    alice.spawn(Location::Africa, UnitRank::Artillery).await.unwrap();
    bob.spawn(Location::Africa, UnitRank::Infantry).await.unwrap();
    let mv = alice.move_units(Location::Africa, vec![1]).await.unwrap();
    let war = bob
        .handle_move(mv)
        .await
        .unwrap()
        .recognition
        .expect("war declaration");

    let res = carol.handle_war(war).await.unwrap();
    assert_eq!(res.outcome, WarOutcome::NotInvolved);
    assert_eq!(res.log_message(), None);
}

#[tokio::test]
async fn test_pause_blocks_moves_but_not_spawns() {
    let alice = spawn_coordinator("alice", DEFAULT_CAPACITY);
    alice.spawn(Location::Europe, UnitRank::Cavalry).await.unwrap();

    alice
        .handle_pause(PlayingState { is_paused: true })
        .await
        .unwrap();
    let err = alice.move_units(Location::Asia, vec![1]).await.unwrap_err();
    assert!(matches!(err, GameError::Paused));
    alice.spawn(Location::Asia, UnitRank::Infantry).await.expect("spawn while paused");
    assert!(alice.status().await.unwrap().paused);

    alice
        .handle_pause(PlayingState { is_paused: false })
        .await
        .unwrap();
    alice.move_units(Location::Asia, vec![1]).await.expect("move after resume");
}

#[tokio::test]
async fn test_concurrent_spawns_get_unique_ids() {
    let alice = spawn_coordinator("alice", 4);

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let handle = alice.clone();
        tasks.push(tokio::spawn(async move {
            handle.spawn(Location::Americas, UnitRank::Infantry).await
        }));
    }
    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.expect("task").expect("spawn").id);
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}

#[tokio::test]
async fn test_shutdown_makes_handle_unavailable() {
    let alice = spawn_coordinator("alice", DEFAULT_CAPACITY);
    alice.shutdown().await.expect("shutdown");

    let err = alice.status().await.unwrap_err();
    assert!(matches!(err, GameError::Unavailable(name) if name == "alice"));
}

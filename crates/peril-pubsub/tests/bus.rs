//! Integration tests for the message bus.
//!
//! Everything runs against the in-process `MemoryBroker`, so the tests
//! exercise real routing, requeue and dead-lettering without needing a
//! RabbitMQ server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use peril_broker::{
    Broker, BrokerChannel, MemoryBroker, MemoryConnection, OutboundMessage,
    QueueDurability,
};
use peril_protocol::routing::{
    EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, PAUSE_KEY, QUEUE_PERIL_DLQ,
};
use peril_protocol::{GameLog, PlayingState};
use peril_pubsub::{
    declare_and_bind, declare_exchanges, publish_json, publish_msgpack,
    subscribe_json, subscribe_msgpack, AckType, Publisher,
};
use tokio::sync::mpsc;

/// Helper: a broker with the Peril exchanges declared, plus a connection.
async fn setup() -> (MemoryBroker, MemoryConnection) {
    let broker = MemoryBroker::new();
    let conn = broker.connect();
    let ch = conn.open_channel().await.expect("channel");
    declare_exchanges(&ch).await.expect("exchanges");
    (broker, conn)
}

/// Helper: waits for the next value a handler forwarded.
async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("handler should run in time")
        .expect("handler channel open")
}

/// Helper: polls until `check` is true or a second has passed.
async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_declare_exchanges_is_idempotent() {
    let (broker, conn) = setup().await;
    let ch = conn.open_channel().await.expect("channel");
    declare_exchanges(&ch).await.expect("second declaration");
    assert_eq!(broker.binding_count(QUEUE_PERIL_DLQ), 1);
}

#[tokio::test]
async fn test_declare_and_bind_twice_keeps_one_binding() {
    let (broker, conn) = setup().await;

    let (_, first) = declare_and_bind(
        &conn,
        EXCHANGE_PERIL_TOPIC,
        "war",
        "war.*",
        QueueDurability::Durable,
    )
    .await
    .expect("first");
    let (_, second) = declare_and_bind(
        &conn,
        EXCHANGE_PERIL_TOPIC,
        "war",
        "war.*",
        QueueDurability::Durable,
    )
    .await
    .expect("second");

    assert_eq!(first.name, second.name);
    assert_eq!(broker.binding_count("war"), 1);
}

#[tokio::test]
async fn test_declare_and_bind_rejects_durability_change() {
    let (_broker, conn) = setup().await;
    declare_and_bind(
        &conn,
        EXCHANGE_PERIL_TOPIC,
        "game_logs",
        "game_logs.*",
        QueueDurability::Durable,
    )
    .await
    .expect("first");

    let result = declare_and_bind(
        &conn,
        EXCHANGE_PERIL_TOPIC,
        "game_logs",
        "game_logs.*",
        QueueDurability::Transient,
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_json_subscription_receives_and_acks() {
    let (broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let sub = subscribe_json(
        &conn,
        EXCHANGE_PERIL_DIRECT,
        "pause.alice",
        PAUSE_KEY,
        QueueDurability::Transient,
        move |state: PlayingState| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(state);
                AckType::Ack
            }
        },
    )
    .await
    .expect("subscribe");
    assert_eq!(sub.queue(), "pause.alice");

    let ch = conn.open_channel().await.expect("channel");
    publish_json(&ch, EXCHANGE_PERIL_DIRECT, PAUSE_KEY, &PlayingState { is_paused: true })
        .await
        .expect("publish");

    assert_eq!(recv(&mut rx).await, PlayingState { is_paused: true });
    eventually(|| broker.queue_depth("pause.alice") == Some(0)).await;
    assert_eq!(broker.queue_depth(QUEUE_PERIL_DLQ), Some(0));
}

#[tokio::test]
async fn test_undecodable_message_is_discarded() {
    let (broker, conn) = setup().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    subscribe_json(
        &conn,
        EXCHANGE_PERIL_DIRECT,
        "pause.bob",
        PAUSE_KEY,
        QueueDurability::Transient,
        move |_: PlayingState| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { AckType::Ack }
        },
    )
    .await
    .expect("subscribe");

    let ch = conn.open_channel().await.expect("channel");
    ch.publish(
        EXCHANGE_PERIL_DIRECT,
        PAUSE_KEY,
        OutboundMessage::new("application/json", b"{not json".to_vec()),
    )
    .await
    .expect("raw publish");

    eventually(|| broker.queue_depth(QUEUE_PERIL_DLQ) == Some(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_content_type_mismatch_is_discarded() {
    let (broker, conn) = setup().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    subscribe_json(
        &conn,
        EXCHANGE_PERIL_DIRECT,
        "pause.carol",
        PAUSE_KEY,
        QueueDurability::Transient,
        move |_: PlayingState| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { AckType::Ack }
        },
    )
    .await
    .expect("subscribe");

    // A valid payload, but in the wrong format for this subscriber.
    let ch = conn.open_channel().await.expect("channel");
    publish_msgpack(&ch, EXCHANGE_PERIL_DIRECT, PAUSE_KEY, &PlayingState { is_paused: false })
        .await
        .expect("publish");

    eventually(|| broker.queue_depth(QUEUE_PERIL_DLQ) == Some(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_nack_requeue_redelivers_to_handler() {
    let (_broker, conn) = setup().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Reject the first attempt, accept the second.
    subscribe_msgpack(
        &conn,
        EXCHANGE_PERIL_TOPIC,
        "game_logs",
        "game_logs.*",
        QueueDurability::Durable,
        move |log: GameLog| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            let tx = tx.clone();
            async move {
                if attempt == 0 {
                    return AckType::NackRequeue;
                }
                let _ = tx.send(log.message);
                AckType::Ack
            }
        },
    )
    .await
    .expect("subscribe");

    let publisher = Publisher::new(conn.open_channel().await.expect("channel"));
    publisher
        .publish_msgpack(
            EXCHANGE_PERIL_TOPIC,
            "game_logs.alice",
            &GameLog::new("alice", "hello"),
        )
        .await
        .expect("publish");

    assert_eq!(recv(&mut rx).await, "hello");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_closed_reports_settled_count() {
    let (_broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let sub = subscribe_json(
        &conn,
        EXCHANGE_PERIL_DIRECT,
        "pause.dave",
        PAUSE_KEY,
        QueueDurability::Transient,
        move |state: PlayingState| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(state.is_paused);
                if state.is_paused {
                    AckType::Ack
                } else {
                    AckType::NackDiscard
                }
            }
        },
    )
    .await
    .expect("subscribe");

    let publisher = Publisher::new(conn.open_channel().await.expect("channel"));
    for paused in [true, false, true] {
        publisher
            .publish_json(EXCHANGE_PERIL_DIRECT, PAUSE_KEY, &PlayingState { is_paused: paused })
            .await
            .expect("publish");
    }
    for _ in 0..3 {
        recv(&mut rx).await;
    }

    conn.close().await.expect("close");
    let settled = tokio::time::timeout(Duration::from_secs(1), sub.closed())
        .await
        .expect("loop should end once the connection closes");
    assert_eq!(settled, 3);
}

//! In-process broker with AMQP-like semantics.
//!
//! `MemoryBroker` is the "server": it owns exchanges, queues and
//! bindings. [`MemoryBroker::connect`] hands out connections that
//! implement [`Broker`], so everything written against the traits runs
//! unchanged on top of it.
//!
//! What it models:
//! - direct, topic and fanout routing (plus the default `""` exchange,
//!   which routes to the queue named by the routing key)
//! - bindings as a set, so rebinding is a no-op
//! - exclusive queues owned by one connection, auto-deleted when their
//!   last consumer goes away or their connection closes
//! - manual acks; `nack(requeue)` puts the message back, `nack(discard)`
//!   routes it to the queue's dead-letter exchange
//! - a delivery dropped without being settled is requeued, like an
//!   unacked message on a closed AMQP channel
//!
//! Several consumers on one queue share its messages, one message per
//! consumer (the shared `war` queue relies on that).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};

use crate::{
    Broker, BrokerChannel, BrokerError, Consumer, Delivery, ExchangeKind,
    OutboundMessage, QueueDurability, QueueInfo, topic_matches,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Counter for server-named queues (declared with an empty name).
static NEXT_GENERATED_QUEUE: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Broker state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Shared {
    state: Mutex<BrokerState>,
}

impl Shared {
    /// Locks the broker state. A panic while holding the lock can't
    /// leave the maps half-updated in a way we care about, so a
    /// poisoned lock is simply taken over.
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, QueueState>,
    bindings: HashSet<Binding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Binding {
    queue: String,
    exchange: String,
    routing_key: String,
}

struct QueueState {
    durability: QueueDurability,
    dead_letter_exchange: String,
    /// Connection that owns an exclusive queue.
    owner: Option<u64>,
    sender: mpsc::UnboundedSender<StoredMessage>,
    receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<StoredMessage>>>,
    /// Messages waiting in the channel (not yet handed to a consumer).
    ready: Arc<AtomicUsize>,
    consumers: u32,
}

#[derive(Debug, Clone, Default)]
struct StoredMessage {
    routing_key: String,
    content_type: Option<String>,
    body: Vec<u8>,
    redelivered: bool,
}

impl BrokerState {
    fn enqueue(&self, queue: &str, message: StoredMessage) -> bool {
        let Some(q) = self.queues.get(queue) else {
            return false;
        };
        q.ready.fetch_add(1, Ordering::SeqCst);
        if q.sender.send(message).is_err() {
            q.ready.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Routes a message through `exchange`, returning how many queues
    /// received a copy. A queue matched by several bindings still gets
    /// one copy.
    fn route(
        &self,
        exchange: &str,
        routing_key: &str,
        message: StoredMessage,
    ) -> Result<usize, String> {
        if exchange.is_empty() {
            let delivered = usize::from(self.enqueue(routing_key, message));
            return Ok(delivered);
        }

        let kind = *self
            .exchanges
            .get(exchange)
            .ok_or_else(|| format!("no exchange '{exchange}'"))?;

        let targets: BTreeSet<&str> = self
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange)
            .filter(|b| match kind {
                ExchangeKind::Direct => b.routing_key == routing_key,
                ExchangeKind::Topic => topic_matches(&b.routing_key, routing_key),
                ExchangeKind::Fanout => true,
            })
            .map(|b| b.queue.as_str())
            .collect();

        let mut delivered = 0;
        for queue in targets {
            if self.enqueue(queue, message.clone()) {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    fn delete_queue(&mut self, name: &str) {
        if self.queues.remove(name).is_some() {
            self.bindings.retain(|b| b.queue != name);
            tracing::debug!(queue = name, "queue deleted");
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

/// An in-process broker. Cheap to clone; clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    /// Creates an empty broker with no exchanges or queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new connection to this broker.
    pub fn connect(&self) -> MemoryConnection {
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        let (closed, _) = watch::channel(false);
        tracing::debug!(connection = id, "memory connection opened");
        MemoryConnection {
            id,
            shared: Arc::clone(&self.shared),
            closed: Arc::new(closed),
        }
    }

    /// The kind an exchange was declared with, if it exists.
    pub fn exchange_kind(&self, name: &str) -> Option<ExchangeKind> {
        self.shared.lock().exchanges.get(name).copied()
    }

    /// Returns `true` if the queue exists.
    pub fn queue_exists(&self, name: &str) -> bool {
        self.shared.lock().queues.contains_key(name)
    }

    /// Number of messages waiting in the queue (excluding deliveries
    /// that are out with a consumer).
    pub fn queue_depth(&self, name: &str) -> Option<usize> {
        self.shared
            .lock()
            .queues
            .get(name)
            .map(|q| q.ready.load(Ordering::SeqCst))
    }

    /// Number of consumers attached to the queue.
    pub fn consumer_count(&self, name: &str) -> Option<u32> {
        self.shared.lock().queues.get(name).map(|q| q.consumers)
    }

    /// Number of bindings that target `queue`.
    pub fn binding_count(&self, queue: &str) -> usize {
        self.shared
            .lock()
            .bindings
            .iter()
            .filter(|b| b.queue == queue)
            .count()
    }
}

// ---------------------------------------------------------------------------
// MemoryConnection
// ---------------------------------------------------------------------------

/// A connection to a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryConnection {
    id: u64,
    shared: Arc<Shared>,
    closed: Arc<watch::Sender<bool>>,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<(), BrokerError> {
        if *self.closed.borrow() {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }
}

impl Broker for MemoryConnection {
    type Channel = MemoryChannel;

    async fn open_channel(&self) -> Result<MemoryChannel, BrokerError> {
        self.ensure_open()?;
        Ok(MemoryChannel {
            connection: self.clone(),
        })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.closed.send_replace(true);

        let mut state = self.shared.lock();
        let owned: Vec<String> = state
            .queues
            .iter()
            .filter(|(_, q)| q.owner == Some(self.id))
            .map(|(name, _)| name.clone())
            .collect();
        for name in owned {
            state.delete_queue(&name);
        }

        tracing::debug!(connection = self.id, "memory connection closed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryChannel
// ---------------------------------------------------------------------------

/// A channel on a [`MemoryConnection`].
#[derive(Clone)]
pub struct MemoryChannel {
    connection: MemoryConnection,
}

impl BrokerChannel for MemoryChannel {
    type Consumer = MemoryConsumer;

    async fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
    ) -> Result<(), BrokerError> {
        self.connection.ensure_open()?;
        let mut state = self.connection.shared.lock();
        match state.exchanges.get(name) {
            Some(existing) if *existing != kind => {
                Err(BrokerError::Declaration(format!(
                    "exchange '{name}' already declared as {existing}, not {kind}"
                )))
            }
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(name.to_string(), kind);
                tracing::debug!(exchange = name, %kind, "exchange declared");
                Ok(())
            }
        }
    }

    async fn declare_queue(
        &self,
        name: &str,
        durability: QueueDurability,
        dead_letter_exchange: &str,
    ) -> Result<QueueInfo, BrokerError> {
        self.connection.ensure_open()?;
        let name = if name.is_empty() {
            format!(
                "amq.gen-{}",
                NEXT_GENERATED_QUEUE.fetch_add(1, Ordering::Relaxed)
            )
        } else {
            name.to_string()
        };

        let mut state = self.connection.shared.lock();
        if let Some(existing) = state.queues.get(&name) {
            if existing.durability != durability
                || existing.dead_letter_exchange != dead_letter_exchange
            {
                return Err(BrokerError::Declaration(format!(
                    "queue '{name}' already declared with different arguments"
                )));
            }
            if existing.owner.is_some_and(|owner| owner != self.connection.id) {
                return Err(BrokerError::Declaration(format!(
                    "queue '{name}' is exclusive to another connection"
                )));
            }
            return Ok(QueueInfo {
                name,
                message_count: existing.ready.load(Ordering::SeqCst) as u32,
                consumer_count: existing.consumers,
            });
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        state.queues.insert(
            name.clone(),
            QueueState {
                durability,
                dead_letter_exchange: dead_letter_exchange.to_string(),
                owner: durability.exclusive().then_some(self.connection.id),
                sender,
                receiver: Arc::new(AsyncMutex::new(receiver)),
                ready: Arc::new(AtomicUsize::new(0)),
                consumers: 0,
            },
        );
        tracing::debug!(queue = %name, %durability, "queue declared");

        Ok(QueueInfo {
            name,
            message_count: 0,
            consumer_count: 0,
        })
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.connection.ensure_open()?;
        let mut state = self.connection.shared.lock();
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::Declaration(format!("no queue '{queue}'")));
        }
        if !state.exchanges.contains_key(exchange) {
            return Err(BrokerError::Declaration(format!(
                "no exchange '{exchange}'"
            )));
        }
        let inserted = state.bindings.insert(Binding {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        });
        if inserted {
            tracing::debug!(queue, exchange, routing_key, "queue bound");
        }
        Ok(())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutboundMessage,
    ) -> Result<(), BrokerError> {
        self.connection.ensure_open()?;
        let state = self.connection.shared.lock();
        let stored = StoredMessage {
            routing_key: routing_key.to_string(),
            content_type: Some(message.content_type),
            body: message.body,
            redelivered: false,
        };
        let delivered = state
            .route(exchange, routing_key, stored)
            .map_err(BrokerError::Publish)?;
        if delivered == 0 {
            tracing::trace!(exchange, routing_key, "message unroutable, dropped");
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<MemoryConsumer, BrokerError> {
        self.connection.ensure_open()?;
        let mut state = self.connection.shared.lock();
        let q = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::Consume(format!("no queue '{queue}'")))?;
        if q.owner.is_some_and(|owner| owner != self.connection.id) {
            return Err(BrokerError::Consume(format!(
                "queue '{queue}' is exclusive to another connection"
            )));
        }
        q.consumers += 1;

        Ok(MemoryConsumer {
            queue: queue.to_string(),
            receiver: Arc::clone(&q.receiver),
            ready: Arc::clone(&q.ready),
            closed: self.connection.closed.subscribe(),
            connection: self.connection.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryConsumer
// ---------------------------------------------------------------------------

/// A consumer on one queue of a [`MemoryBroker`].
pub struct MemoryConsumer {
    queue: String,
    receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<StoredMessage>>>,
    ready: Arc<AtomicUsize>,
    closed: watch::Receiver<bool>,
    connection: MemoryConnection,
}

/// Resolves once the connection behind `closed` is closed.
async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}

impl Consumer for MemoryConsumer {
    type Delivery = MemoryDelivery;

    async fn next_delivery(
        &mut self,
    ) -> Option<Result<MemoryDelivery, BrokerError>> {
        let receiver = Arc::clone(&self.receiver);
        let message = tokio::select! {
            message = async move { receiver.lock().await.recv().await } => message?,
            _ = wait_closed(&mut self.closed) => return None,
        };
        self.ready.fetch_sub(1, Ordering::SeqCst);

        Some(Ok(MemoryDelivery {
            shared: Arc::clone(&self.connection.shared),
            queue: self.queue.clone(),
            message,
            settled: false,
        }))
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        let mut state = self.connection.shared.lock();
        let delete = match state.queues.get_mut(&self.queue) {
            Some(q) => {
                q.consumers = q.consumers.saturating_sub(1);
                q.consumers == 0 && q.durability.auto_delete()
            }
            None => false,
        };
        if delete {
            state.delete_queue(&self.queue);
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryDelivery
// ---------------------------------------------------------------------------

/// A message handed out by a [`MemoryConsumer`].
pub struct MemoryDelivery {
    shared: Arc<Shared>,
    queue: String,
    message: StoredMessage,
    settled: bool,
}

impl MemoryDelivery {
    fn take_message(&mut self) -> StoredMessage {
        self.settled = true;
        std::mem::take(&mut self.message)
    }

    fn requeue(&mut self) {
        let mut message = self.take_message();
        message.redelivered = true;
        let state = self.shared.lock();
        if !state.enqueue(&self.queue, message) {
            tracing::debug!(queue = %self.queue, "requeue target gone, message dropped");
        }
    }

    fn dead_letter(&mut self) {
        let message = self.take_message();
        let state = self.shared.lock();
        let Some(dlx) = state
            .queues
            .get(&self.queue)
            .map(|q| q.dead_letter_exchange.clone())
            .filter(|dlx| !dlx.is_empty())
        else {
            tracing::debug!(queue = %self.queue, "no dead-letter exchange, message dropped");
            return;
        };
        let routing_key = message.routing_key.clone();
        match state.route(&dlx, &routing_key, message) {
            Ok(_) => {
                tracing::debug!(queue = %self.queue, exchange = %dlx, "message dead-lettered");
            }
            Err(reason) => {
                tracing::debug!(queue = %self.queue, %reason, "dead-letter exchange missing, message dropped");
            }
        }
    }
}

impl Delivery for MemoryDelivery {
    fn content_type(&self) -> Option<&str> {
        self.message.content_type.as_deref()
    }

    fn routing_key(&self) -> &str {
        &self.message.routing_key
    }

    fn body(&self) -> &[u8] {
        &self.message.body
    }

    fn redelivered(&self) -> bool {
        self.message.redelivered
    }

    async fn ack(mut self) -> Result<(), BrokerError> {
        self.take_message();
        Ok(())
    }

    async fn nack(mut self, requeue: bool) -> Result<(), BrokerError> {
        if requeue {
            self.requeue();
        } else {
            self.dead_letter();
        }
        Ok(())
    }
}

impl Drop for MemoryDelivery {
    fn drop(&mut self) {
        if !self.settled {
            self.requeue();
        }
    }
}

//! Exchange names, routing keys and queue names.
//!
//! These strings are shared with every other Peril peer, so they must
//! stay bit-exact. Build keys through the helpers below rather than
//! formatting them by hand.

/// Direct exchange carrying pause/resume control messages.
pub const EXCHANGE_PERIL_DIRECT: &str = "peril_direct";

/// Topic exchange carrying moves, war recognitions and logs.
pub const EXCHANGE_PERIL_TOPIC: &str = "peril_topic";

/// Dead-letter exchange. Every queue points its
/// `x-dead-letter-exchange` argument here.
pub const EXCHANGE_PERIL_DLX: &str = "peril_dlx";

/// Durable queue that collects everything dead-lettered to
/// [`EXCHANGE_PERIL_DLX`].
pub const QUEUE_PERIL_DLQ: &str = "peril_dlq";

/// Routing key (and queue prefix) for pause/resume.
pub const PAUSE_KEY: &str = "pause";

/// Prefix for `army_moves.<username>`.
pub const ARMY_MOVES_PREFIX: &str = "army_moves";

/// Prefix for `war.<username>`. Also the name of the shared durable
/// war queue.
pub const WAR_RECOGNITIONS_PREFIX: &str = "war";

/// Prefix for `game_logs.<username>`. Also the name of the server's
/// durable log queue.
pub const GAME_LOG_SLUG: &str = "game_logs";

/// `<prefix>.*`: binds a queue to every single-word suffix of `prefix`.
pub fn wildcard(prefix: &str) -> String {
    format!("{prefix}.*")
}

/// `army_moves.<username>`
pub fn army_moves_key(username: &str) -> String {
    format!("{ARMY_MOVES_PREFIX}.{username}")
}

/// `war.<username>`
pub fn war_key(username: &str) -> String {
    format!("{WAR_RECOGNITIONS_PREFIX}.{username}")
}

/// `game_logs.<username>`
pub fn game_log_key(username: &str) -> String {
    format!("{GAME_LOG_SLUG}.{username}")
}

/// `pause.<username>`: each client's private pause queue.
pub fn pause_queue(username: &str) -> String {
    format!("{PAUSE_KEY}.{username}")
}

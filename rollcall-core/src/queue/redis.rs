use std::fmt;

use async_trait::async_trait;
use redis::{AsyncCommands, Direction, aio::ConnectionManager};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{RenewalError, Result};
use crate::queue::{Delivery, JobQueue};

/// Redis-backed reliable list queue.
///
/// Three lists per channel: `{prefix}:{name}:ready` holds undelivered
/// messages, `{prefix}:{name}:pending` holds in-flight deliveries until
/// they are settled, `{prefix}:{name}:dead` collects messages given up on.
/// Receive is an atomic `LMOVE` ready->pending, so a consumer crash leaves
/// the message parked rather than lost; `recover_stalled` sweeps pending
/// back to ready at consumer startup.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    ready_key: String,
    pending_key: String,
    dead_key: String,
}

impl fmt::Debug for RedisJobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisJobQueue")
            .field("ready_key", &self.ready_key)
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisJobQueue {
    pub async fn connect(redis_url: &str, prefix: &str, name: &str) -> Result<Self> {
        info!("Connecting to Redis queue '{}' at {}", name, redis_url);

        let client = redis::Client::open(redis_url)
            .map_err(|e| RenewalError::Queue(format!("Failed to create Redis client: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| RenewalError::Queue(format!("Failed to connect to Redis: {e}")))?;

        Ok(Self::from_manager(conn, prefix, name))
    }

    /// Build a queue over an existing connection manager; managers are
    /// cheap to clone, so several channels can share one.
    pub fn from_manager(conn: ConnectionManager, prefix: &str, name: &str) -> Self {
        Self {
            conn,
            ready_key: format!("{prefix}:{name}:ready"),
            pending_key: format!("{prefix}:{name}:pending"),
            dead_key: format!("{prefix}:{name}:dead"),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, body: String) -> Result<()> {
        debug!("Queue PUSH: {}", self.ready_key);

        let mut conn = self.conn.clone();
        let _: () = conn
            .lpush(&self.ready_key, body)
            .await
            .map_err(|e| RenewalError::Queue(format!("Redis LPUSH failed: {e}")))?;

        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>> {
        let mut conn = self.conn.clone();
        let mut batch = Vec::new();

        while batch.len() < max {
            let entry: Option<String> = conn
                .lmove(
                    &self.ready_key,
                    &self.pending_key,
                    Direction::Right,
                    Direction::Left,
                )
                .await
                .map_err(|e| RenewalError::Queue(format!("Redis LMOVE failed: {e}")))?;

            match entry {
                Some(body) => batch.push(Delivery { body }),
                None => break,
            }
        }

        if !batch.is_empty() {
            debug!("Queue RECEIVE: {} message(s) from {}", batch.len(), self.ready_key);
        }

        Ok(batch)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .lrem(&self.pending_key, 1, &delivery.body)
            .await
            .map_err(|e| RenewalError::Queue(format!("Redis LREM failed: {e}")))?;

        if removed == 0 {
            // Already settled elsewhere (e.g. a recovery sweep requeued it).
            warn!("Ack found no pending entry on {}", self.pending_key);
        }

        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<()> {
        let mut conn = self.conn.clone();

        // Requeue before unparking: a crash in between leaves a duplicate,
        // which at-least-once delivery already tolerates.
        let _: () = conn
            .rpush(&self.ready_key, &delivery.body)
            .await
            .map_err(|e| RenewalError::Queue(format!("Redis RPUSH failed: {e}")))?;

        let _: i64 = conn
            .lrem(&self.pending_key, 1, &delivery.body)
            .await
            .map_err(|e| RenewalError::Queue(format!("Redis LREM failed: {e}")))?;

        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        warn!("Dead-lettering message on {}: {}", self.dead_key, reason);

        let envelope = json!({
            "reason": reason,
            "body": delivery.body,
        })
        .to_string();

        let mut conn = self.conn.clone();
        let _: () = conn
            .rpush(&self.dead_key, envelope)
            .await
            .map_err(|e| RenewalError::Queue(format!("Redis RPUSH failed: {e}")))?;

        let _: i64 = conn
            .lrem(&self.pending_key, 1, &delivery.body)
            .await
            .map_err(|e| RenewalError::Queue(format!("Redis LREM failed: {e}")))?;

        Ok(())
    }

    async fn recover_stalled(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let mut recovered = 0u64;

        loop {
            let entry: Option<String> = conn
                .lmove(
                    &self.pending_key,
                    &self.ready_key,
                    Direction::Right,
                    Direction::Left,
                )
                .await
                .map_err(|e| RenewalError::Queue(format!("Redis LMOVE failed: {e}")))?;

            if entry.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            info!(
                "Recovered {} stalled message(s) from {}",
                recovered, self.pending_key
            );
        }

        Ok(recovered)
    }
}

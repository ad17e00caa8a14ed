//! Queue boundary: an at-least-once, durable message channel decoupling
//! candidate discovery from delivery.

pub mod redis;

use async_trait::async_trait;

use crate::error::Result;

/// One in-flight message pulled from a queue.
///
/// The body doubles as the settlement token: a delivery stays parked on the
/// consumer's pending list until it is acked, nacked, or dead-lettered, so
/// a consumer crash leaves it recoverable rather than lost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub body: String,
}

/// Durable work queue with per-message settlement.
///
/// Delivery is at-least-once: a message may be redelivered (after a nack or
/// a stalled-consumer recovery) but is never dropped short of an explicit
/// ack or dead-letter. Consumers must tolerate duplicates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, body: String) -> Result<()>;

    /// Pull up to `max` messages, moving each onto the pending list until
    /// settled. Returns fewer (possibly zero) when the queue runs dry.
    async fn receive(&self, max: usize) -> Result<Vec<Delivery>>;

    /// Settle a delivery as done; it will not be redelivered.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Return a delivery to the queue for redelivery.
    async fn nack(&self, delivery: &Delivery) -> Result<()>;

    /// Park a delivery on the dead-letter list; it will not be retried.
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<()>;

    /// Requeue deliveries abandoned by a consumer that died mid-batch.
    /// Run at consumer startup, before polling begins.
    async fn recover_stalled(&self) -> Result<u64>;
}

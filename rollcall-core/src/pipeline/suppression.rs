use std::sync::Arc;

use tracing::{debug, error, info, warn};

use rollcall_model::FeedbackEvent;

use crate::database::ports::memberships::MembershipsRepository;
use crate::error::Result;
use crate::queue::JobQueue;

/// Counts for one feedback batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FeedbackSummary {
    pub received: usize,
    pub handled: usize,
    pub rows_suppressed: u64,
    pub dead_lettered: usize,
}

/// Consumes delivery-failure feedback (hard bounces, complaints) and nulls
/// out the offending contact address, removing those members from all
/// future candidate selection until a new address is entered.
#[derive(Clone)]
pub struct SuppressionHandler {
    repo: Arc<dyn MembershipsRepository>,
    feedback: Arc<dyn JobQueue>,
}

impl std::fmt::Debug for SuppressionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuppressionHandler").finish()
    }
}

impl SuppressionHandler {
    pub fn new(repo: Arc<dyn MembershipsRepository>, feedback: Arc<dyn JobQueue>) -> Self {
        Self { repo, feedback }
    }

    /// Apply one feedback event. Transient bounces are ignored; permanent
    /// bounces and complaints suppress every listed address. The update is
    /// set-based and idempotent, so replaying an event is harmless.
    pub async fn handle(&self, event: &FeedbackEvent) -> Result<u64> {
        let addresses = event.suppressible_addresses();
        if addresses.is_empty() {
            debug!("Ignoring {:?} feedback with nothing to suppress", event.kind);
            return Ok(0);
        }

        let mut total = 0u64;
        for address in addresses {
            let affected = self.repo.suppress_address(address).await?;
            if affected > 0 {
                info!(
                    "Removed address '{}' from {} membership record(s)",
                    address, affected
                );
            } else {
                warn!("No membership records found holding address '{}'", address);
            }
            total += affected;
        }

        Ok(total)
    }

    /// Drain up to `max` feedback events from the channel, settling each.
    pub async fn run_batch(&self, max: usize) -> Result<FeedbackSummary> {
        let deliveries = self.feedback.receive(max).await?;

        let mut summary = FeedbackSummary {
            received: deliveries.len(),
            ..FeedbackSummary::default()
        };

        for delivery in &deliveries {
            let event: FeedbackEvent = match serde_json::from_str(&delivery.body) {
                Ok(event) => event,
                Err(e) => {
                    error!("Malformed feedback event: {e}");
                    self.feedback
                        .dead_letter(delivery, &format!("malformed feedback event: {e}"))
                        .await?;
                    summary.dead_lettered += 1;
                    continue;
                }
            };

            match self.handle(&event).await {
                Ok(rows) => {
                    self.feedback.ack(delivery).await?;
                    summary.handled += 1;
                    summary.rows_suppressed += rows;
                }
                Err(e) => {
                    // Store hiccup; leave the event for redelivery.
                    warn!("Feedback event requeued: {e}");
                    self.feedback.nack(delivery).await?;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_model::{BounceClass, FeedbackKind};

    use crate::database::ports::memberships::MockMembershipsRepository;
    use crate::queue::{Delivery, MockJobQueue};

    fn permanent_bounce(addresses: &[&str]) -> FeedbackEvent {
        FeedbackEvent {
            kind: FeedbackKind::Bounce,
            bounce_subtype: Some(BounceClass::Permanent),
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn permanent_bounce_suppresses_every_address() {
        let mut repo = MockMembershipsRepository::new();
        repo.expect_suppress_address()
            .withf(|a| a == "a@example.com")
            .times(1)
            .returning(|_| Ok(2));
        repo.expect_suppress_address()
            .withf(|a| a == "b@example.com")
            .times(1)
            .returning(|_| Ok(1));

        let handler = SuppressionHandler::new(Arc::new(repo), Arc::new(MockJobQueue::new()));
        let rows = handler
            .handle(&permanent_bounce(&["a@example.com", "b@example.com"]))
            .await
            .unwrap();
        assert_eq!(rows, 3);
    }

    #[tokio::test]
    async fn transient_bounce_touches_nothing() {
        let mut repo = MockMembershipsRepository::new();
        repo.expect_suppress_address().times(0);

        let handler = SuppressionHandler::new(Arc::new(repo), Arc::new(MockJobQueue::new()));
        let event = FeedbackEvent {
            kind: FeedbackKind::Bounce,
            bounce_subtype: Some(BounceClass::Transient),
            addresses: vec!["a@example.com".to_string()],
        };
        assert_eq!(handler.handle(&event).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_address_is_not_an_error() {
        let mut repo = MockMembershipsRepository::new();
        repo.expect_suppress_address().times(1).returning(|_| Ok(0));

        let handler = SuppressionHandler::new(Arc::new(repo), Arc::new(MockJobQueue::new()));
        let rows = handler
            .handle(&permanent_bounce(&["gone@example.com"]))
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn complaint_suppresses_regardless_of_subtype() {
        let mut repo = MockMembershipsRepository::new();
        repo.expect_suppress_address().times(1).returning(|_| Ok(1));

        let handler = SuppressionHandler::new(Arc::new(repo), Arc::new(MockJobQueue::new()));
        let event = FeedbackEvent {
            kind: FeedbackKind::Complaint,
            bounce_subtype: None,
            addresses: vec!["a@example.com".to_string()],
        };
        assert_eq!(handler.handle(&event).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn batch_settles_good_and_malformed_events() {
        let good = Delivery {
            body: serde_json::to_string(&permanent_bounce(&["a@example.com"])).unwrap(),
        };
        let bad = Delivery {
            body: "not json".to_string(),
        };

        let mut repo = MockMembershipsRepository::new();
        repo.expect_suppress_address().returning(|_| Ok(1));

        let mut feedback = MockJobQueue::new();
        let batch = vec![good.clone(), bad.clone()];
        feedback
            .expect_receive()
            .times(1)
            .returning(move |_| Ok(batch.clone()));
        feedback
            .expect_ack()
            .withf(move |d| *d == good)
            .times(1)
            .returning(|_| Ok(()));
        feedback
            .expect_dead_letter()
            .withf(move |d, _| *d == bad)
            .times(1)
            .returning(|_, _| Ok(()));

        let handler = SuppressionHandler::new(Arc::new(repo), Arc::new(feedback));
        let summary = handler.run_batch(10).await.unwrap();
        assert_eq!(summary.received, 2);
        assert_eq!(summary.handled, 1);
        assert_eq!(summary.rows_suppressed, 1);
        assert_eq!(summary.dead_lettered, 1);
    }
}

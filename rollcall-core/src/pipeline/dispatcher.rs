use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use rollcall_model::RenewalNotice;

use crate::database::ports::memberships::MembershipsRepository;
use crate::error::Result;
use crate::pipeline::template::render_renewal_notice;
use crate::queue::{Delivery, JobQueue};
use crate::transport::{EmailTransport, OutboundEmail};

/// Outcome of dispatching a single notice.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DispatchStatus {
    /// The notice is settled: sent and recorded, or recognized as already
    /// handled / stale. The delivery is acked either way.
    Success,
    /// Transient failure; the delivery is nacked so the queue redelivers.
    Retry { error: String },
    /// The notice can never succeed (malformed); parked on the dead-letter
    /// list, never retried.
    DeadLetter { error: String },
}

impl DispatchStatus {
    pub fn needs_retry(&self) -> bool {
        matches!(self, DispatchStatus::Retry { .. })
    }
}

/// Counts for one dispatcher batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchSummary {
    pub received: usize,
    pub completed: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

/// Drains the notification queue: renders each notice, sends it through
/// the email transport, and records the send in the store.
///
/// The flag update is conditional on the expiration date the notice was
/// issued for, so a membership renewed between enqueue and dispatch is a
/// silent no-op rather than a mis-marked new cycle. The pre-send state
/// check bounds duplicate sends to the check-to-send window; redelivery
/// after a send-then-store-failure may duplicate an email, which is the
/// accepted lesser failure.
#[derive(Clone)]
pub struct NotificationDispatcher {
    repo: Arc<dyn MembershipsRepository>,
    queue: Arc<dyn JobQueue>,
    transport: Arc<dyn EmailTransport>,
    organization: String,
    send_retries: u32,
    job_timeout: Duration,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("organization", &self.organization)
            .field("send_retries", &self.send_retries)
            .field("job_timeout", &self.job_timeout)
            .finish()
    }
}

impl NotificationDispatcher {
    pub fn new(
        repo: Arc<dyn MembershipsRepository>,
        queue: Arc<dyn JobQueue>,
        transport: Arc<dyn EmailTransport>,
        organization: impl Into<String>,
        send_retries: u32,
        job_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            queue,
            transport,
            organization: organization.into(),
            send_retries,
            job_timeout,
        }
    }

    /// Pull up to `max` deliveries and settle each according to its
    /// dispatch outcome. Queue errors fail the whole batch so the caller's
    /// schedule retries it; per-notice failures only affect that notice.
    pub async fn run_batch(&self, max: usize) -> Result<BatchSummary> {
        let deliveries = self.queue.receive(max).await?;

        let mut summary = BatchSummary {
            received: deliveries.len(),
            ..BatchSummary::default()
        };

        for delivery in &deliveries {
            let status = match tokio::time::timeout(self.job_timeout, self.process(delivery)).await
            {
                Ok(status) => status,
                Err(_) => DispatchStatus::Retry {
                    error: format!("processing exceeded {:?}", self.job_timeout),
                },
            };

            match status {
                DispatchStatus::Success => {
                    self.queue.ack(delivery).await?;
                    summary.completed += 1;
                }
                DispatchStatus::Retry { error } => {
                    warn!("Notice requeued for redelivery: {}", error);
                    self.queue.nack(delivery).await?;
                    summary.retried += 1;
                }
                DispatchStatus::DeadLetter { error } => {
                    error!("Notice dead-lettered: {}", error);
                    self.queue.dead_letter(delivery, &error).await?;
                    summary.dead_lettered += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Dispatch one delivery. Never returns an error; every failure mode
    /// maps onto a settlement decision.
    pub async fn process(&self, delivery: &Delivery) -> DispatchStatus {
        let notice: RenewalNotice = match serde_json::from_str(&delivery.body) {
            Ok(notice) => notice,
            Err(e) => {
                return DispatchStatus::DeadLetter {
                    error: format!("malformed notice: {e}"),
                };
            }
        };

        if notice.email.trim().is_empty() {
            return DispatchStatus::DeadLetter {
                error: format!("notice for {} carries no recipient", notice.member_id),
            };
        }

        // Pre-send idempotence check. Redelivery of an already-handled
        // notice must not send again.
        let state = match self.repo.renewal_state(notice.member_id).await {
            Ok(state) => state,
            Err(e) => {
                return DispatchStatus::Retry {
                    error: format!("state check for {} failed: {e}", notice.member_id),
                };
            }
        };

        let Some(state) = state else {
            info!(
                "Membership {} no longer exists; dropping stale notice",
                notice.member_id
            );
            return DispatchStatus::Success;
        };

        if state.renewal_email_sent {
            debug!(
                "Membership {} already notified this cycle; skipping",
                notice.member_id
            );
            return DispatchStatus::Success;
        }

        if state.membership_expires != Some(notice.expires) {
            info!(
                "Membership {} renewed since enqueue (notice for {}); skipping stale notice",
                notice.member_id, notice.expires
            );
            return DispatchStatus::Success;
        }

        let content =
            render_renewal_notice(&self.organization, &notice.display_name(), notice.expires);
        let email = OutboundEmail {
            to: notice.email.clone(),
            subject: content.subject,
            html_body: content.html_body,
        };

        if let Err(e) = self.send_with_retry(&email).await {
            return DispatchStatus::Retry {
                error: format!("send to {} failed: {e}", notice.email),
            };
        }

        // Confirmed send; record it. The conditional update is the last
        // line of defense against the enqueue-to-dispatch race.
        match self
            .repo
            .mark_renewal_notified(notice.member_id, notice.expires)
            .await
        {
            Ok(true) => {
                info!(
                    "Renewal notice sent to {} for membership {} (expires {})",
                    notice.email, notice.member_id, notice.expires
                );
                DispatchStatus::Success
            }
            Ok(false) => {
                info!(
                    "Membership {} renewed between check and send; flag untouched",
                    notice.member_id
                );
                DispatchStatus::Success
            }
            Err(e) => {
                // The email went out but the flag did not stick. Redelivery
                // may send a duplicate; silently losing the flag would be
                // worse.
                DispatchStatus::Retry {
                    error: format!(
                        "sent to {} but failed to record it: {e}",
                        notice.email
                    ),
                }
            }
        }
    }

    /// A small bounded number of immediate retries; beyond these the
    /// queue's redelivery policy takes over.
    async fn send_with_retry(&self, email: &OutboundEmail) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.transport.send(email).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.send_retries => {
                    attempt += 1;
                    warn!(
                        "Send to {} failed (attempt {}/{}): {e}",
                        email.to,
                        attempt,
                        self.send_retries + 1
                    );
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

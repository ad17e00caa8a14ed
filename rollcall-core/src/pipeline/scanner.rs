use std::sync::Arc;

use tracing::{info, warn};

use rollcall_model::{Cycle, RenewalNotice};

use crate::database::ports::memberships::MembershipsRepository;
use crate::error::Result;
use crate::queue::JobQueue;

/// Outcome of one candidate scan, for logs and the ops surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ScanSummary {
    /// Rows matching the candidate predicate.
    pub matched: usize,
    /// Notices actually enqueued.
    pub queued: usize,
    /// Candidates skipped for lack of a contact address.
    pub unreachable: usize,
}

/// Finds memberships expiring in the current cycle that have not been
/// notified, and produces one notification job per reachable member.
///
/// The scanner only reads the store; enqueueing is its sole side effect.
/// Each call re-executes the query, so there is no cursor state to lose.
#[derive(Clone)]
pub struct RenewalScanner {
    repo: Arc<dyn MembershipsRepository>,
    queue: Arc<dyn JobQueue>,
}

impl std::fmt::Debug for RenewalScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalScanner").finish()
    }
}

impl RenewalScanner {
    pub fn new(repo: Arc<dyn MembershipsRepository>, queue: Arc<dyn JobQueue>) -> Self {
        Self { repo, queue }
    }

    /// Clear the notified flag for every membership expiring in `cycle`,
    /// making them fresh candidates. Ordered before [`scan`](Self::scan)
    /// at the start of each cycle.
    pub async fn reset_cycle(&self, cycle: Cycle) -> Result<u64> {
        let reset = self.repo.reset_renewal_flags(cycle).await?;
        info!(
            "Reset renewal_email_sent for {} record(s) expiring in {}",
            reset, cycle
        );
        Ok(reset)
    }

    /// Select candidates for `cycle` and enqueue a notice per reachable
    /// member. Members without an address are skipped with a warning; they
    /// are not an error condition.
    pub async fn scan(&self, cycle: Cycle) -> Result<ScanSummary> {
        let candidates = self.repo.find_renewal_candidates(cycle).await?;

        let mut summary = ScanSummary {
            matched: candidates.len(),
            ..ScanSummary::default()
        };

        for candidate in &candidates {
            match RenewalNotice::from_candidate(candidate) {
                Some(notice) => {
                    self.queue.enqueue(serde_json::to_string(&notice)?).await?;
                    summary.queued += 1;
                }
                None => {
                    warn!(
                        "Cannot queue renewal notice for membership {}: no email on record",
                        candidate.member_id
                    );
                    summary.unreachable += 1;
                }
            }
        }

        info!(
            "Scan for cycle {}: {} candidate(s), {} queued, {} unreachable",
            cycle, summary.matched, summary.queued, summary.unreachable
        );

        Ok(summary)
    }

    /// Start-of-cycle entry point: reset the notified flags, then scan.
    pub async fn begin_cycle(&self, cycle: Cycle) -> Result<ScanSummary> {
        self.reset_cycle(cycle).await?;
        self.scan(cycle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rollcall_model::{MemberId, RenewalCandidate};

    use crate::database::ports::memberships::MockMembershipsRepository;
    use crate::queue::MockJobQueue;

    fn cycle() -> Cycle {
        Cycle::new(3, 2025).unwrap()
    }

    fn candidate(email: Option<&str>) -> RenewalCandidate {
        RenewalCandidate {
            member_id: MemberId::new(),
            email: email.map(str::to_string),
            name: Some("Dana".to_string()),
            last_name: Some("Whitfield".to_string()),
            expires: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        }
    }

    #[tokio::test]
    async fn enqueues_reachable_candidates_and_skips_the_rest() {
        let mut repo = MockMembershipsRepository::new();
        repo.expect_find_renewal_candidates()
            .times(1)
            .returning(|_| Ok(vec![candidate(Some("d@x.com")), candidate(None)]));

        let mut queue = MockJobQueue::new();
        queue
            .expect_enqueue()
            .withf(|body| {
                let notice: RenewalNotice = serde_json::from_str(body).unwrap();
                notice.email == "d@x.com"
            })
            .times(1)
            .returning(|_| Ok(()));

        let scanner = RenewalScanner::new(Arc::new(repo), Arc::new(queue));
        let summary = scanner.scan(cycle()).await.unwrap();

        assert_eq!(summary.matched, 2);
        assert_eq!(summary.queued, 1);
        assert_eq!(summary.unreachable, 1);
    }

    #[tokio::test]
    async fn begin_cycle_resets_before_scanning() {
        let mut repo = MockMembershipsRepository::new();
        let mut sequence = mockall::Sequence::new();
        repo.expect_reset_renewal_flags()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(4));
        repo.expect_find_renewal_candidates()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(Vec::new()));

        let queue = MockJobQueue::new();
        let scanner = RenewalScanner::new(Arc::new(repo), Arc::new(queue));
        let summary = scanner.begin_cycle(cycle()).await.unwrap();
        assert_eq!(summary.matched, 0);
    }

    #[tokio::test]
    async fn scan_performs_no_store_mutation() {
        // Only the candidate read is expected on the repository; any write
        // would trip the mock.
        let mut repo = MockMembershipsRepository::new();
        repo.expect_find_renewal_candidates()
            .times(1)
            .returning(|_| Ok(vec![candidate(Some("d@x.com"))]));

        let mut queue = MockJobQueue::new();
        queue.expect_enqueue().times(1).returning(|_| Ok(()));

        let scanner = RenewalScanner::new(Arc::new(repo), Arc::new(queue));
        scanner.scan(cycle()).await.unwrap();
    }
}

use async_trait::async_trait;
use chrono::NaiveDate;

use rollcall_model::{Cycle, MemberId, Membership, RenewalCandidate, RenewalState};

use crate::error::Result;

// Membership rows (renewal lifecycle) repository
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipsRepository: Send + Sync {
    async fn get(&self, member_id: MemberId) -> Result<Option<Membership>>;

    /// The renewal-relevant slice of one membership, for the dispatcher's
    /// pre-send idempotence check.
    async fn renewal_state(&self, member_id: MemberId) -> Result<Option<RenewalState>>;

    /// Deactivate every non-founding membership that expired before
    /// `as_of`, in one statement. Returns the number of rows deactivated;
    /// re-running with the same date affects zero additional rows.
    async fn sweep_expired(&self, as_of: NaiveDate) -> Result<u64>;

    /// Unconditionally clear `renewal_email_sent` for memberships expiring
    /// in `cycle`. Runs at the start of each cycle, before candidate
    /// selection.
    async fn reset_renewal_flags(&self, cycle: Cycle) -> Result<u64>;

    /// Memberships expiring in `cycle` that have not been notified yet,
    /// joined with the primary member for the display name. Read-only; the
    /// caller decides what to enqueue.
    async fn find_renewal_candidates(&self, cycle: Cycle) -> Result<Vec<RenewalCandidate>>;

    /// Record a confirmed send, but only while the row's expiration date
    /// still matches the one the notice was issued for. Returns false when
    /// the membership renewed in between (the stale notice must not mark
    /// the new cycle as notified).
    async fn mark_renewal_notified(&self, member_id: MemberId, expires: NaiveDate) -> Result<bool>;

    /// Null out the contact address on every row holding it. Set-based and
    /// idempotent; zero affected rows is a valid outcome.
    async fn suppress_address(&self, email: &str) -> Result<u64>;

    /// Explicit renewal: advance the expiration date, reactivate, and clear
    /// the notified flag in one statement.
    async fn renew_membership(&self, member_id: MemberId, new_expiry: NaiveDate) -> Result<()>;

    /// Recompute `membership_expires` for every non-founding membership
    /// with a start date (end of the month one year on), clearing the
    /// notified flag wherever the date moves.
    async fn recompute_expirations(&self) -> Result<u64>;
}

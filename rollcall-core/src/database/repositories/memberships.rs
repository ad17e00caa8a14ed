use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use rollcall_model::{Cycle, MemberId, Membership, RenewalCandidate, RenewalState};

use crate::database::ports::memberships::MembershipsRepository;
use crate::error::{RenewalError, Result};

/// PostgreSQL-backed implementation of the `MembershipsRepository` port.
#[derive(Debug, Clone)]
pub struct PostgresMembershipsRepository {
    pool: PgPool,
}

impl PostgresMembershipsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_membership(row: &PgRow) -> Result<Membership> {
        let member_id: Uuid = row
            .try_get("member_id")
            .map_err(|e| RenewalError::Database(format!("Failed to read member_id: {e}")))?;
        let email: Option<String> = row
            .try_get("email")
            .map_err(|e| RenewalError::Database(format!("Failed to read email: {e}")))?;
        let founding_family: bool = row
            .try_get("founding_family")
            .map_err(|e| RenewalError::Database(format!("Failed to read founding_family: {e}")))?;
        let mem_start_date: Option<NaiveDate> = row
            .try_get("mem_start_date")
            .map_err(|e| RenewalError::Database(format!("Failed to read mem_start_date: {e}")))?;
        let membership_expires: Option<NaiveDate> = row.try_get("membership_expires").map_err(
            |e| RenewalError::Database(format!("Failed to read membership_expires: {e}")),
        )?;
        let active: bool = row
            .try_get("active_flag")
            .map_err(|e| RenewalError::Database(format!("Failed to read active_flag: {e}")))?;
        let renewal_email_sent: bool = row.try_get("renewal_email_sent").map_err(
            |e| RenewalError::Database(format!("Failed to read renewal_email_sent: {e}")),
        )?;

        Ok(Membership {
            member_id: MemberId(member_id),
            email,
            founding_family,
            mem_start_date,
            membership_expires,
            active,
            renewal_email_sent,
        })
    }

    fn map_candidate(row: &PgRow) -> Result<RenewalCandidate> {
        let member_id: Uuid = row
            .try_get("member_id")
            .map_err(|e| RenewalError::Database(format!("Failed to read member_id: {e}")))?;
        let email: Option<String> = row
            .try_get("email")
            .map_err(|e| RenewalError::Database(format!("Failed to read email: {e}")))?;
        let name: Option<String> = row
            .try_get("name")
            .map_err(|e| RenewalError::Database(format!("Failed to read name: {e}")))?;
        let last_name: Option<String> = row
            .try_get("last_name")
            .map_err(|e| RenewalError::Database(format!("Failed to read last_name: {e}")))?;
        let expires: NaiveDate = row.try_get("membership_expires").map_err(
            |e| RenewalError::Database(format!("Failed to read membership_expires: {e}")),
        )?;

        Ok(RenewalCandidate {
            member_id: MemberId(member_id),
            email,
            name,
            last_name,
            expires,
        })
    }
}

#[async_trait]
impl MembershipsRepository for PostgresMembershipsRepository {
    async fn get(&self, member_id: MemberId) -> Result<Option<Membership>> {
        let row = sqlx::query(
            r#"
            SELECT member_id, email, founding_family, mem_start_date,
                   membership_expires, active_flag, renewal_email_sent
            FROM family
            WHERE member_id = $1
            "#,
        )
        .bind(member_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| RenewalError::Database(format!("Failed to get membership: {e}")))?;

        row.as_ref().map(Self::map_membership).transpose()
    }

    async fn renewal_state(&self, member_id: MemberId) -> Result<Option<RenewalState>> {
        let row = sqlx::query(
            r#"
            SELECT membership_expires, renewal_email_sent
            FROM family
            WHERE member_id = $1
            "#,
        )
        .bind(member_id.as_uuid())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| RenewalError::Database(format!("Failed to read renewal state: {e}")))?;

        row.map(|r| {
            let membership_expires: Option<NaiveDate> =
                r.try_get("membership_expires").map_err(|e| {
                    RenewalError::Database(format!("Failed to read membership_expires: {e}"))
                })?;
            let renewal_email_sent: bool = r.try_get("renewal_email_sent").map_err(|e| {
                RenewalError::Database(format!("Failed to read renewal_email_sent: {e}"))
            })?;
            Ok(RenewalState {
                membership_expires,
                renewal_email_sent,
            })
        })
        .transpose()
    }

    async fn sweep_expired(&self, as_of: NaiveDate) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE family
            SET active_flag = FALSE
            WHERE membership_expires < $1
              AND founding_family = FALSE
              AND active_flag = TRUE
            "#,
        )
        .bind(as_of)
        .execute(self.pool())
        .await
        .map_err(|e| RenewalError::Database(format!("Failed to sweep expired memberships: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn reset_renewal_flags(&self, cycle: Cycle) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE family
            SET renewal_email_sent = FALSE
            WHERE membership_expires IS NOT NULL
              AND date_part('month', membership_expires)::int = $1
              AND date_part('year', membership_expires)::int = $2
            "#,
        )
        .bind(cycle.month as i32)
        .bind(cycle.year)
        .execute(self.pool())
        .await
        .map_err(|e| RenewalError::Database(format!("Failed to reset renewal flags: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn find_renewal_candidates(&self, cycle: Cycle) -> Result<Vec<RenewalCandidate>> {
        let rows = sqlx::query(
            r#"
            SELECT f.member_id, f.email, m.name, m.last_name, f.membership_expires
            FROM family AS f
            LEFT JOIN members AS m
              ON m.member_id = f.member_id AND m.primary_member = TRUE
            WHERE f.founding_family = FALSE
              AND f.active_flag = TRUE
              AND f.renewal_email_sent = FALSE
              AND f.membership_expires IS NOT NULL
              AND date_part('month', f.membership_expires)::int = $1
              AND date_part('year', f.membership_expires)::int = $2
            ORDER BY f.membership_expires, f.member_id
            "#,
        )
        .bind(cycle.month as i32)
        .bind(cycle.year)
        .fetch_all(self.pool())
        .await
        .map_err(|e| RenewalError::Database(format!("Failed to find renewal candidates: {e}")))?;

        rows.iter().map(Self::map_candidate).collect()
    }

    async fn mark_renewal_notified(&self, member_id: MemberId, expires: NaiveDate) -> Result<bool> {
        // Conditional on the expiration date so a notice for a since-renewed
        // membership cannot mark the new cycle as notified.
        let result = sqlx::query(
            r#"
            UPDATE family
            SET renewal_email_sent = TRUE
            WHERE member_id = $1
              AND membership_expires = $2
            "#,
        )
        .bind(member_id.as_uuid())
        .bind(expires)
        .execute(self.pool())
        .await
        .map_err(|e| RenewalError::Database(format!("Failed to mark renewal notified: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn suppress_address(&self, email: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE family SET email = NULL WHERE email = $1")
            .bind(email)
            .execute(self.pool())
            .await
            .map_err(|e| RenewalError::Database(format!("Failed to suppress address: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn renew_membership(&self, member_id: MemberId, new_expiry: NaiveDate) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE family
            SET membership_expires = $2,
                active_flag = TRUE,
                renewal_email_sent = FALSE
            WHERE member_id = $1
            "#,
        )
        .bind(member_id.as_uuid())
        .bind(new_expiry)
        .execute(self.pool())
        .await
        .map_err(|e| RenewalError::Database(format!("Failed to renew membership: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(RenewalError::NotFound(format!(
                "membership {member_id} not found"
            )));
        }

        info!("Renewed membership {} through {}", member_id, new_expiry);
        Ok(())
    }

    async fn recompute_expirations(&self) -> Result<u64> {
        // End of the month one year after the start date. The notified flag
        // resets wherever the stored date moves.
        let result = sqlx::query(
            r#"
            UPDATE family
            SET renewal_email_sent = CASE
                    WHEN (date_trunc('month', mem_start_date + interval '1 year')
                          + interval '1 month - 1 day')::date
                         IS DISTINCT FROM membership_expires
                    THEN FALSE
                    ELSE renewal_email_sent
                END,
                membership_expires = (date_trunc('month', mem_start_date + interval '1 year')
                                      + interval '1 month - 1 day')::date
            WHERE mem_start_date IS NOT NULL
              AND founding_family = FALSE
            "#,
        )
        .execute(self.pool())
        .await
        .map_err(|e| RenewalError::Database(format!("Failed to recompute expirations: {e}")))?;

        Ok(result.rows_affected())
    }
}

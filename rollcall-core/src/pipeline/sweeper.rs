use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::database::ports::memberships::MembershipsRepository;
use crate::error::Result;

/// Transitions memberships past their expiration date to inactive.
///
/// The whole sweep is one atomic statement in the store, so a failure
/// leaves nothing half-applied and a retry is always safe.
#[derive(Clone)]
pub struct ExpirySweeper {
    repo: Arc<dyn MembershipsRepository>,
}

impl std::fmt::Debug for ExpirySweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirySweeper").finish()
    }
}

impl ExpirySweeper {
    pub fn new(repo: Arc<dyn MembershipsRepository>) -> Self {
        Self { repo }
    }

    pub async fn run(&self, as_of: NaiveDate) -> Result<u64> {
        let deactivated = self.repo.sweep_expired(as_of).await?;

        if deactivated > 0 {
            info!(
                "Checked for expired memberships as of {}. Deactivated {} record(s)",
                as_of, deactivated
            );
        } else {
            debug!("No memberships expired as of {}", as_of);
        }

        Ok(deactivated)
    }
}

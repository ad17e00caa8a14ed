use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::MemberId;
use crate::membership::RenewalCandidate;

/// The queue message produced per renewal candidate.
///
/// Immutable once enqueued; the channel may redeliver it, so everything the
/// dispatcher needs to detect staleness (notably `expires`) rides along.
/// Wire field names are part of the queue contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalNotice {
    pub member_id: MemberId,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_name: String,
    /// Expiration date this notice is about, ISO-8601.
    pub expires: NaiveDate,
}

impl RenewalNotice {
    /// Build a notice from a candidate row. Returns `None` when the
    /// candidate has no usable contact address.
    pub fn from_candidate(candidate: &RenewalCandidate) -> Option<Self> {
        let email = candidate
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())?;

        Some(Self {
            member_id: candidate.member_id,
            email: email.to_string(),
            name: candidate.name.clone().unwrap_or_default(),
            last_name: candidate.last_name.clone().unwrap_or_default(),
            expires: candidate.expires,
        })
    }

    /// Recipient display name; falls back to a generic salutation when the
    /// primary member record carries no name.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            "Member".to_string()
        } else {
            full.to_string()
        }
    }
}

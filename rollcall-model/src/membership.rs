use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::MemberId;

/// One membership row, normalized at the store boundary.
///
/// Flags are strict booleans here regardless of how the storage layer
/// spells them; `membership_expires` is absent for founding/lifetime
/// memberships, which the pipeline never touches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub member_id: MemberId,
    pub email: Option<String>,
    pub founding_family: bool,
    pub mem_start_date: Option<NaiveDate>,
    pub membership_expires: Option<NaiveDate>,
    pub active: bool,
    pub renewal_email_sent: bool,
}

impl Membership {
    /// Founding families and memberships without an expiration date are
    /// exempt from expiry and renewal notification entirely.
    pub fn is_lifetime(&self) -> bool {
        self.founding_family || self.membership_expires.is_none()
    }

    /// The contact address, if one exists and is non-empty. A null or
    /// blank email means the member is unreachable, not an error.
    pub fn reachable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

/// Renewal-relevant state of one membership, reloaded by the dispatcher
/// immediately before sending to bound duplicate sends to the narrow
/// check-to-send window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenewalState {
    pub membership_expires: Option<NaiveDate>,
    pub renewal_email_sent: bool,
}

/// One row of the candidate query: the membership joined with its primary
/// member for the display name. The email stays optional here; the scanner
/// decides whether the member is reachable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenewalCandidate {
    pub member_id: MemberId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub expires: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(email: Option<&str>) -> Membership {
        Membership {
            member_id: MemberId::new(),
            email: email.map(str::to_string),
            founding_family: false,
            mem_start_date: None,
            membership_expires: NaiveDate::from_ymd_opt(2025, 3, 31),
            active: true,
            renewal_email_sent: false,
        }
    }

    #[test]
    fn blank_email_is_unreachable() {
        assert_eq!(membership(None).reachable_email(), None);
        assert_eq!(membership(Some("")).reachable_email(), None);
        assert_eq!(membership(Some("   ")).reachable_email(), None);
        assert_eq!(
            membership(Some("m@x.com")).reachable_email(),
            Some("m@x.com")
        );
    }

    #[test]
    fn founding_family_is_lifetime() {
        let mut m = membership(Some("m@x.com"));
        m.founding_family = true;
        assert!(m.is_lifetime());

        let mut m = membership(Some("m@x.com"));
        m.membership_expires = None;
        assert!(m.is_lifetime());
    }
}

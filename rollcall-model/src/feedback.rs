use serde::{Deserialize, Serialize};

/// Delivery-feedback notification type reported by the email transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Bounce,
    Complaint,
}

/// Bounce classification. Only permanent bounces indicate an address that
/// will never deliver; transient bounces (full mailbox, greylisting) are
/// ignored by the suppression handler.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BounceClass {
    Permanent,
    Transient,
    Undetermined,
}

/// One event from the transport's feedback channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounce_subtype: Option<BounceClass>,
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl FeedbackEvent {
    /// Whether this event calls for suppression at all: any complaint, or a
    /// bounce classified as permanent.
    pub fn should_suppress(&self) -> bool {
        match self.kind {
            FeedbackKind::Complaint => true,
            FeedbackKind::Bounce => {
                matches!(self.bounce_subtype, Some(BounceClass::Permanent))
            }
        }
    }

    /// Addresses to null out, with blanks dropped.
    pub fn suppressible_addresses(&self) -> Vec<&str> {
        if !self.should_suppress() {
            return Vec::new();
        }
        self.addresses
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect()
    }
}

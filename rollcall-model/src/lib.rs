//! Core data model definitions shared across rollcall crates.
#![allow(missing_docs)]

pub mod cycle;
pub mod error;
pub mod feedback;
pub mod ids;
pub mod membership;
pub mod notice;

// Intentionally curated re-exports for downstream consumers.
pub use cycle::Cycle;
pub use error::{ModelError, Result as ModelResult};
pub use feedback::{BounceClass, FeedbackEvent, FeedbackKind};
pub use ids::MemberId;
pub use membership::{Membership, RenewalCandidate, RenewalState};
pub use notice::RenewalNotice;

//! The renewal pipeline: expiry sweep, candidate scan, notice dispatch,
//! and suppression feedback.
//!
//! Each worker is stateless between invocations; everything it knows comes
//! from the store at run time, which is what makes concurrent and repeated
//! runs safe.

pub mod dispatcher;
pub mod scanner;
pub mod suppression;
pub mod sweeper;
pub mod template;

pub use dispatcher::{BatchSummary, DispatchStatus, NotificationDispatcher};
pub use scanner::{RenewalScanner, ScanSummary};
pub use suppression::{FeedbackSummary, SuppressionHandler};
pub use sweeper::ExpirySweeper;
pub use template::{NoticeContent, render_renewal_notice};

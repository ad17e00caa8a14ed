//! Email transport boundary.
//!
//! Outbound delivery goes through [`EmailTransport`]; delivery feedback
//! (bounces, complaints) arrives on a feedback channel with the same queue
//! mechanics as the notification queue, published by the transport's
//! webhook receiver.

pub mod http;

use async_trait::async_trait;

use crate::error::Result;

/// Rendered email, ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Deliver one email. `Ok(())` means the transport confirmed
    /// acceptance; any failure (network, auth, quota) surfaces as an error
    /// so the caller can decide between retry and giving up.
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}

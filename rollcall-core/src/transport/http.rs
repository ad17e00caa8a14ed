use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use rollcall_config::MailConfig;

use crate::error::{RenewalError, Result};
use crate::transport::{EmailTransport, OutboundEmail};

/// Email transport over an HTTP mail API.
///
/// Posts one message per request to `{api_url}/email` with a bearer token.
/// The request timeout comes from configuration; a hung mail API must not
/// stall a dispatcher batch past its job budget.
#[derive(Clone)]
pub struct HttpEmailTransport {
    http: reqwest::Client,
    api_url: String,
    api_token: String,
    sender: String,
}

impl fmt::Debug for HttpEmailTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEmailTransport")
            .field("api_url", &self.api_url)
            .field("sender", &self.sender)
            .finish()
    }
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
}

impl HttpEmailTransport {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                RenewalError::Transport(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            sender: config.sender.clone(),
        })
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let url = format!("{}/email", self.api_url);
        let body = SendEmailRequest {
            from: &self.sender,
            to: &email.to,
            subject: &email.subject,
            html_body: &email.html_body,
        };

        debug!("Sending email to {} via {}", email.to, url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| RenewalError::Transport(format!("Mail API request failed: {e}")))?;

        if let Err(e) = response.error_for_status_ref() {
            return Err(RenewalError::Transport(format!(
                "Mail API rejected send to {}: {e}",
                email.to
            )));
        }

        Ok(())
    }
}

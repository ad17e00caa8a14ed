use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::models::{
    Config, DatabaseConfig, MailConfig, PipelineConfig, QueueConfig, ServerConfig,
};

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value} ({reason})")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Raw environment snapshot. Gathered in one pass so validation can report
/// against exactly what the process saw.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub server_host: Option<String>,
    pub server_port: Option<String>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub queue_prefix: Option<String>,
    pub mail_api_url: Option<String>,
    pub mail_api_token: Option<String>,
    pub mail_sender: Option<String>,
    pub organization_name: Option<String>,
    pub mail_timeout_secs: Option<String>,
    pub sweep_interval_secs: Option<String>,
    pub scan_interval_secs: Option<String>,
    pub dispatch_batch_size: Option<String>,
    pub dispatch_poll_secs: Option<String>,
    pub send_retries: Option<String>,
    pub job_timeout_secs: Option<String>,
    pub feedback_batch_size: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            server_host: std::env::var("SERVER_HOST").ok(),
            server_port: std::env::var("SERVER_PORT").ok(),
            database_url: std::env::var("DATABASE_URL").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),
            queue_prefix: std::env::var("QUEUE_PREFIX").ok(),
            mail_api_url: std::env::var("MAIL_API_URL").ok(),
            mail_api_token: std::env::var("MAIL_API_TOKEN").ok(),
            mail_sender: std::env::var("MAIL_SENDER").ok(),
            organization_name: std::env::var("ORGANIZATION_NAME").ok(),
            mail_timeout_secs: std::env::var("MAIL_TIMEOUT_SECS").ok(),
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS").ok(),
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS").ok(),
            dispatch_batch_size: std::env::var("DISPATCH_BATCH_SIZE").ok(),
            dispatch_poll_secs: std::env::var("DISPATCH_POLL_SECS").ok(),
            send_retries: std::env::var("SEND_RETRIES").ok(),
            job_timeout_secs: std::env::var("JOB_TIMEOUT_SECS").ok(),
            feedback_batch_size: std::env::var("FEEDBACK_BATCH_SIZE").ok(),
        }
    }

    /// Validate and assemble the typed configuration tree.
    pub fn into_config(self) -> Result<Config, ConfigLoadError> {
        let defaults = PipelineConfig::default();

        let database_url = required("DATABASE_URL", self.database_url)?;
        let redis_url = required("REDIS_URL", self.redis_url)?;

        let mail_api_url = required("MAIL_API_URL", self.mail_api_url)?;
        Url::parse(&mail_api_url).map_err(|e| ConfigLoadError::InvalidVar {
            var: "MAIL_API_URL",
            value: mail_api_url.clone(),
            reason: e.to_string(),
        })?;

        let mail_sender = required("MAIL_SENDER", self.mail_sender)?;
        if !mail_sender.contains('@') {
            return Err(ConfigLoadError::InvalidVar {
                var: "MAIL_SENDER",
                value: mail_sender,
                reason: "expected an email address".to_string(),
            });
        }

        Ok(Config {
            server: ServerConfig {
                host: self.server_host.unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or("SERVER_PORT", self.server_port, 8088)?,
            },
            database: DatabaseConfig { url: database_url },
            queue: QueueConfig {
                redis_url,
                key_prefix: self.queue_prefix.unwrap_or_else(|| "rollcall".to_string()),
            },
            mail: MailConfig {
                api_url: mail_api_url,
                api_token: self.mail_api_token.unwrap_or_default(),
                sender: mail_sender,
                organization: self
                    .organization_name
                    .unwrap_or_else(|| "Rollcall".to_string()),
                request_timeout: secs_or(
                    "MAIL_TIMEOUT_SECS",
                    self.mail_timeout_secs,
                    Duration::from_secs(10),
                )?,
            },
            pipeline: PipelineConfig {
                sweep_interval: secs_or(
                    "SWEEP_INTERVAL_SECS",
                    self.sweep_interval_secs,
                    defaults.sweep_interval,
                )?,
                scan_interval: secs_or(
                    "SCAN_INTERVAL_SECS",
                    self.scan_interval_secs,
                    defaults.scan_interval,
                )?,
                dispatch_batch_size: parse_or(
                    "DISPATCH_BATCH_SIZE",
                    self.dispatch_batch_size,
                    defaults.dispatch_batch_size,
                )?,
                poll_interval: secs_or(
                    "DISPATCH_POLL_SECS",
                    self.dispatch_poll_secs,
                    defaults.poll_interval,
                )?,
                send_retries: parse_or("SEND_RETRIES", self.send_retries, defaults.send_retries)?,
                job_timeout: secs_or(
                    "JOB_TIMEOUT_SECS",
                    self.job_timeout_secs,
                    defaults.job_timeout,
                )?,
                feedback_batch_size: parse_or(
                    "FEEDBACK_BATCH_SIZE",
                    self.feedback_batch_size,
                    defaults.feedback_batch_size,
                )?,
            },
        })
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        EnvConfig::gather().into_config()
    }
}

fn required(var: &'static str, value: Option<String>) -> Result<String, ConfigLoadError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigLoadError::MissingVar(var))
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigLoadError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigLoadError::InvalidVar {
            var,
            value: raw,
            reason: "expected a number".to_string(),
        }),
    }
}

fn secs_or(
    var: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    Ok(match value {
        None => default,
        Some(_) => Duration::from_secs(parse_or(var, value, default.as_secs())?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> EnvConfig {
        EnvConfig {
            database_url: Some("postgres://rollcall@localhost/rollcall".to_string()),
            redis_url: Some("redis://localhost:6379".to_string()),
            mail_api_url: Some("https://mail.example.org".to_string()),
            mail_sender: Some("membership@example.org".to_string()),
            ..EnvConfig::default()
        }
    }

    #[test]
    fn minimal_env_uses_defaults() {
        let config = minimal().into_config().unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.queue.key_prefix, "rollcall");
        assert_eq!(config.pipeline.dispatch_batch_size, 10);
        assert_eq!(config.pipeline.send_retries, 2);
    }

    #[test]
    fn missing_database_url_fails() {
        let mut env = minimal();
        env.database_url = None;
        assert!(matches!(
            env.into_config(),
            Err(ConfigLoadError::MissingVar("DATABASE_URL"))
        ));
    }

    #[test]
    fn sender_must_be_an_address() {
        let mut env = minimal();
        env.mail_sender = Some("front desk".to_string());
        assert!(matches!(
            env.into_config(),
            Err(ConfigLoadError::InvalidVar { var: "MAIL_SENDER", .. })
        ));
    }

    #[test]
    fn numeric_overrides_are_parsed() {
        let mut env = minimal();
        env.dispatch_batch_size = Some("25".to_string());
        env.job_timeout_secs = Some("90".to_string());
        let config = env.into_config().unwrap();
        assert_eq!(config.pipeline.dispatch_batch_size, 25);
        assert_eq!(config.pipeline.job_timeout, Duration::from_secs(90));
    }

    #[test]
    fn garbage_numeric_is_rejected() {
        let mut env = minimal();
        env.server_port = Some("not-a-port".to_string());
        assert!(env.into_config().is_err());
    }
}

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub mail: MailConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_url: String,
    /// Redis key namespace for the notification and feedback queues.
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Base URL of the HTTP mail API the transport posts to.
    pub api_url: String,
    pub api_token: String,
    /// Sender address, e.g. `membership@example.org`.
    pub sender: String,
    /// Organization name used in the rendered notice.
    pub organization: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How often the expiry sweeper runs.
    pub sweep_interval: Duration,
    /// How often the scanner checks the current cycle for candidates.
    pub scan_interval: Duration,
    /// Max notices pulled from the queue per dispatcher batch.
    pub dispatch_batch_size: usize,
    /// Idle sleep between dispatcher polls when the queue is empty.
    pub poll_interval: Duration,
    /// Immediate in-process send retries before the job is nacked back to
    /// the queue's redelivery policy.
    pub send_retries: u32,
    /// Per-job processing budget; an overrunning job is abandoned unacked.
    pub job_timeout: Duration,
    /// Max feedback events pulled per suppression batch.
    pub feedback_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(24 * 60 * 60),
            scan_interval: Duration::from_secs(60 * 60),
            dispatch_batch_size: 10,
            poll_interval: Duration::from_secs(5),
            send_retries: 2,
            job_timeout: Duration::from_secs(30),
            feedback_batch_size: 20,
        }
    }
}

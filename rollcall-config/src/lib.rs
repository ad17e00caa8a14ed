//! Shared configuration library for rollcall.
//!
//! Centralizes config loading and validation for the rollcall server so
//! defaults and validation rules live in a single place. Configuration is
//! environment-driven (a `.env` file is honored when the binary loads one);
//! each component receives its settings explicitly at construction — there
//! is no process-wide configuration singleton.

pub mod loader;
pub mod models;

pub use loader::{ConfigLoadError, EnvConfig};
pub use models::{
    Config, DatabaseConfig, MailConfig, PipelineConfig, QueueConfig, ServerConfig,
};

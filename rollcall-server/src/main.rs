//! # Rollcall Server
//!
//! Membership tracking and renewal notification service.
//!
//! ## Overview
//!
//! Rollcall keeps membership subscriptions current for a small
//! organization:
//!
//! - **Expiry Sweep**: periodic deactivation of lapsed memberships
//! - **Renewal Scan**: queues one notification job per membership expiring
//!   in the current cycle
//! - **Notice Dispatch**: drains the queue, sends the notice, and records
//!   the send
//! - **Suppression**: removes addresses that hard-bounce or complain
//!
//! ## Architecture
//!
//! The server uses:
//! - PostgreSQL for membership storage (the single source of truth)
//! - Redis for the at-least-once notification and feedback queues
//! - An HTTP mail API for delivery

use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use rollcall_config::Config;
use rollcall_core::database::{MembershipsRepository, PostgresDatabase};
use rollcall_core::pipeline::{ExpirySweeper, RenewalScanner};
use rollcall_core::queue::JobQueue;
use rollcall_core::queue::redis::RedisJobQueue;
use rollcall_model::Cycle;

mod errors;
mod routes;
mod runtime;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "rollcall-server")]
#[command(about = "Membership tracking and renewal notification service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler, queue workers, and ops API (the default)
    Serve,

    /// Deactivate memberships expired before a date, then exit
    Sweep {
        /// Cutoff date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Queue renewal notices for one cycle, then exit
    Scan {
        /// Cycle month (1-12); defaults to the current month
        #[arg(long)]
        month: Option<u32>,

        /// Cycle year; defaults to the current year
        #[arg(long)]
        year: Option<i32>,

        /// Clear the cycle's notified flags before scanning
        #[arg(long, default_value_t = false)]
        reset: bool,
    },

    /// Recompute expiration dates from membership start dates, then exit
    RecomputeExpirations,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let db = PostgresDatabase::new(&config.database.url).await?;
    db.initialize_schema().await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => runtime::run(config, db).await,

        Command::Sweep { as_of } => {
            let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
            let repo = Arc::new(db.memberships_repository().clone());
            let deactivated = ExpirySweeper::new(repo).run(as_of).await?;
            info!("Sweep complete: {} membership(s) deactivated", deactivated);
            Ok(())
        }

        Command::Scan { month, year, reset } => {
            let today = Local::now().date_naive();
            let current = Cycle::of(today);
            let cycle = Cycle::new(
                month.unwrap_or(current.month),
                year.unwrap_or(current.year),
            )?;

            let repo = Arc::new(db.memberships_repository().clone());
            let notices: Arc<dyn JobQueue> = Arc::new(
                RedisJobQueue::connect(
                    &config.queue.redis_url,
                    &config.queue.key_prefix,
                    "notices",
                )
                .await?,
            );

            let scanner = RenewalScanner::new(repo, notices);
            let summary = if reset {
                scanner.begin_cycle(cycle).await?
            } else {
                scanner.scan(cycle).await?
            };
            info!(
                "Scan complete for {}: {} candidate(s), {} queued, {} unreachable",
                cycle, summary.matched, summary.queued, summary.unreachable
            );
            Ok(())
        }

        Command::RecomputeExpirations => {
            let updated = db.memberships_repository().recompute_expirations().await?;
            info!(
                "Recomputed membership_expires for {} record(s)",
                updated
            );
            Ok(())
        }
    }
}

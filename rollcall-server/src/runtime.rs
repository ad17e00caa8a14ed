use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use rollcall_config::Config;
use rollcall_core::database::PostgresDatabase;
use rollcall_core::pipeline::{
    ExpirySweeper, NotificationDispatcher, RenewalScanner, SuppressionHandler,
};
use rollcall_core::queue::JobQueue;
use rollcall_core::queue::redis::RedisJobQueue;
use rollcall_core::transport::http::HttpEmailTransport;
use rollcall_model::Cycle;

use crate::routes::{self, AppState};

/// Run the full service: periodic sweeper and scanner, queue-driven
/// dispatcher and suppression workers, and the ops API. Returns once a
/// shutdown signal has been received and the workers have drained.
pub async fn run(config: Config, db: PostgresDatabase) -> anyhow::Result<()> {
    let repo = Arc::new(db.memberships_repository().clone());

    let notices: Arc<dyn JobQueue> = Arc::new(
        RedisJobQueue::connect(&config.queue.redis_url, &config.queue.key_prefix, "notices")
            .await?,
    );
    let feedback: Arc<dyn JobQueue> = Arc::new(
        RedisJobQueue::connect(&config.queue.redis_url, &config.queue.key_prefix, "feedback")
            .await?,
    );
    let transport = Arc::new(HttpEmailTransport::new(&config.mail)?);

    let sweeper = ExpirySweeper::new(repo.clone());
    let scanner = RenewalScanner::new(repo.clone(), notices.clone());
    let dispatcher = NotificationDispatcher::new(
        repo.clone(),
        notices.clone(),
        transport,
        config.mail.organization.clone(),
        config.pipeline.send_retries,
        config.pipeline.job_timeout,
    );
    let suppression = SuppressionHandler::new(repo.clone(), feedback.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut workers = JoinSet::new();

    workers.spawn(sweep_loop(
        sweeper.clone(),
        config.pipeline.sweep_interval,
        shutdown_rx.clone(),
    ));
    workers.spawn(scan_loop(
        scanner.clone(),
        config.pipeline.scan_interval,
        shutdown_rx.clone(),
    ));
    workers.spawn(dispatch_loop(
        dispatcher,
        notices,
        config.pipeline.dispatch_batch_size,
        config.pipeline.poll_interval,
        shutdown_rx.clone(),
    ));
    workers.spawn(feedback_loop(
        suppression,
        feedback,
        config.pipeline.feedback_batch_size,
        config.pipeline.poll_interval,
        shutdown_rx.clone(),
    ));

    let state = AppState {
        db,
        sweeper,
        scanner,
    };
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Ops API listening on {}", addr);

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Ops server exited")?;

    info!("Shutdown signal received; stopping workers");
    let _ = shutdown_tx.send(true);
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            error!("Worker task panicked: {e}");
        }
    }

    Ok(())
}

async fn sweep_loop(sweeper: ExpirySweeper, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let today = Local::now().date_naive();
                if let Err(e) = sweeper.run(today).await {
                    error!("Expiry sweep failed: {e}");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn scan_loop(scanner: RenewalScanner, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Seeded with the current cycle so a mid-cycle restart does not re-run
    // the monthly reset and re-notify members already handled this month.
    // A lingering stale flag can still be cleared through the ops reset
    // endpoint or `scan --reset`.
    let mut last_cycle = Some(Cycle::of(Local::now().date_naive()));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let cycle = Cycle::of(Local::now().date_naive());
                let result = if last_cycle != Some(cycle) {
                    // First tick of a new cycle: clear the notified flags
                    // before selecting candidates.
                    scanner.begin_cycle(cycle).await
                } else {
                    scanner.scan(cycle).await
                };
                match result {
                    Ok(_) => last_cycle = Some(cycle),
                    Err(e) => error!("Renewal scan failed: {e}"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn dispatch_loop(
    dispatcher: NotificationDispatcher,
    queue: Arc<dyn JobQueue>,
    batch_size: usize,
    poll: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // Deliveries abandoned by a previous process go back on the queue
    // before polling starts.
    match queue.recover_stalled().await {
        Ok(0) => {}
        Ok(n) => info!("Requeued {} stalled notice(s) from a previous run", n),
        Err(e) => warn!("Stalled-notice recovery failed: {e}"),
    }

    loop {
        if *shutdown.borrow() {
            break;
        }

        match dispatcher.run_batch(batch_size).await {
            Ok(summary) if summary.received > 0 => continue,
            Ok(_) => {}
            Err(e) => error!("Dispatch batch failed: {e}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = shutdown.changed() => break,
        }
    }
}

async fn feedback_loop(
    suppression: SuppressionHandler,
    channel: Arc<dyn JobQueue>,
    batch_size: usize,
    poll: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    match channel.recover_stalled().await {
        Ok(0) => {}
        Ok(n) => info!("Requeued {} stalled feedback event(s) from a previous run", n),
        Err(e) => warn!("Stalled-feedback recovery failed: {e}"),
    }

    loop {
        if *shutdown.borrow() {
            break;
        }

        match suppression.run_batch(batch_size).await {
            Ok(summary) if summary.received > 0 => continue,
            Ok(_) => {}
            Err(e) => error!("Feedback batch failed: {e}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = shutdown.changed() => break,
        }
    }
}

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use rollcall_core::database::PostgresDatabase;
use rollcall_core::pipeline::{ExpirySweeper, RenewalScanner, ScanSummary};
use rollcall_model::Cycle;

use crate::errors::AppResult;

/// Shared handles for the ops surface. Everything here is cheap to clone;
/// the pool and queue connections live inside.
#[derive(Clone)]
pub struct AppState {
    pub db: PostgresDatabase,
    pub sweeper: ExpirySweeper,
    pub scanner: RenewalScanner,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/memberships/sweep", post(sweep))
        .route("/api/renewals/scan", post(scan))
        .route("/api/renewals/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let stats = state.db.pool_stats();
    Json(json!({
        "status": "ok",
        "db_pool": {
            "size": stats.size,
            "idle": stats.idle,
            "max_size": stats.max_size,
        }
    }))
}

#[derive(Debug, Default, Deserialize)]
struct SweepParams {
    /// Cutoff date; defaults to today.
    as_of: Option<NaiveDate>,
}

/// On-demand expiry sweep.
async fn sweep(
    State(state): State<AppState>,
    Query(params): Query<SweepParams>,
) -> AppResult<Json<Value>> {
    let as_of = params.as_of.unwrap_or_else(|| Local::now().date_naive());
    let deactivated = state.sweeper.run(as_of).await?;
    Ok(Json(json!({
        "as_of": as_of,
        "deactivated": deactivated,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct CycleParams {
    month: Option<u32>,
    year: Option<i32>,
}

impl CycleParams {
    fn cycle(&self) -> Result<Cycle, rollcall_model::ModelError> {
        let today = Local::now().date_naive();
        let current = Cycle::of(today);
        Cycle::new(
            self.month.unwrap_or(current.month),
            self.year.unwrap_or(current.year),
        )
    }
}

/// On-demand candidate scan: queue a renewal notice for every reachable,
/// unnotified membership expiring in the cycle.
async fn scan(
    State(state): State<AppState>,
    Query(params): Query<CycleParams>,
) -> AppResult<Json<ScanSummary>> {
    let cycle = params.cycle()?;
    let summary = state.scanner.scan(cycle).await?;
    Ok(Json(summary))
}

/// On-demand monthly reset: clear the notified flags for the cycle so its
/// members become fresh candidates.
async fn reset(
    State(state): State<AppState>,
    Query(params): Query<CycleParams>,
) -> AppResult<Json<Value>> {
    let cycle = params.cycle()?;
    let reset = state.scanner.reset_cycle(cycle).await?;
    Ok(Json(json!({
        "cycle": cycle.to_string(),
        "reset": reset,
    })))
}

// src/api.rs
//! HTTP surface around the batch processor.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::batch::{Batch, BatchOutcome, BatchProcessor};
use crate::config::{EngineConfig, HotReloadConfig};
use crate::error::SignalError;
use crate::history::{HistoryEntry, SignalHistory};
use crate::market::StaticMarketContext;
use crate::mentions::AssetAliases;
use crate::records::{EngagementMetric, MarketSnapshot, TextSource, TextUnit};

const DEFAULT_HISTORY_CAPACITY: usize = 2000;
const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HotReloadConfig>,
    pub history: Arc<SignalHistory>,
    pub aliases: Arc<AssetAliases>,
}

impl AppState {
    pub fn new(config: Arc<HotReloadConfig>) -> Self {
        Self {
            config,
            history: Arc::new(SignalHistory::with_capacity(DEFAULT_HISTORY_CAPACITY)),
            aliases: Arc::new(AssetAliases::default()),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/signals", post(generate_signals))
        .route("/signals/feed", post(generate_from_feed))
        .route("/signals/history", get(signal_history))
        .route("/config", get(current_config))
        .route("/admin/reload-config", post(admin_reload_config))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: msg.into() })).into_response()
}

async fn generate_signals(State(state): State<AppState>, Json(batch): Json<Batch>) -> Response {
    run_batch(state, batch).await
}

/// Raw feed: posts are attributed to assets by cashtag or name.
#[derive(Deserialize)]
struct FeedRequest {
    as_of: DateTime<Utc>,
    /// Assets that lead the output, in this order.
    #[serde(default)]
    assets: Vec<String>,
    #[serde(default)]
    posts: Vec<FeedPost>,
    #[serde(default)]
    engagement: Vec<EngagementMetric>,
    #[serde(default)]
    market: Vec<MarketSnapshot>,
}

#[derive(Deserialize)]
struct FeedPost {
    body: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    source: Option<TextSource>,
}

async fn generate_from_feed(State(state): State<AppState>, Json(req): Json<FeedRequest>) -> Response {
    let mut texts: Vec<TextUnit> = Vec::new();
    for p in &req.posts {
        let source = p.source.unwrap_or(TextSource::Post);
        match state.aliases.attribute(&p.body, p.timestamp, source) {
            Ok(units) => texts.extend(units),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
    let ctx: StaticMarketContext = req.market.into_iter().collect();

    match Batch::assemble(req.as_of, req.assets.as_slice(), texts, req.engagement, &ctx) {
        Ok(batch) => run_batch(state, batch).await,
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn run_batch(state: AppState, batch: Batch) -> Response {
    let processor = BatchProcessor::from_hot(&state.config);
    let result: Result<BatchOutcome, SignalError> =
        match tokio::task::spawn_blocking(move || processor.process(&batch)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "batch task failed");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "batch task failed");
            }
        };

    match result {
        Ok(outcome) => {
            state.history.record(&outcome.signals);
            Json(outcome).into_response()
        }
        Err(e @ SignalError::Configuration(_)) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn signal_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<HistoryEntry>> {
    let n = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.history.snapshot_last_n(n))
}

async fn current_config(State(state): State<AppState>) -> Json<EngineConfig> {
    Json(state.config.snapshot().as_ref().clone())
}

async fn admin_reload_config(State(state): State<AppState>) -> Response {
    if state.config.path().is_none() {
        return error_response(StatusCode::BAD_REQUEST, "no config file to reload");
    }
    match state.config.reload() {
        Ok(cfg) => Json(cfg.as_ref().clone()).into_response(),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "config reload failed");
            error_response(StatusCode::UNPROCESSABLE_ENTITY, format!("{e:#}"))
        }
    }
}

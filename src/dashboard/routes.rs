//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::exchanges::ExchangeRegistry;
use crate::storage::{OpportunityStore, StoreStats};
use crate::types::{
    ArbError, DashboardEvent, ExchangeProfile, OpportunityFilter, OpportunityRecord, TradingPair,
    VenueFilter,
};

const DEFAULT_TOP_LIMIT: usize = 10;
const DEFAULT_HISTORY_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Static facts about the running instance, shown by `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardInfo {
    pub name: String,
    pub capital_base: Decimal,
    pub refresh_interval_secs: u64,
    pub broadcast_top_n: usize,
}

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub store: Arc<OpportunityStore>,
    pub registry: Arc<ExchangeRegistry>,
    pub pairs: Vec<TradingPair>,
    pub events: broadcast::Sender<DashboardEvent>,
    pub info: DashboardInfo,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(
        store: Arc<OpportunityStore>,
        registry: Arc<ExchangeRegistry>,
        pairs: Vec<TradingPair>,
        events: broadcast::Sender<DashboardEvent>,
        info: DashboardInfo,
    ) -> Self {
        Self {
            store,
            registry,
            pairs,
            events,
            info,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub name: String,
    pub status: String,
    pub cycles: u64,
    pub last_updated_ms: Option<i64>,
    pub opportunity_count: usize,
    pub profitable_count: usize,
    pub history_count: usize,
    pub exchanges: usize,
    pub pairs: usize,
    pub subscribers: usize,
    pub capital_base: Decimal,
    pub refresh_interval_secs: u64,
    pub uptime_secs: i64,
}

/// Raw `/api/opportunities` query. Lists are comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct OpportunityQuery {
    pub min_profit_pct: Option<String>,
    pub exchanges: Option<String>,
    pub pairs: Option<String>,
    pub venue: Option<String>,
    pub limit: Option<usize>,
}

impl OpportunityQuery {
    pub fn to_filter(&self) -> Result<OpportunityFilter, ArbError> {
        let min_net_profit_pct = match self.min_profit_pct.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Decimal::from_str(raw).map_err(|_| {
                ArbError::InvalidFilter(format!("min_profit_pct is not a number: {raw}"))
            })?),
        };
        let venue = match self.venue.as_deref() {
            Some(raw) => raw.trim().parse::<VenueFilter>()?,
            None => VenueFilter::All,
        };

        Ok(OpportunityFilter {
            min_net_profit_pct,
            exchanges: split_list(self.exchanges.as_deref()),
            pairs: split_list(self.pairs.as_deref()),
            venue,
        })
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<ArbError> for ApiError {
    fn from(err: ArbError) -> Self {
        let status = match err {
            ArbError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let stats = state.store.stats().await;
    Json(StatusResponse {
        name: state.info.name.clone(),
        status: "running".into(),
        cycles: stats.cycles,
        last_updated_ms: stats.last_updated_ms,
        opportunity_count: stats.latest_count,
        profitable_count: stats.profitable_count,
        history_count: stats.history_count,
        exchanges: state.registry.len(),
        pairs: state.pairs.len(),
        subscribers: state.events.receiver_count(),
        capital_base: state.info.capital_base,
        refresh_interval_secs: state.info.refresh_interval_secs,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

/// GET /api/opportunities
pub async fn get_opportunities(
    State(state): State<AppState>,
    Query(query): Query<OpportunityQuery>,
) -> Result<Json<Vec<OpportunityRecord>>, ApiError> {
    let filter = query.to_filter()?;
    let mut records = state.store.latest_filtered(&filter).await;
    if let Some(limit) = query.limit {
        records.truncate(limit);
    }
    Ok(Json(records))
}

/// GET /api/opportunities/top
pub async fn get_top_opportunities(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<OpportunityRecord>> {
    Json(state.store.top(query.limit.unwrap_or(DEFAULT_TOP_LIMIT)).await)
}

/// GET /api/history
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<OpportunityRecord>> {
    Json(state.store.history(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)).await)
}

/// GET /api/exchanges
pub async fn get_exchanges(State(state): State<AppState>) -> Json<Vec<ExchangeProfile>> {
    Json(state.registry.profiles().to_vec())
}

/// GET /api/pairs
pub async fn get_pairs(State(state): State<AppState>) -> Json<Vec<TradingPair>> {
    Json(state.pairs.clone())
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.stats().await)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

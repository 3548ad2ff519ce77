//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;

use crate::appraiser::Appraiser;
use crate::catalog::Mutation;
use crate::engine::PriceError;
use crate::types::{table_key, PriceResult, Rarity, SweepReport};
use crate::valuation::ValuationError;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub appraiser: Arc<Appraiser>,
    /// Latest sweep per item+rarity.
    pub latest_sweeps: RwLock<BTreeMap<String, SweepReport>>,
    /// Wall-time budget for request-triggered fetches.
    pub request_budget: Duration,
}

impl ApiState {
    pub fn new(appraiser: Arc<Appraiser>, request_budget: Duration) -> Self {
        Self {
            appraiser,
            latest_sweeps: RwLock::new(BTreeMap::new()),
            request_budget,
        }
    }

    /// Record a report as the latest for its item+rarity.
    pub async fn remember(&self, report: SweepReport) {
        let key = table_key(&report.item, report.rarity);
        self.latest_sweeps.write().await.insert(key, report);
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.request_budget
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// JSON error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<PriceError> for ApiError {
    fn from(e: PriceError) -> Self {
        let status = match e {
            PriceError::UnknownMutation(_) => StatusCode::BAD_REQUEST,
            PriceError::HttpError(_) | PriceError::FetchError(_) => StatusCode::BAD_GATEWAY,
            PriceError::RateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PriceError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<ValuationError> for ApiError {
    fn from(e: ValuationError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

fn parse_rarity(s: &str) -> Result<Rarity, ApiError> {
    s.parse::<Rarity>().map_err(|e| ApiError::bad_request(e.to_string()))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct PriceParams {
    pub item: String,
    pub rarity: String,
    #[serde(default = "default_mutation")]
    pub mutation: String,
}

fn default_mutation() -> String {
    crate::catalog::DEFAULT_MUTATION.to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceResponse {
    pub item: String,
    pub rarity: Rarity,
    pub mutation: String,
    pub result: PriceResult,
}

#[derive(Debug, Deserialize)]
pub struct SweepParams {
    pub item: String,
    pub rarity: String,
}

#[derive(Debug, Deserialize)]
pub struct ValueRequest {
    pub base_value: Decimal,
    #[serde(default)]
    pub traits: Vec<String>,
    /// Applied to `base_value` before traits when present.
    #[serde(default)]
    pub mutation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValueResponse {
    pub base_value: Decimal,
    pub final_value: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ConvertParams {
    pub price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertResponse {
    pub market_price: Decimal,
    pub presentation_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraitEntry {
    pub name: String,
    pub multiplier: Decimal,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/price
pub async fn get_price(
    State(state): State<AppState>,
    Query(params): Query<PriceParams>,
) -> Result<Json<PriceResponse>, ApiError> {
    let rarity = parse_rarity(&params.rarity)?;
    let result = state
        .appraiser
        .fetch_single_price(&params.item, rarity, &params.mutation, Some(state.deadline()))
        .await?;

    Ok(Json(PriceResponse {
        item: params.item,
        rarity,
        mutation: params.mutation.to_lowercase(),
        result,
    }))
}

/// GET /api/sweep
pub async fn get_sweep(
    State(state): State<AppState>,
    Query(params): Query<SweepParams>,
) -> Result<Json<SweepReport>, ApiError> {
    let rarity = parse_rarity(&params.rarity)?;
    let report = state
        .appraiser
        .sweep_item(&params.item, rarity, Some(state.deadline()))
        .await?;
    info!(summary = %report, "Sweep served");
    state.remember(report.clone()).await;
    Ok(Json(report))
}

/// GET /api/sweeps
pub async fn get_sweeps(State(state): State<AppState>) -> Json<Vec<SweepReport>> {
    let latest = state.latest_sweeps.read().await;
    Json(latest.values().cloned().collect())
}

/// POST /api/value
pub async fn post_value(
    State(state): State<AppState>,
    Json(req): Json<ValueRequest>,
) -> Result<Json<ValueResponse>, ApiError> {
    if req.base_value < Decimal::ZERO {
        return Err(ApiError::bad_request("base_value must not be negative"));
    }
    let base_value = match &req.mutation {
        Some(key) => state.appraiser.composer().apply_mutation(req.base_value, key)?,
        None => req.base_value,
    };
    let final_value = state.appraiser.compose_value(base_value, &req.traits)?;
    Ok(Json(ValueResponse { base_value, final_value }))
}

/// GET /api/convert
pub async fn get_convert(
    State(state): State<AppState>,
    Query(params): Query<ConvertParams>,
) -> Result<Json<ConvertResponse>, ApiError> {
    if params.price < Decimal::ZERO {
        return Err(ApiError::bad_request("price must not be negative"));
    }
    Ok(Json(ConvertResponse {
        market_price: params.price,
        presentation_price: state.appraiser.convert_to_presentation_units(params.price)?,
    }))
}

/// GET /api/catalog/mutations
pub async fn get_mutations(State(state): State<AppState>) -> Json<Vec<Mutation>> {
    Json(state.appraiser.mutations().iter().cloned().collect())
}

/// GET /api/catalog/traits
pub async fn get_traits(State(state): State<AppState>) -> Json<Vec<TraitEntry>> {
    Json(
        state
            .appraiser
            .traits()
            .entries()
            .into_iter()
            .map(|(name, multiplier)| TraitEntry {
                name: name.to_string(),
                multiplier,
            })
            .collect(),
    )
}

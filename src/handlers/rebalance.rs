use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::models::RebalanceRecord;
use crate::services::rebalance_service::{ExecutionResult, RebalanceSuggestion};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RebalanceRequest {
    pub wallet_address: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// POST /api/v1/rebalance/suggest
pub async fn suggest(
    State(state): State<AppState>,
    Json(request): Json<RebalanceRequest>,
) -> Result<Json<ApiResponse<RebalanceSuggestion>>, AppError> {
    let suggestion = state.rebalance.suggest(&request.wallet_address).await?;
    Ok(Json(ApiResponse::ok(suggestion)))
}

/// POST /api/v1/rebalance/execute
pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<RebalanceRequest>,
) -> Result<Json<ApiResponse<ExecutionResult>>, AppError> {
    let result = state.rebalance.execute(&request.wallet_address).await?;
    Ok(Json(ApiResponse::ok_with_message(
        result,
        "Rebalance executed (simulation)",
    )))
}

/// GET /api/v1/rebalance/:wallet_address/history
pub async fn history(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<RebalanceRecord>>>, AppError> {
    let records = state
        .rebalance
        .history(&wallet_address, query.limit.unwrap_or(20))
        .await?;
    Ok(Json(ApiResponse::ok(records)))
}

pub fn create_rebalance_routes() -> Router<AppState> {
    Router::new()
        .route("/rebalance/suggest", post(suggest))
        .route("/rebalance/execute", post(execute))
        .route("/rebalance/:wallet_address/history", get(history))
}

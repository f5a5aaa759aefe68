use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::services::analyzer::AnomalyReport;
use crate::services::risk_service::{AiAnalysis, MetricsHistory, RiskAnalysis};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub wallet_address: String,
}

#[derive(Debug, Deserialize)]
pub struct AnomaliesRequest {
    pub wallet_address: Option<String>,
    pub asset_codes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub limit: Option<i64>,
}

/// POST /api/v1/risk/analyze
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<RiskAnalysis>>, AppError> {
    let analysis = state.risk.analyze(&request.wallet_address).await?;
    Ok(Json(ApiResponse::ok(analysis)))
}

/// GET /api/v1/risk/:wallet_address/metrics
pub async fn metrics(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<ApiResponse<MetricsHistory>>, AppError> {
    let history = state
        .risk
        .metrics_history(&wallet_address, query.limit.unwrap_or(30))
        .await?;
    Ok(Json(ApiResponse::ok(history)))
}

/// POST /api/v1/risk/ai-analysis
pub async fn ai_analysis(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<AiAnalysis>>, AppError> {
    let analysis = state.risk.ai_analysis(&request.wallet_address).await?;
    Ok(Json(ApiResponse::ok(analysis)))
}

/// POST /api/v1/risk/anomalies
///
/// Explicit asset codes take precedence over the wallet's holdings.
pub async fn anomalies(
    State(state): State<AppState>,
    Json(request): Json<AnomaliesRequest>,
) -> Result<Json<ApiResponse<Vec<AnomalyReport>>>, AppError> {
    let reports = match (&request.asset_codes, &request.wallet_address) {
        (Some(codes), _) if !codes.is_empty() => state.risk.anomalies_for_assets(codes).await?,
        (_, Some(wallet)) => state.risk.anomalies(wallet).await?,
        _ => {
            return Err(AppError::ValidationError(
                "Provide wallet_address or asset_codes".to_string(),
            ))
        }
    };
    Ok(Json(ApiResponse::ok(reports)))
}

pub fn create_risk_routes() -> Router<AppState> {
    Router::new()
        .route("/risk/analyze", post(analyze))
        .route("/risk/:wallet_address/metrics", get(metrics))
        .route("/risk/ai-analysis", post(ai_analysis))
        .route("/risk/anomalies", post(anomalies))
}

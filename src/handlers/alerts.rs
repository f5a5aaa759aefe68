use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::models::{CreateAlert, RiskAlert};
use crate::services::alert_service::AlertStats;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GetAlertsQuery {
    /// Resolved alerts are included unless this is set.
    #[serde(default)]
    pub active_only: bool,
    pub severity: Option<String>,
}

/// GET /api/v1/alerts/:wallet_address
pub async fn get_alerts(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
    Query(query): Query<GetAlertsQuery>,
) -> Result<Json<ApiResponse<Vec<RiskAlert>>>, AppError> {
    let user = state.portfolio.find_user(&wallet_address).await?;
    let alerts = state
        .alerts
        .list(user.id, query.active_only, query.severity.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok(alerts)))
}

/// POST /api/v1/alerts/:wallet_address
pub async fn create_alert(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
    Json(payload): Json<CreateAlert>,
) -> Result<(StatusCode, Json<ApiResponse<RiskAlert>>), AppError> {
    let user = state.portfolio.find_user(&wallet_address).await?;
    let alert = state.alerts.create(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(alert))))
}

/// GET /api/v1/alerts/:wallet_address/active
pub async fn get_active_alerts(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Result<Json<ApiResponse<Vec<RiskAlert>>>, AppError> {
    let user = state.portfolio.find_user(&wallet_address).await?;
    let alerts = state.alerts.list(user.id, true, None).await?;
    Ok(Json(ApiResponse::ok(alerts)))
}

/// PATCH /api/v1/alerts/:wallet_address/:alert_id/resolve
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path((wallet_address, alert_id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse<RiskAlert>>, AppError> {
    let user = state.portfolio.find_user(&wallet_address).await?;
    let alert = state.alerts.resolve(user.id, alert_id).await?;
    Ok(Json(ApiResponse::ok_with_message(alert, "Alert resolved")))
}

/// DELETE /api/v1/alerts/:wallet_address/:alert_id
pub async fn delete_alert(
    State(state): State<AppState>,
    Path((wallet_address, alert_id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let user = state.portfolio.find_user(&wallet_address).await?;
    state.alerts.delete(user.id, alert_id).await?;
    Ok(Json(ApiResponse::ok_with_message((), "Alert deleted")))
}

/// GET /api/v1/alerts/:wallet_address/stats
pub async fn alert_stats(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Result<Json<ApiResponse<AlertStats>>, AppError> {
    let user = state.portfolio.find_user(&wallet_address).await?;
    let stats = state.alerts.stats(user.id).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

pub fn create_alert_routes() -> Router<AppState> {
    Router::new()
        .route("/alerts/:wallet_address", get(get_alerts))
        .route("/alerts/:wallet_address", post(create_alert))
        .route("/alerts/:wallet_address/active", get(get_active_alerts))
        .route("/alerts/:wallet_address/stats", get(alert_stats))
        .route(
            "/alerts/:wallet_address/:alert_id/resolve",
            patch(resolve_alert),
        )
        .route("/alerts/:wallet_address/:alert_id", delete(delete_alert))
}

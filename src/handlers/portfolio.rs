use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::models::{CreateAsset, CreateUser, UpdateAsset, PortfolioAsset};
use crate::services::portfolio_service::{
    AssetDetail, PortfolioOverview, SyncResult, UserCreated,
};
use crate::AppState;

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, Json<ApiResponse<UserCreated>>), AppError> {
    let created = state.portfolio.create_user(payload).await?;
    let (status, message) = if created.created {
        state.alerts.seed_sample_alerts(created.user.id).await?;
        (
            StatusCode::CREATED,
            "Wallet registered and portfolio discovered",
        )
    } else {
        (StatusCode::OK, "Wallet already registered")
    };
    Ok((status, Json(ApiResponse::ok_with_message(created, message))))
}

/// GET /api/v1/portfolio/:wallet_address
pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Result<Json<ApiResponse<PortfolioOverview>>, AppError> {
    let overview = state.portfolio.portfolio(&wallet_address).await?;
    Ok(Json(ApiResponse::ok(overview)))
}

/// POST /api/v1/portfolio/:wallet_address/assets
pub async fn add_asset(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
    Json(payload): Json<CreateAsset>,
) -> Result<(StatusCode, Json<ApiResponse<PortfolioAsset>>), AppError> {
    let asset = state.portfolio.add_asset(&wallet_address, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(asset))))
}

/// GET /api/v1/portfolio/:wallet_address/assets/:asset_id
pub async fn get_asset(
    State(state): State<AppState>,
    Path((wallet_address, asset_id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse<AssetDetail>>, AppError> {
    let detail = state
        .portfolio
        .asset_detail(&wallet_address, asset_id)
        .await?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// PUT /api/v1/portfolio/:wallet_address/assets/:asset_id
pub async fn update_asset(
    State(state): State<AppState>,
    Path((wallet_address, asset_id)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateAsset>,
) -> Result<Json<ApiResponse<PortfolioAsset>>, AppError> {
    let asset = state
        .portfolio
        .update_asset(&wallet_address, asset_id, payload)
        .await?;
    Ok(Json(ApiResponse::ok(asset)))
}

/// DELETE /api/v1/portfolio/:wallet_address/assets/:asset_id
pub async fn remove_asset(
    State(state): State<AppState>,
    Path((wallet_address, asset_id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let message = state
        .portfolio
        .remove_asset(&wallet_address, asset_id)
        .await?;
    Ok(Json(ApiResponse::ok_with_message((), message)))
}

/// POST /api/v1/portfolio/:wallet_address/sync
pub async fn sync_assets(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Result<Json<ApiResponse<SyncResult>>, AppError> {
    let result = state.portfolio.sync_assets(&wallet_address).await?;
    Ok(Json(ApiResponse::ok_with_message(
        result,
        "Portfolio synced with on-chain balances",
    )))
}

pub fn create_portfolio_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/portfolio/:wallet_address", get(get_portfolio))
        .route("/portfolio/:wallet_address/assets", post(add_asset))
        .route(
            "/portfolio/:wallet_address/assets/:asset_id",
            get(get_asset),
        )
        .route(
            "/portfolio/:wallet_address/assets/:asset_id",
            put(update_asset),
        )
        .route(
            "/portfolio/:wallet_address/assets/:asset_id",
            delete(remove_asset),
        )
        .route("/portfolio/:wallet_address/sync", post(sync_assets))
}

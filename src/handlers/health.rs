use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};

use crate::database;
use crate::AppState;

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": "defi-risk-guardian",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/api/v1",
    }))
}

/// GET /health
///
/// Reports the state of every dependency so load balancers and dashboards
/// can tell a degraded instance from a dead one.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database_version = database::server_version(&state.db_pool).await.ok();
    let database_ok = database_version.is_some();
    let oracle_ok = state.price_feed.health_check().await;
    let cache = state.cache.stats();

    let status = if database_ok {
        if oracle_ok {
            "healthy"
        } else {
            "degraded"
        }
    } else {
        "unhealthy"
    };

    Json(json!({
        "status": status,
        "database": if database_ok { "up" } else { "down" },
        "database_version": database_version,
        "oracle": if oracle_ok { "up" } else { "down" },
        "cache": cache,
    }))
}

pub fn create_health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}

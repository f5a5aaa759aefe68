use std::net::SocketAddr;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use defi_risk_guardian::config::Settings;
use defi_risk_guardian::database::{establish_connection, run_migrations};
use defi_risk_guardian::handlers::{
    create_alert_routes, create_health_routes, create_portfolio_routes, create_rebalance_routes,
    create_risk_routes,
};
use defi_risk_guardian::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone())),
        )
        .init();

    info!("Starting DeFi Risk Guardian");

    let db_pool = establish_connection(&settings.database.url).await?;
    run_migrations(&db_pool).await?;
    info!("Database ready");

    let addr = SocketAddr::new(settings.api.host.parse()?, settings.api.port);
    let app_state = AppState::new(db_pool, settings)?;

    let app = Router::new()
        .merge(create_health_routes())
        .nest("/api/v1", create_portfolio_routes())
        .nest("/api/v1", create_risk_routes())
        .nest("/api/v1", create_rebalance_routes())
        .nest("/api/v1", create_alert_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

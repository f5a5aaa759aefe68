pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use sqlx::PgPool;

use config::Settings;
use error::AppError;
use services::{
    AlertService, CacheService, HorizonClient, PortfolioService, PriceFeed, RebalanceService,
    ReflectorClient, RiskService,
};

pub use error::types::*;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Settings,
    pub cache: CacheService,
    pub price_feed: Arc<PriceFeed>,
    pub portfolio: PortfolioService,
    pub risk: RiskService,
    pub rebalance: RebalanceService,
    pub alerts: AlertService,
}

impl AppState {
    pub fn new(db_pool: PgPool, settings: Settings) -> Result<Self, AppError> {
        let cache = CacheService::new(&settings.cache);
        let reflector = ReflectorClient::new(&settings.oracle)
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        let price_feed = Arc::new(PriceFeed::new(reflector, cache.clone(), &settings.cache));
        let horizon = Arc::new(
            HorizonClient::new(&settings.horizon)
                .map_err(|e| AppError::ConfigError(e.to_string()))?,
        );

        let portfolio = PortfolioService::new(db_pool.clone(), price_feed.clone(), horizon);
        let alerts = AlertService::new(db_pool.clone());
        let risk = RiskService::new(
            db_pool.clone(),
            portfolio.clone(),
            price_feed.clone(),
            alerts.clone(),
            settings.risk.clone(),
        );
        let rebalance =
            RebalanceService::new(db_pool.clone(), portfolio.clone(), settings.risk.clone());

        Ok(Self {
            db_pool,
            settings,
            cache,
            price_feed,
            portfolio,
            risk,
            rebalance,
            alerts,
        })
    }
}

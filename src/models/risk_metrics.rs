use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Persisted snapshot of a portfolio's risk profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RiskMetricsRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub portfolio_value: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub volatility: f64,
    pub sharpe_ratio: Option<f64>,
    pub beta: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub calculated_at: DateTime<Utc>,
}

impl RiskMetricsRecord {
    pub fn new(
        user_id: Uuid,
        portfolio_value: f64,
        var_95: f64,
        var_99: f64,
        volatility: f64,
        sharpe_ratio: Option<f64>,
        beta: Option<f64>,
        max_drawdown: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            portfolio_value,
            var_95,
            var_99,
            volatility,
            sharpe_ratio,
            beta,
            max_drawdown,
            calculated_at: Utc::now(),
        }
    }
}

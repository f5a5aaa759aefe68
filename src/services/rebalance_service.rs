use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::config::RiskSettings;
use crate::error::AppError;
use crate::models::RebalanceRecord;
use crate::services::portfolio_service::PortfolioService;

const MIN_ORDER_USD: f64 = 1.0;
const BUY_FEE_RATE: f64 = 0.001;
const SELL_FEE_RATE: f64 = 0.0005;
const SIMULATED_FILL_RATE: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceOrder {
    pub asset_code: String,
    pub asset_issuer: Option<String>,
    pub side: OrderSide,
    pub current_allocation: f64,
    pub target_allocation: f64,
    pub deviation: f64,
    pub amount_usd: f64,
    pub estimated_fee_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceSuggestion {
    pub wallet_address: String,
    pub needs_rebalance: bool,
    pub total_value: f64,
    pub total_deviation: f64,
    pub estimated_risk_improvement: f64,
    pub total_fees_usd: f64,
    pub orders: Vec<RebalanceOrder>,
}

#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub executed: bool,
    pub orders_submitted: usize,
    pub fill_rate: f64,
    pub total_fees_usd: f64,
    pub record: RebalanceRecord,
}

#[derive(Clone)]
pub struct RebalanceService {
    pool: PgPool,
    portfolio: PortfolioService,
    settings: RiskSettings,
}

impl RebalanceService {
    pub fn new(pool: PgPool, portfolio: PortfolioService, settings: RiskSettings) -> Self {
        Self {
            pool,
            portfolio,
            settings,
        }
    }

    /// Compares live allocations against targets. Once any holding drifts
    /// past the threshold, orders cover every drifted holding. Dust orders
    /// at or under $1 are dropped.
    pub async fn suggest(&self, wallet_address: &str) -> Result<RebalanceSuggestion, AppError> {
        let overview = self.portfolio.portfolio(wallet_address).await?;
        if overview.total_value <= 0.0 {
            return Err(AppError::RebalanceError(
                "Portfolio has no value to rebalance".to_string(),
            ));
        }

        let targets_sum: f64 = overview
            .assets
            .iter()
            .map(|a| a.target_allocation)
            .sum();
        if targets_sum <= 0.0 {
            return Err(AppError::RebalanceError(
                "No target allocations set for this portfolio".to_string(),
            ));
        }

        let weights: Vec<PositionWeights> = overview
            .assets
            .iter()
            .map(|p| PositionWeights {
                asset_code: p.asset_code.clone(),
                asset_issuer: p.asset_issuer.clone(),
                current: p.allocation,
                target: p.target_allocation,
            })
            .collect();
        let total_deviation: f64 = weights
            .iter()
            .map(|w| (w.current - w.target / targets_sum).abs())
            .sum();
        let orders = plan_orders(
            &weights,
            overview.total_value,
            self.settings.rebalance_threshold,
        );

        let total_fees_usd = orders.iter().map(|o| o.estimated_fee_usd).sum();
        let estimated_risk_improvement = estimated_risk_improvement(total_deviation);

        Ok(RebalanceSuggestion {
            wallet_address: overview.wallet_address,
            needs_rebalance: !orders.is_empty(),
            total_value: overview.total_value,
            total_deviation,
            estimated_risk_improvement,
            total_fees_usd,
            orders,
        })
    }

    /// Simulated execution of the current suggestion. No transactions are
    /// submitted to the network; the outcome is recorded for the history
    /// endpoint with a fixed fill rate.
    pub async fn execute(&self, wallet_address: &str) -> Result<ExecutionResult, AppError> {
        let suggestion = self.suggest(wallet_address).await?;
        if !suggestion.needs_rebalance {
            return Err(AppError::RebalanceError(
                "Portfolio is within threshold, nothing to execute".to_string(),
            ));
        }

        let user = self.portfolio.find_user(wallet_address).await?;
        let old_allocation: HashMap<&str, f64> = suggestion
            .orders
            .iter()
            .map(|o| (o.asset_code.as_str(), o.current_allocation))
            .collect();
        let executed_orders = json!({
            "fill_rate": SIMULATED_FILL_RATE,
            "orders": suggestion.orders,
        });

        let record = RebalanceRecord::new(
            user.id,
            serde_json::to_string(&old_allocation)?,
            serde_json::to_string(&executed_orders)?,
            "threshold".to_string(),
        );
        sqlx::query(
            "INSERT INTO rebalance_history
             (id, user_id, old_allocation, new_allocation, rebalance_type,
              executed_at, success, error_message)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.old_allocation)
        .bind(&record.new_allocation)
        .bind(&record.rebalance_type)
        .bind(record.executed_at)
        .bind(record.success)
        .bind(&record.error_message)
        .execute(&self.pool)
        .await?;

        info!(
            "Executed simulated rebalance for {}: {} orders",
            wallet_address,
            suggestion.orders.len()
        );

        Ok(ExecutionResult {
            executed: true,
            orders_submitted: suggestion.orders.len(),
            fill_rate: SIMULATED_FILL_RATE,
            total_fees_usd: suggestion.total_fees_usd,
            record,
        })
    }

    pub async fn history(
        &self,
        wallet_address: &str,
        limit: i64,
    ) -> Result<Vec<RebalanceRecord>, AppError> {
        let user = self.portfolio.find_user(wallet_address).await?;
        let records = sqlx::query_as::<_, RebalanceRecord>(
            "SELECT * FROM rebalance_history
             WHERE user_id = $1
             ORDER BY executed_at DESC
             LIMIT $2",
        )
        .bind(user.id)
        .bind(limit.clamp(1, 200))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

/// Live and target weights for one holding, the input to order planning.
#[derive(Debug, Clone)]
pub struct PositionWeights {
    pub asset_code: String,
    pub asset_issuer: Option<String>,
    pub current: f64,
    pub target: f64,
}

/// Percent-scale heuristic: ten times the total allocation drift,
/// capped at 100.
pub fn estimated_risk_improvement(total_deviation: f64) -> f64 {
    (total_deviation * 10.0).min(100.0)
}

/// Pure planning core behind the suggestion endpoint. Targets are
/// normalized so partial target coverage still sums to a full allocation.
///
/// The threshold is a portfolio-level gate: once any holding drifts past
/// it, orders cover every drifted holding so buys and sells offset and
/// the portfolio lands on target.
pub fn plan_orders(
    positions: &[PositionWeights],
    total_value: f64,
    threshold: f64,
) -> Vec<RebalanceOrder> {
    let targets_sum: f64 = positions.iter().map(|p| p.target).sum();
    if targets_sum <= 0.0 || total_value <= 0.0 {
        return Vec::new();
    }

    let needs_rebalance = positions
        .iter()
        .any(|p| (p.current - p.target / targets_sum).abs() > threshold);
    if !needs_rebalance {
        return Vec::new();
    }

    positions
        .iter()
        .filter_map(|position| {
            let target = position.target / targets_sum;
            let deviation = position.current - target;
            let amount_usd = deviation.abs() * total_value;
            if amount_usd <= MIN_ORDER_USD {
                return None;
            }
            let side = if deviation > 0.0 {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            };
            let fee_rate = match side {
                OrderSide::Buy => BUY_FEE_RATE,
                OrderSide::Sell => SELL_FEE_RATE,
            };
            Some(RebalanceOrder {
                asset_code: position.asset_code.clone(),
                asset_issuer: position.asset_issuer.clone(),
                side,
                current_allocation: position.current,
                target_allocation: target,
                deviation,
                amount_usd,
                estimated_fee_usd: amount_usd * fee_rate,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(code: &str, current: f64, target: f64) -> PositionWeights {
        PositionWeights {
            asset_code: code.to_string(),
            asset_issuer: None,
            current,
            target,
        }
    }

    #[test]
    fn test_plan_orders_balanced_portfolio_is_empty() {
        let positions = vec![weights("XLM", 0.5, 0.5), weights("USDC", 0.5, 0.5)];
        assert!(plan_orders(&positions, 10_000.0, 0.05).is_empty());
    }

    #[test]
    fn test_plan_orders_sells_overweight_buys_underweight() {
        let positions = vec![weights("XLM", 0.8, 0.5), weights("USDC", 0.2, 0.5)];
        let orders = plan_orders(&positions, 10_000.0, 0.05);
        assert_eq!(orders.len(), 2);

        let xlm = orders.iter().find(|o| o.asset_code == "XLM").unwrap();
        assert_eq!(xlm.side, OrderSide::Sell);
        assert!((xlm.amount_usd - 3000.0).abs() < 1e-6);
        assert!((xlm.estimated_fee_usd - 3000.0 * SELL_FEE_RATE).abs() < 1e-9);

        let usdc = orders.iter().find(|o| o.asset_code == "USDC").unwrap();
        assert_eq!(usdc.side, OrderSide::Buy);
        assert!((usdc.estimated_fee_usd - 3000.0 * BUY_FEE_RATE).abs() < 1e-9);
    }

    #[test]
    fn test_plan_orders_skips_dust() {
        let positions = vec![weights("XLM", 0.6, 0.5), weights("USDC", 0.4, 0.5)];
        // 10% drift of a $5 portfolio is under the $1 minimum order.
        assert!(plan_orders(&positions, 5.0, 0.05).is_empty());
    }

    #[test]
    fn test_plan_orders_normalizes_partial_targets() {
        // Targets sum to 0.5, so each normalizes to 0.5 of the portfolio.
        let positions = vec![weights("XLM", 0.9, 0.25), weights("USDC", 0.1, 0.25)];
        let orders = plan_orders(&positions, 10_000.0, 0.05);
        assert_eq!(orders.len(), 2);
        for order in &orders {
            assert!((order.target_allocation - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_plan_orders_no_targets() {
        let positions = vec![weights("XLM", 1.0, 0.0)];
        assert!(plan_orders(&positions, 10_000.0, 0.05).is_empty());
    }

    #[test]
    fn test_plan_orders_keeps_sub_threshold_legs_once_gated() {
        // BTC's 4pp drift is under the 5% threshold on its own, but XLM's
        // 30pp drift opens the gate and every leg trades so the order
        // list offsets.
        let positions = vec![
            weights("XLM", 0.5, 0.2),
            weights("USDC", 0.24, 0.5),
            weights("BTC", 0.26, 0.3),
        ];
        let orders = plan_orders(&positions, 10_000.0, 0.05);
        assert_eq!(orders.len(), 3);

        let sells: f64 = orders
            .iter()
            .filter(|o| o.side == OrderSide::Sell)
            .map(|o| o.amount_usd)
            .sum();
        let buys: f64 = orders
            .iter()
            .filter(|o| o.side == OrderSide::Buy)
            .map(|o| o.amount_usd)
            .sum();
        assert!((sells - buys).abs() < 1e-6);

        let btc = orders.iter().find(|o| o.asset_code == "BTC").unwrap();
        assert_eq!(btc.side, OrderSide::Buy);
        assert!((btc.amount_usd - 400.0).abs() < 1e-6);
    }

    #[test]
    fn test_plan_orders_within_threshold_stays_empty() {
        let positions = vec![weights("XLM", 0.52, 0.5), weights("USDC", 0.48, 0.5)];
        assert!(plan_orders(&positions, 10_000.0, 0.05).is_empty());
    }

    #[test]
    fn test_risk_improvement_scales_with_drift() {
        assert!((estimated_risk_improvement(0.3) - 3.0).abs() < 1e-12);
        assert!((estimated_risk_improvement(0.02) - 0.2).abs() < 1e-12);
        assert_eq!(estimated_risk_improvement(50.0), 100.0);
    }
}

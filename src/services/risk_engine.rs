use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::PricePoint;
use crate::utils::math;

const TRADING_DAYS: f64 = 252.0;
const HOURS_PER_YEAR: f64 = 24.0 * 365.0;
const RISK_FREE_RATE: f64 = 0.02;
const VOLATILITY_CAP: f64 = 2.0;
const DEFAULT_VOLATILITY: f64 = 0.2;

/// A portfolio holding enriched with market data, the unit every risk
/// formula operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub asset_code: String,
    pub asset_issuer: Option<String>,
    pub balance: f64,
    pub price_usd: f64,
    pub value_usd: f64,
    /// Fraction of total portfolio value, 0..=1.
    pub allocation: f64,
    pub volatility: f64,
    pub beta: f64,
    pub correlation_xlm: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRiskMetrics {
    pub portfolio_value: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub beta: f64,
    pub max_drawdown: f64,
    pub risk_score: f64,
    pub diversification_ratio: f64,
    pub tail_risk: f64,
}

impl PortfolioRiskMetrics {
    pub(crate) fn empty() -> Self {
        Self {
            portfolio_value: 0.0,
            var_95: 0.0,
            var_99: 0.0,
            cvar_95: 0.0,
            volatility: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            beta: 0.0,
            max_drawdown: 0.0,
            risk_score: 0.0,
            diversification_ratio: 0.0,
            tail_risk: 0.0,
        }
    }
}

pub struct RiskEngine {
    simulations: usize,
}

impl RiskEngine {
    pub fn new(simulations: usize) -> Self {
        Self { simulations }
    }

    /// Full metric set over enriched holdings. Monte Carlo VaR/CVaR path.
    pub fn analyze(&self, assets: &[AssetSnapshot]) -> PortfolioRiskMetrics {
        if assets.is_empty() {
            return PortfolioRiskMetrics::empty();
        }
        let portfolio_value: f64 = assets.iter().map(|a| a.value_usd).sum();
        if portfolio_value <= 0.0 {
            return PortfolioRiskMetrics::empty();
        }

        let volatility = self.portfolio_volatility(assets);
        let losses = self.simulate_losses(portfolio_value, volatility);
        let var_95 = loss_percentile(&losses, 0.95);
        let var_99 = loss_percentile(&losses, 0.99);
        let cvar_95 = expected_shortfall(&losses, var_95);

        let sharpe_ratio = self.sharpe_ratio(assets, volatility);
        let sortino_ratio = self.sortino_ratio(assets, volatility);
        let beta = weighted_beta(assets);
        let max_drawdown = estimate_max_drawdown(volatility);
        let diversification_ratio = diversification_ratio(assets, volatility);
        let tail_risk = tail_risk(assets);

        let risk_score = composite_risk_score(
            volatility,
            var_95,
            max_drawdown,
            diversification_ratio,
            tail_risk,
        );

        debug!(
            "Portfolio analysis: value={:.2} vol={:.4} var95={:.2} score={:.1}",
            portfolio_value, volatility, var_95, risk_score
        );

        PortfolioRiskMetrics {
            portfolio_value,
            var_95,
            var_99,
            cvar_95,
            volatility,
            sharpe_ratio,
            sortino_ratio,
            beta,
            max_drawdown,
            risk_score,
            diversification_ratio,
            tail_risk,
        }
    }

    /// Closed-form z-score VaR used by the lightweight analyze endpoint.
    pub fn parametric_var(&self, portfolio_value: f64, volatility: f64, confidence: f64) -> f64 {
        let z = if confidence >= 0.99 { 2.326 } else { 1.645 };
        (portfolio_value * volatility * z).max(0.0)
    }

    /// Correlation-weighted portfolio volatility. Pairwise correlations are
    /// approximated from each asset's correlation to XLM, damped by 0.7.
    pub fn portfolio_volatility(&self, assets: &[AssetSnapshot]) -> f64 {
        match assets.len() {
            0 => DEFAULT_VOLATILITY,
            1 => assets[0].volatility,
            n => {
                let mut variance = 0.0;
                for i in 0..n {
                    for j in 0..n {
                        let corr = if i == j {
                            1.0
                        } else {
                            (assets[i].correlation_xlm + assets[j].correlation_xlm) / 2.0 * 0.7
                        };
                        variance += assets[i].allocation
                            * assets[j].allocation
                            * assets[i].volatility
                            * assets[j].volatility
                            * corr;
                    }
                }
                variance.max(0.0).sqrt()
            }
        }
    }

    fn simulate_losses(&self, portfolio_value: f64, volatility: f64) -> Vec<f64> {
        let daily_sigma = volatility / TRADING_DAYS.sqrt();
        let normal = match Normal::new(0.0, daily_sigma.max(f64::EPSILON)) {
            Ok(normal) => normal,
            Err(_) => return vec![0.0],
        };

        let mut rng = rand::thread_rng();
        (0..self.simulations)
            .map(|_| -portfolio_value * normal.sample(&mut rng))
            .collect()
    }

    fn sharpe_ratio(&self, assets: &[AssetSnapshot], volatility: f64) -> f64 {
        if volatility == 0.0 {
            return 0.0;
        }
        (portfolio_expected_return(assets) - RISK_FREE_RATE) / volatility
    }

    fn sortino_ratio(&self, assets: &[AssetSnapshot], volatility: f64) -> f64 {
        // Downside deviation approximated as 70% of total volatility.
        let downside = volatility * 0.7;
        if downside == 0.0 {
            return 0.0;
        }
        (portfolio_expected_return(assets) - RISK_FREE_RATE) / downside
    }
}

/// Annualized volatility from an hourly price series, capped at 200%.
pub fn annualized_volatility(history: &[PricePoint]) -> f64 {
    if history.len() < 2 {
        return DEFAULT_VOLATILITY;
    }
    let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
    let returns = math::log_returns(&prices);
    if returns.is_empty() {
        return DEFAULT_VOLATILITY;
    }
    (math::std_dev(&returns) * HOURS_PER_YEAR.sqrt()).min(VOLATILITY_CAP)
}

/// Beta of an asset's returns against the market (XLM) return series, capped
/// to [-1, 3]. Falls back to a per-asset default table on short series.
pub fn asset_beta(asset_code: &str, returns: &[f64], market_returns: &[f64]) -> f64 {
    if asset_code == "XLM" {
        return 1.0;
    }
    let n = returns.len().min(market_returns.len());
    if n < 10 {
        return default_beta(asset_code);
    }

    let market = &market_returns[..n];
    let market_var = math::variance(market);
    if market_var == 0.0 {
        return default_beta(asset_code);
    }

    let mean_r = math::mean(&returns[..n]);
    let mean_m = math::mean(market);
    let covariance = returns[..n]
        .iter()
        .zip(market.iter())
        .map(|(r, m)| (r - mean_r) * (m - mean_m))
        .sum::<f64>()
        / n as f64;

    (covariance / market_var).clamp(-1.0, 3.0)
}

/// Correlation of an asset's returns with XLM, with per-asset defaults on
/// short series.
pub fn asset_correlation_xlm(asset_code: &str, returns: &[f64], xlm_returns: &[f64]) -> f64 {
    if asset_code == "XLM" {
        return 1.0;
    }
    let n = returns.len().min(xlm_returns.len());
    if n < 10 {
        return default_correlation(asset_code);
    }
    match math::correlation(&returns[..n], &xlm_returns[..n]) {
        Ok(corr) if corr.is_finite() => corr.clamp(-1.0, 1.0),
        _ => default_correlation(asset_code),
    }
}

pub fn default_beta(asset_code: &str) -> f64 {
    match asset_code {
        "USDC" | "USDT" | "USD" => 0.1,
        "BTC" => 0.8,
        "ETH" => 0.9,
        "ADA" => 1.2,
        _ => 0.7,
    }
}

pub fn default_correlation(asset_code: &str) -> f64 {
    match asset_code {
        "USDC" | "USDT" | "USD" => 0.1,
        "BTC" => 0.7,
        "ETH" => 0.8,
        "ADA" => 0.6,
        _ => 0.4,
    }
}

/// Static volatility table for the lightweight analyze path when no history
/// is available at all.
pub fn default_volatility(asset_code: &str) -> f64 {
    match asset_code {
        "XLM" => 0.25,
        "USDC" | "USDT" | "USD" => 0.01,
        "BTC" => 0.35,
        "ETH" => 0.30,
        _ => DEFAULT_VOLATILITY,
    }
}

pub fn expected_return(asset_code: &str) -> f64 {
    match asset_code {
        "XLM" => 0.08,
        "USDC" | "USDT" | "USD" => 0.02,
        "BTC" => 0.15,
        "ETH" => 0.12,
        _ => 0.06,
    }
}

fn portfolio_expected_return(assets: &[AssetSnapshot]) -> f64 {
    assets
        .iter()
        .map(|a| expected_return(&a.asset_code) * a.allocation)
        .sum()
}

pub fn weighted_beta(assets: &[AssetSnapshot]) -> f64 {
    assets.iter().map(|a| a.beta * a.allocation).sum()
}

/// Empirical volatility-to-drawdown heuristic, capped at 80%.
pub fn estimate_max_drawdown(volatility: f64) -> f64 {
    (volatility * 2.5).min(0.8)
}

/// Weighted average volatility over portfolio volatility, capped at 10.
pub fn diversification_ratio(assets: &[AssetSnapshot], portfolio_volatility: f64) -> f64 {
    if assets.is_empty() || portfolio_volatility == 0.0 {
        return 0.0;
    }
    let weighted_avg: f64 = assets.iter().map(|a| a.volatility * a.allocation).sum();
    if weighted_avg == 0.0 {
        return 0.0;
    }
    (weighted_avg / portfolio_volatility).min(10.0)
}

/// Concentration + volatility proxy for tail exposure, in [0, 1].
pub fn tail_risk(assets: &[AssetSnapshot]) -> f64 {
    if assets.is_empty() {
        return 0.5;
    }
    let max_allocation = assets.iter().map(|a| a.allocation).fold(0.0, f64::max);
    let avg_volatility =
        assets.iter().map(|a| a.volatility).sum::<f64>() / assets.len() as f64;
    ((max_allocation + avg_volatility) / 2.0).min(1.0)
}

/// Composite 0-100 risk score. Component weights follow the dashboard's
/// scoring model: volatility 30%, VaR 25%, drawdown 20%, diversification
/// 15%, tail risk 10%.
pub fn composite_risk_score(
    volatility: f64,
    var_95: f64,
    max_drawdown: f64,
    diversification_ratio: f64,
    tail_risk: f64,
) -> f64 {
    let volatility_score = (volatility * 250.0).min(100.0);
    let var_score = (var_95 / 1000.0 * 100.0).min(100.0);
    let drawdown_score = (max_drawdown * 125.0).min(100.0);
    let div_score = (100.0 - diversification_ratio * 20.0).max(0.0);
    let tail_score = (tail_risk * 100.0).min(100.0);

    (volatility_score * 0.3
        + var_score * 0.25
        + drawdown_score * 0.2
        + div_score * 0.15
        + tail_score * 0.1)
        .min(100.0)
}

/// Concentration-driven score for the portfolio overview endpoint, which
/// has no history data in hand.
pub fn simple_risk_score(allocations: &[f64]) -> f64 {
    if allocations.is_empty() {
        return 0.0;
    }
    let max_allocation = allocations.iter().cloned().fold(0.0, f64::max);
    let concentration_risk = max_allocation.clamp(0.0, 1.0);
    let volatility_risk = 0.3;
    ((concentration_risk * 0.6 + volatility_risk * 0.4) * 100.0).min(100.0)
}

fn loss_percentile(losses: &[f64], confidence: f64) -> f64 {
    math::percentile(losses, confidence * 100.0).max(0.0)
}

fn expected_shortfall(losses: &[f64], var_threshold: f64) -> f64 {
    let tail: Vec<f64> = losses.iter().cloned().filter(|l| *l >= var_threshold).collect();
    if tail.is_empty() {
        return var_threshold.max(0.0);
    }
    math::mean(&tail).max(0.0)
}

/// Plain-text recommendations derived from metric thresholds and the user's
/// risk tolerance.
pub fn risk_recommendations(metrics: &PortfolioRiskMetrics, risk_tolerance: f64) -> Vec<String> {
    let mut recommendations = Vec::new();

    if metrics.volatility > 0.3 {
        recommendations.push(
            "Consider reducing portfolio volatility by adding stable assets like USDC".to_string(),
        );
    }
    if metrics.var_95 > 1000.0 {
        recommendations
            .push("Portfolio has high Value at Risk. Consider diversifying holdings".to_string());
    }
    if metrics.sharpe_ratio < 1.0 {
        recommendations.push("Portfolio risk-adjusted returns could be improved".to_string());
    }
    if metrics.beta > 1.2 {
        recommendations
            .push("Portfolio is highly correlated with market movements".to_string());
    }
    if metrics.risk_score > risk_tolerance * 100.0 {
        recommendations.push("Current risk level exceeds your risk tolerance".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("Portfolio risk profile looks balanced".to_string());
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn snapshot(code: &str, value: f64, allocation: f64, volatility: f64) -> AssetSnapshot {
        AssetSnapshot {
            asset_code: code.to_string(),
            asset_issuer: None,
            balance: value,
            price_usd: 1.0,
            value_usd: value,
            allocation,
            volatility,
            beta: default_beta(code),
            correlation_xlm: default_correlation(code),
        }
    }

    fn flat_history(price: f64, points: usize) -> Vec<PricePoint> {
        let start = Utc::now() - Duration::hours(points as i64);
        (0..points)
            .map(|i| PricePoint::new(start + Duration::hours(i as i64), price))
            .collect()
    }

    #[test]
    fn test_annualized_volatility_flat_series_is_zero() {
        let history = flat_history(1.0, 48);
        assert_eq!(annualized_volatility(&history), 0.0);
    }

    #[test]
    fn test_annualized_volatility_short_series_defaults() {
        assert_eq!(annualized_volatility(&flat_history(1.0, 1)), DEFAULT_VOLATILITY);
    }

    #[test]
    fn test_annualized_volatility_is_capped() {
        let start = Utc::now();
        let history: Vec<PricePoint> = (0..50)
            .map(|i| {
                let price = if i % 2 == 0 { 1.0 } else { 10.0 };
                PricePoint::new(start + Duration::hours(i), price)
            })
            .collect();
        assert_eq!(annualized_volatility(&history), VOLATILITY_CAP);
    }

    #[test]
    fn test_portfolio_volatility_single_asset() {
        let engine = RiskEngine::new(1000);
        let assets = vec![snapshot("XLM", 100.0, 1.0, 0.25)];
        assert_eq!(engine.portfolio_volatility(&assets), 0.25);
    }

    #[test]
    fn test_portfolio_volatility_diversification_reduces_risk() {
        let engine = RiskEngine::new(1000);
        let concentrated = vec![snapshot("XLM", 100.0, 1.0, 0.25)];
        let diversified = vec![
            snapshot("XLM", 50.0, 0.5, 0.25),
            snapshot("USDC", 50.0, 0.5, 0.25),
        ];
        assert!(
            engine.portfolio_volatility(&diversified) < engine.portfolio_volatility(&concentrated)
        );
    }

    #[test]
    fn test_parametric_var_confidence_ordering() {
        let engine = RiskEngine::new(1000);
        let var_95 = engine.parametric_var(10_000.0, 0.25, 0.95);
        let var_99 = engine.parametric_var(10_000.0, 0.25, 0.99);
        assert!(var_99 > var_95);
        assert!(var_95 > 0.0);
    }

    #[test]
    fn test_analyze_empty_portfolio() {
        let engine = RiskEngine::new(1000);
        let metrics = engine.analyze(&[]);
        assert_eq!(metrics.portfolio_value, 0.0);
        assert_eq!(metrics.risk_score, 0.0);
    }

    #[test]
    fn test_analyze_full_metrics() {
        let engine = RiskEngine::new(5000);
        let assets = vec![
            snapshot("XLM", 600.0, 0.6, 0.25),
            snapshot("USDC", 400.0, 0.4, 0.01),
        ];
        let metrics = engine.analyze(&assets);

        assert_eq!(metrics.portfolio_value, 1000.0);
        assert!(metrics.volatility > 0.0);
        assert!(metrics.var_99 >= metrics.var_95);
        assert!(metrics.cvar_95 >= metrics.var_95);
        assert!(metrics.risk_score >= 0.0 && metrics.risk_score <= 100.0);
        assert!(metrics.max_drawdown <= 0.8);
        // Portfolio beta is the allocation-weighted sum of defaults.
        let expected_beta = 0.6 * 1.0 + 0.4 * 0.1;
        assert!((metrics.beta - expected_beta).abs() < 1e-9);
    }

    #[test]
    fn test_asset_beta_stable_fallbacks() {
        assert_eq!(asset_beta("XLM", &[], &[]), 1.0);
        assert_eq!(asset_beta("USDC", &[0.1; 3], &[0.1; 3]), 0.1);
        assert_eq!(asset_beta("UNKNOWN", &[], &[]), 0.7);
    }

    #[test]
    fn test_asset_beta_tracks_market() {
        // Asset moves exactly 2x the market: beta 2.
        let market: Vec<f64> = (0..30).map(|i| ((i % 5) as f64 - 2.0) * 0.01).collect();
        let asset: Vec<f64> = market.iter().map(|m| m * 2.0).collect();
        let beta = asset_beta("BTC", &asset, &market);
        assert!((beta - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_asset_correlation_defaults_and_identity() {
        assert_eq!(asset_correlation_xlm("XLM", &[], &[]), 1.0);
        assert_eq!(asset_correlation_xlm("BTC", &[0.1], &[0.1]), 0.7);
        let series: Vec<f64> = (0..30).map(|i| (i as f64 * 0.37).sin() * 0.02).collect();
        let corr = asset_correlation_xlm("BTC", &series, &series);
        assert!((corr - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tail_risk_bounds() {
        assert_eq!(tail_risk(&[]), 0.5);
        let assets = vec![snapshot("XLM", 100.0, 1.0, 2.0)];
        assert_eq!(tail_risk(&assets), 1.0);
    }

    #[test]
    fn test_composite_risk_score_bounds() {
        assert_eq!(composite_risk_score(10.0, 1e9, 1.0, 0.0, 1.0), 100.0);
        let low = composite_risk_score(0.01, 10.0, 0.02, 5.0, 0.05);
        assert!(low > 0.0 && low < 30.0);
    }

    #[test]
    fn test_simple_risk_score() {
        assert_eq!(simple_risk_score(&[]), 0.0);
        let concentrated = simple_risk_score(&[1.0]);
        let spread = simple_risk_score(&[0.25, 0.25, 0.25, 0.25]);
        assert!(concentrated > spread);
        assert!(concentrated <= 100.0);
    }

    #[test]
    fn test_recommendations_balanced_portfolio() {
        let mut metrics = PortfolioRiskMetrics::empty();
        metrics.sharpe_ratio = 1.5;
        let recs = risk_recommendations(&metrics, 0.9);
        assert_eq!(recs, vec!["Portfolio risk profile looks balanced".to_string()]);
    }

    #[test]
    fn test_recommendations_flag_high_risk() {
        let metrics = PortfolioRiskMetrics {
            portfolio_value: 10_000.0,
            var_95: 2000.0,
            var_99: 3000.0,
            cvar_95: 2500.0,
            volatility: 0.5,
            sharpe_ratio: 0.2,
            sortino_ratio: 0.3,
            beta: 1.5,
            max_drawdown: 0.8,
            risk_score: 90.0,
            diversification_ratio: 1.0,
            tail_risk: 0.9,
        };
        let recs = risk_recommendations(&metrics, 0.5);
        assert!(recs.len() >= 4);
        assert!(recs.iter().any(|r| r.contains("risk tolerance")));
    }
}

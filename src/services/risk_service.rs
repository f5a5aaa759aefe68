use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::RiskSettings;
use crate::error::AppError;
use crate::models::{PortfolioAsset, PriceHistory, RiskMetricsRecord};
use crate::services::alert_service::AlertService;
use crate::services::analyzer::{
    self, AnomalyReport, PortfolioAnalyzer, PricePrediction, Recommendation,
};
use crate::services::oracle::PriceFeed;
use crate::services::portfolio_service::PortfolioService;
use crate::services::risk_engine::{self, AssetSnapshot, PortfolioRiskMetrics, RiskEngine};
use crate::utils::math;

#[derive(Debug, Serialize)]
pub struct RiskAnalysis {
    pub wallet_address: String,
    pub metrics: PortfolioRiskMetrics,
    pub recommendations: Vec<String>,
    pub alerts_raised: usize,
}

#[derive(Debug, Serialize)]
pub struct AiAnalysis {
    pub wallet_address: String,
    pub metrics: PortfolioRiskMetrics,
    pub predictions: Vec<PricePrediction>,
    pub anomaly_summary: HashMap<String, f64>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
pub struct MetricsHistory {
    pub latest: RiskMetricsRecord,
    pub history: Vec<RiskMetricsRecord>,
}

#[derive(Clone)]
pub struct RiskService {
    pool: PgPool,
    portfolio: PortfolioService,
    price_feed: Arc<PriceFeed>,
    alerts: AlertService,
    settings: RiskSettings,
}

impl RiskService {
    pub fn new(
        pool: PgPool,
        portfolio: PortfolioService,
        price_feed: Arc<PriceFeed>,
        alerts: AlertService,
        settings: RiskSettings,
    ) -> Self {
        Self {
            pool,
            portfolio,
            price_feed,
            alerts,
            settings,
        }
    }

    /// Full portfolio risk analysis. Persists a metrics snapshot and raises
    /// threshold alerts as a side effect.
    pub async fn analyze(&self, wallet_address: &str) -> Result<RiskAnalysis, AppError> {
        let user = self.portfolio.find_user(wallet_address).await?;
        let assets = self.portfolio.owned_assets(user.id).await?;
        if assets.is_empty() {
            return Err(AppError::ValidationError(
                "Portfolio has no owned assets to analyze".to_string(),
            ));
        }

        let snapshots = self.enrich(&assets).await;
        self.record_prices(&snapshots).await?;
        let engine = RiskEngine::new(self.settings.monte_carlo_simulations);
        let mut metrics = engine.analyze(&snapshots);

        // This endpoint reports closed-form VaR for stable, repeatable
        // figures. The simulated path stays on the AI analysis route.
        metrics.var_95 = engine.parametric_var(
            metrics.portfolio_value,
            metrics.volatility,
            self.settings.var_confidence_level,
        );
        metrics.var_99 = engine.parametric_var(metrics.portfolio_value, metrics.volatility, 0.99);

        let record = RiskMetricsRecord::new(
            user.id,
            metrics.portfolio_value,
            metrics.var_95,
            metrics.var_99,
            metrics.volatility,
            Some(metrics.sharpe_ratio),
            Some(metrics.beta),
            Some(metrics.max_drawdown),
        );
        self.persist_metrics(&record).await?;

        let raised = self.alerts.raise_threshold_alerts(&user, &metrics).await?;
        let recommendations = risk_engine::risk_recommendations(&metrics, user.risk_tolerance);

        info!(
            "Risk analysis for {}: score {:.1}, {} alerts raised",
            wallet_address,
            metrics.risk_score,
            raised.len()
        );

        Ok(RiskAnalysis {
            wallet_address: user.wallet_address,
            metrics,
            recommendations,
            alerts_raised: raised.len(),
        })
    }

    /// Monte Carlo metrics plus per-asset price predictions and anomaly
    /// rates.
    pub async fn ai_analysis(&self, wallet_address: &str) -> Result<AiAnalysis, AppError> {
        let user = self.portfolio.find_user(wallet_address).await?;
        let assets = self.portfolio.owned_assets(user.id).await?;
        if assets.is_empty() {
            return Err(AppError::ValidationError(
                "Portfolio has no owned assets to analyze".to_string(),
            ));
        }

        let snapshots = self.enrich(&assets).await;
        let engine = RiskEngine::new(self.settings.monte_carlo_simulations);
        let metrics = engine.analyze(&snapshots);

        let analyzer = PortfolioAnalyzer::new(self.settings.anomaly_contamination);
        let histories = join_all(assets.iter().map(|asset| {
            self.price_feed
                .history(&asset.asset_code, asset.asset_issuer.as_deref())
        }))
        .await;

        let mut predictions = Vec::with_capacity(assets.len());
        let mut anomaly_summary = HashMap::new();
        for (asset, history) in assets.iter().zip(histories.iter()) {
            predictions.push(analyzer.predict_price(&asset.asset_code, history));
            let report = analyzer.detect_anomalies(&asset.asset_code, history);
            anomaly_summary.insert(asset.asset_code.clone(), report.anomaly_rate);
        }

        let recommendations =
            analyzer::generate_recommendations(&metrics, &snapshots, &predictions);

        Ok(AiAnalysis {
            wallet_address: user.wallet_address,
            metrics,
            predictions,
            anomaly_summary,
            recommendations,
        })
    }

    /// Anomaly detection across every owned asset's price history.
    pub async fn anomalies(&self, wallet_address: &str) -> Result<Vec<AnomalyReport>, AppError> {
        let user = self.portfolio.find_user(wallet_address).await?;
        let assets = self.portfolio.owned_assets(user.id).await?;

        let analyzer = PortfolioAnalyzer::new(self.settings.anomaly_contamination);
        let histories = join_all(assets.iter().map(|asset| {
            self.price_feed
                .history(&asset.asset_code, asset.asset_issuer.as_deref())
        }))
        .await;

        let reports = assets
            .iter()
            .zip(histories.iter())
            .map(|(asset, history)| analyzer.detect_anomalies(&asset.asset_code, history))
            .collect();
        Ok(reports)
    }

    /// Anomaly detection over explicit asset codes, without requiring a
    /// registered wallet.
    pub async fn anomalies_for_assets(
        &self,
        asset_codes: &[String],
    ) -> Result<Vec<AnomalyReport>, AppError> {
        let analyzer = PortfolioAnalyzer::new(self.settings.anomaly_contamination);
        let histories = join_all(
            asset_codes
                .iter()
                .map(|code| self.price_feed.history(code, None)),
        )
        .await;

        let reports = asset_codes
            .iter()
            .zip(histories.iter())
            .map(|(code, history)| analyzer.detect_anomalies(code, history))
            .collect();
        Ok(reports)
    }

    /// Latest stored metrics plus up to `limit` historical snapshots.
    pub async fn metrics_history(
        &self,
        wallet_address: &str,
        limit: i64,
    ) -> Result<MetricsHistory, AppError> {
        let user = self.portfolio.find_user(wallet_address).await?;
        let history = sqlx::query_as::<_, RiskMetricsRecord>(
            "SELECT * FROM risk_metrics
             WHERE user_id = $1
             ORDER BY calculated_at DESC
             LIMIT $2",
        )
        .bind(user.id)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;

        let latest = history.first().cloned().ok_or_else(|| {
            AppError::NotFound(format!("No risk metrics found for {}", wallet_address))
        })?;

        Ok(MetricsHistory {
            latest,
            history,
        })
    }

    /// Builds market-data snapshots: live price, historical volatility, and
    /// beta/correlation against XLM as the market proxy.
    pub async fn enrich(&self, assets: &[PortfolioAsset]) -> Vec<AssetSnapshot> {
        let xlm_history = self.price_feed.history("XLM", None).await;
        let xlm_prices: Vec<f64> = xlm_history.iter().map(|p| p.price).collect();
        let xlm_returns = math::log_returns(&xlm_prices);

        let mut snapshots = Vec::with_capacity(assets.len());
        for asset in assets {
            let price = self
                .price_feed
                .price(&asset.asset_code, asset.asset_issuer.as_deref())
                .await;
            let history = self
                .price_feed
                .history(&asset.asset_code, asset.asset_issuer.as_deref())
                .await;

            let volatility = if history.len() >= 2 {
                risk_engine::annualized_volatility(&history)
            } else {
                warn!("No history for {}, using default volatility", asset.asset_code);
                risk_engine::default_volatility(&asset.asset_code)
            };

            let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
            let returns = math::log_returns(&prices);
            let beta = risk_engine::asset_beta(&asset.asset_code, &returns, &xlm_returns);
            let correlation_xlm =
                risk_engine::asset_correlation_xlm(&asset.asset_code, &returns, &xlm_returns);

            snapshots.push(AssetSnapshot {
                asset_code: asset.asset_code.clone(),
                asset_issuer: asset.asset_issuer.clone(),
                balance: asset.balance,
                price_usd: price,
                value_usd: asset.value_usd(price),
                allocation: 0.0,
                volatility,
                beta,
                correlation_xlm,
            });
        }

        let total_value: f64 = snapshots.iter().map(|s| s.value_usd).sum();
        if total_value > 0.0 {
            for snapshot in &mut snapshots {
                snapshot.allocation = snapshot.value_usd / total_value;
            }
        }
        snapshots
    }

    /// Stores the prices seen during analysis so the dashboard can chart
    /// its own observations alongside oracle history.
    async fn record_prices(&self, snapshots: &[AssetSnapshot]) -> Result<(), AppError> {
        for snapshot in snapshots {
            let record = PriceHistory {
                id: uuid::Uuid::new_v4(),
                asset_code: snapshot.asset_code.clone(),
                asset_issuer: snapshot.asset_issuer.clone(),
                price_usd: snapshot.price_usd,
                source: "reflector".to_string(),
                timestamp: chrono::Utc::now(),
            };
            sqlx::query(
                "INSERT INTO price_history (id, asset_code, asset_issuer, price_usd, source, timestamp)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(record.id)
            .bind(&record.asset_code)
            .bind(&record.asset_issuer)
            .bind(record.price_usd)
            .bind(&record.source)
            .bind(record.timestamp)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn persist_metrics(&self, record: &RiskMetricsRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO risk_metrics
             (id, user_id, portfolio_value, var_95, var_99, volatility,
              sharpe_ratio, beta, max_drawdown, calculated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.portfolio_value)
        .bind(record.var_95)
        .bind(record.var_99)
        .bind(record.volatility)
        .bind(record.sharpe_ratio)
        .bind(record.beta)
        .bind(record.max_drawdown)
        .bind(record.calculated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

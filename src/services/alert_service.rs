use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CreateAlert, RiskAlert, User};
use crate::services::risk_engine::PortfolioRiskMetrics;

pub const ALERT_TYPES: &[&str] = &[
    "high_volatility",
    "var_breach",
    "concentration",
    "price_anomaly",
    "rebalance_needed",
    "custom",
];
pub const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];

const LIST_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct AlertStats {
    pub total: i64,
    pub active: i64,
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub by_type: HashMap<String, i64>,
}

#[derive(Clone)]
pub struct AlertService {
    pool: PgPool,
}

impl AlertService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        active_only: bool,
        severity: Option<&str>,
    ) -> Result<Vec<RiskAlert>, AppError> {
        let alerts = sqlx::query_as::<_, RiskAlert>(
            "SELECT * FROM risk_alerts
             WHERE user_id = $1
               AND ($2 = false OR is_active = true)
               AND ($3::text IS NULL OR severity = $3)
             ORDER BY triggered_at DESC
             LIMIT $4",
        )
        .bind(user_id)
        .bind(active_only)
        .bind(severity)
        .bind(LIST_LIMIT)
        .fetch_all(&self.pool)
        .await?;
        Ok(alerts)
    }

    pub async fn create(&self, user: &User, payload: CreateAlert) -> Result<RiskAlert, AppError> {
        if !ALERT_TYPES.contains(&payload.alert_type.as_str()) {
            return Err(AppError::AlertError(format!(
                "Unknown alert type: {}",
                payload.alert_type
            )));
        }
        if !SEVERITIES.contains(&payload.severity.as_str()) {
            return Err(AppError::AlertError(format!(
                "Unknown severity: {}",
                payload.severity
            )));
        }
        if payload.message.trim().is_empty() {
            return Err(AppError::AlertError("Alert message is required".to_string()));
        }

        let alert = RiskAlert::new(user.id, payload);
        self.insert(&alert).await?;
        Ok(alert)
    }

    pub async fn resolve(&self, user_id: Uuid, alert_id: Uuid) -> Result<RiskAlert, AppError> {
        sqlx::query_as::<_, RiskAlert>(
            "UPDATE risk_alerts
             SET is_active = false, resolved_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING *",
        )
        .bind(alert_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert not found: {}", alert_id)))
    }

    pub async fn delete(&self, user_id: Uuid, alert_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM risk_alerts WHERE id = $1 AND user_id = $2")
            .bind(alert_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Alert not found: {}", alert_id)));
        }
        Ok(())
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<AlertStats, AppError> {
        let row: (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE is_active),
                    COUNT(*) FILTER (WHERE is_active AND severity = 'critical'),
                    COUNT(*) FILTER (WHERE is_active AND severity = 'high'),
                    COUNT(*) FILTER (WHERE is_active AND severity = 'medium'),
                    COUNT(*) FILTER (WHERE is_active AND severity = 'low')
             FROM risk_alerts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let type_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT alert_type, COUNT(*) FROM risk_alerts
             WHERE user_id = $1
             GROUP BY alert_type",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(AlertStats {
            total: row.0,
            active: row.1,
            critical: row.2,
            high: row.3,
            medium: row.4,
            low: row.5,
            by_type: type_rows.into_iter().collect(),
        })
    }

    /// Welcome alerts for a freshly registered wallet so the alerts panel
    /// has content before any analysis has run.
    pub async fn seed_sample_alerts(&self, user_id: Uuid) -> Result<(), AppError> {
        let samples = [
            RiskAlert::new(
                user_id,
                CreateAlert {
                    alert_type: "custom".to_string(),
                    severity: "low".to_string(),
                    message: "Welcome! Run a risk analysis to see your portfolio profile"
                        .to_string(),
                    asset_id: None,
                },
            ),
            RiskAlert::new(
                user_id,
                CreateAlert {
                    alert_type: "rebalance_needed".to_string(),
                    severity: "medium".to_string(),
                    message: "Set target allocations to enable rebalancing suggestions"
                        .to_string(),
                    asset_id: None,
                },
            ),
        ];
        for alert in &samples {
            self.insert(alert).await?;
        }
        Ok(())
    }

    /// Raises threshold alerts from a fresh set of risk metrics. Skips
    /// types that already have an active alert so repeated analyses do not
    /// spam the panel.
    pub async fn raise_threshold_alerts(
        &self,
        user: &User,
        metrics: &PortfolioRiskMetrics,
    ) -> Result<Vec<RiskAlert>, AppError> {
        let mut candidates = Vec::new();
        if metrics.volatility > 0.4 {
            candidates.push((
                "high_volatility",
                "high",
                format!(
                    "Portfolio volatility at {:.1}% exceeds the 40% threshold",
                    metrics.volatility * 100.0
                ),
            ));
        }
        if metrics.portfolio_value > 0.0 && metrics.var_95 > metrics.portfolio_value * 0.15 {
            candidates.push((
                "var_breach",
                "critical",
                format!(
                    "Daily VaR of ${:.2} is more than 15% of portfolio value",
                    metrics.var_95
                ),
            ));
        }
        if metrics.tail_risk > 0.7 {
            candidates.push((
                "concentration",
                "medium",
                "Portfolio is concentrated in volatile assets".to_string(),
            ));
        }
        if metrics.risk_score > user.risk_tolerance * 100.0 {
            candidates.push((
                "custom",
                "high",
                format!(
                    "Risk score {:.0} exceeds your tolerance of {:.0}",
                    metrics.risk_score,
                    user.risk_tolerance * 100.0
                ),
            ));
        }

        let mut raised = Vec::new();
        for (alert_type, severity, message) in candidates {
            let duplicate: Option<(Uuid,)> = sqlx::query_as(
                "SELECT id FROM risk_alerts
                 WHERE user_id = $1 AND alert_type = $2 AND is_active = true
                 LIMIT 1",
            )
            .bind(user.id)
            .bind(alert_type)
            .fetch_optional(&self.pool)
            .await?;
            if duplicate.is_some() {
                continue;
            }

            let alert = RiskAlert::new(
                user.id,
                CreateAlert {
                    alert_type: alert_type.to_string(),
                    severity: severity.to_string(),
                    message,
                    asset_id: None,
                },
            );
            self.insert(&alert).await?;
            raised.push(alert);
        }

        if !raised.is_empty() {
            info!("Raised {} risk alerts for user {}", raised.len(), user.id);
        }
        Ok(raised)
    }

    async fn insert(&self, alert: &RiskAlert) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO risk_alerts
             (id, user_id, asset_id, alert_type, severity, message,
              triggered_at, resolved_at, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(alert.id)
        .bind(alert.user_id)
        .bind(alert.asset_id)
        .bind(&alert.alert_type)
        .bind(&alert.severity)
        .bind(&alert.message)
        .bind(alert.triggered_at)
        .bind(alert.resolved_at)
        .bind(alert.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

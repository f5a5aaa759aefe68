use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Lifecycle status of a portfolio holding. Owned assets are hidden rather
/// than deleted so wallet sync can resurrect them.
pub const STATUS_OWNED: &str = "owned";
pub const STATUS_PLANNED: &str = "planned";
pub const STATUS_HIDDEN: &str = "hidden";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PortfolioAsset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub asset_code: String,
    pub asset_issuer: Option<String>,
    pub balance: f64,
    pub target_allocation: f64,
    pub status: String,
    pub notes: Option<String>,
    pub target_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAsset {
    pub asset_code: String,
    pub asset_issuer: Option<String>,
    pub balance: f64,
    pub target_allocation: f64,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub target_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAsset {
    pub balance: Option<f64>,
    pub target_allocation: Option<f64>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub target_date: Option<DateTime<Utc>>,
}

impl PortfolioAsset {
    pub fn new(user_id: Uuid, create_asset: CreateAsset) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            asset_code: create_asset.asset_code,
            asset_issuer: create_asset.asset_issuer,
            balance: create_asset.balance,
            target_allocation: create_asset.target_allocation,
            status: create_asset.status.unwrap_or_else(|| STATUS_OWNED.to_string()),
            notes: create_asset.notes,
            target_date: create_asset.target_date,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn value_usd(&self, price_usd: f64) -> f64 {
        self.balance * price_usd
    }
}

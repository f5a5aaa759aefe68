use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CreateAsset, CreateUser, PortfolioAsset, PricePoint, UpdateAsset, User, STATUS_HIDDEN,
    STATUS_OWNED, STATUS_PLANNED,
};
use crate::services::horizon::{demo_assets, HorizonClient};
use crate::services::oracle::PriceFeed;
use crate::services::risk_engine;
use crate::utils::validation;

/// One holding as the dashboard displays it, enriched with live pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPosition {
    pub id: Uuid,
    pub asset_code: String,
    pub asset_issuer: Option<String>,
    pub balance: f64,
    pub price_usd: f64,
    pub value_usd: f64,
    pub allocation: f64,
    pub target_allocation: f64,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub wallet_address: String,
    pub risk_tolerance: f64,
    pub total_value: f64,
    pub asset_count: usize,
    pub risk_score: f64,
    pub assets: Vec<PortfolioPosition>,
}

#[derive(Debug, Serialize)]
pub struct UserCreated {
    pub user: User,
    pub assets_discovered: usize,
    /// False when the wallet was already registered and the existing user
    /// is returned unchanged.
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncResult {
    pub assets_added: usize,
    pub assets_updated: usize,
    pub assets_zeroed: usize,
}

#[derive(Debug, Serialize)]
pub struct AssetDetail {
    pub asset: PortfolioAsset,
    pub price_usd: f64,
    pub value_usd: f64,
    pub price_change_7d: f64,
    pub history: Vec<PricePoint>,
}

#[derive(Clone)]
pub struct PortfolioService {
    pool: PgPool,
    price_feed: Arc<PriceFeed>,
    horizon: Arc<HorizonClient>,
}

impl PortfolioService {
    pub fn new(pool: PgPool, price_feed: Arc<PriceFeed>, horizon: Arc<HorizonClient>) -> Self {
        Self {
            pool,
            price_feed,
            horizon,
        }
    }

    /// Registers a wallet and seeds its portfolio from on-chain balances.
    /// Unfunded or unreachable accounts get demo holdings so the dashboard
    /// is never empty on first load.
    pub async fn create_user(&self, payload: CreateUser) -> Result<UserCreated, AppError> {
        if !validation::is_valid_wallet_address(&payload.wallet_address) {
            return Err(AppError::ValidationError(
                "Invalid Stellar wallet address".to_string(),
            ));
        }
        if let Some(tolerance) = payload.risk_tolerance {
            if !(0.0..=1.0).contains(&tolerance) {
                return Err(AppError::ValidationError(
                    "risk_tolerance must be between 0.0 and 1.0".to_string(),
                ));
            }
        }

        // Registration is idempotent: posting a known wallet returns the
        // existing user untouched.
        let existing = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE wallet_address = $1",
        )
        .bind(&payload.wallet_address)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(user) = existing {
            return Ok(UserCreated {
                user,
                assets_discovered: 0,
                created: false,
            });
        }

        let user = User::new(payload);
        sqlx::query(
            "INSERT INTO users (id, wallet_address, risk_tolerance, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.wallet_address)
        .bind(user.risk_tolerance)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        let mut discovered = self.horizon.account_balances(&user.wallet_address).await;
        if discovered.is_empty() {
            warn!(
                "No balances found for {}, seeding demo holdings",
                user.wallet_address
            );
            discovered = demo_assets();
        }

        let mut inserted = 0;
        for asset in &discovered {
            let created = CreateAsset {
                asset_code: asset.asset_code.clone(),
                asset_issuer: asset.asset_issuer.clone(),
                balance: asset.balance,
                target_allocation: 0.0,
                status: Some(STATUS_OWNED.to_string()),
                notes: None,
                target_date: None,
            };
            self.insert_asset(user.id, created).await?;
            inserted += 1;
        }

        info!(
            "Registered wallet {} with {} assets",
            user.wallet_address, inserted
        );
        Ok(UserCreated {
            user,
            assets_discovered: inserted,
            created: true,
        })
    }

    pub async fn find_user(&self, wallet_address: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE wallet_address = $1")
            .bind(wallet_address)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {}", wallet_address)))
    }

    /// Current portfolio with live prices and allocations.
    pub async fn portfolio(&self, wallet_address: &str) -> Result<PortfolioOverview, AppError> {
        let user = self.find_user(wallet_address).await?;
        let assets = self.visible_assets(user.id).await?;

        let mut positions = Vec::with_capacity(assets.len());
        for asset in &assets {
            let price = self
                .price_feed
                .price(&asset.asset_code, asset.asset_issuer.as_deref())
                .await;
            positions.push(PortfolioPosition {
                id: asset.id,
                asset_code: asset.asset_code.clone(),
                asset_issuer: asset.asset_issuer.clone(),
                balance: asset.balance,
                price_usd: price,
                value_usd: asset.value_usd(price),
                allocation: 0.0,
                target_allocation: asset.target_allocation,
                status: asset.status.clone(),
                notes: asset.notes.clone(),
            });
        }

        let total_value: f64 = positions.iter().map(|p| p.value_usd).sum();
        if total_value > 0.0 {
            for position in &mut positions {
                position.allocation = position.value_usd / total_value;
            }
        }

        let allocations: Vec<f64> = positions
            .iter()
            .filter(|p| p.status == STATUS_OWNED)
            .map(|p| p.allocation)
            .collect();
        let risk_score = risk_engine::simple_risk_score(&allocations);

        Ok(PortfolioOverview {
            wallet_address: user.wallet_address,
            risk_tolerance: user.risk_tolerance,
            total_value,
            asset_count: positions.len(),
            risk_score,
            assets: positions,
        })
    }

    /// Adds a holding, or revives and updates an existing row for the same
    /// asset (including hidden ones).
    pub async fn add_asset(
        &self,
        wallet_address: &str,
        payload: CreateAsset,
    ) -> Result<PortfolioAsset, AppError> {
        if !validation::is_valid_asset(&payload.asset_code, payload.asset_issuer.as_deref()) {
            return Err(AppError::ValidationError(format!(
                "Invalid asset: {}",
                payload.asset_code
            )));
        }
        if payload.balance < 0.0 {
            return Err(AppError::ValidationError(
                "Balance cannot be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&payload.target_allocation) {
            return Err(AppError::ValidationError(
                "target_allocation must be between 0.0 and 1.0".to_string(),
            ));
        }
        if let Some(status) = payload.status.as_deref() {
            if ![STATUS_OWNED, STATUS_PLANNED].contains(&status) {
                return Err(AppError::ValidationError(format!(
                    "Unsupported asset status: {}",
                    status
                )));
            }
        }

        let user = self.find_user(wallet_address).await?;
        let existing = self
            .find_asset_by_code(user.id, &payload.asset_code, payload.asset_issuer.as_deref())
            .await?;

        match existing {
            Some(asset) => {
                let status = payload
                    .status
                    .clone()
                    .unwrap_or_else(|| STATUS_OWNED.to_string());
                let updated = sqlx::query_as::<_, PortfolioAsset>(
                    "UPDATE portfolio_assets
                     SET balance = $1, target_allocation = $2, status = $3,
                         notes = COALESCE($4, notes), target_date = $5, updated_at = NOW()
                     WHERE id = $6
                     RETURNING *",
                )
                .bind(payload.balance)
                .bind(payload.target_allocation)
                .bind(&status)
                .bind(&payload.notes)
                .bind(payload.target_date)
                .bind(asset.id)
                .fetch_one(&self.pool)
                .await?;
                Ok(updated)
            }
            None => self.insert_asset(user.id, payload).await,
        }
    }

    pub async fn update_asset(
        &self,
        wallet_address: &str,
        asset_id: Uuid,
        payload: UpdateAsset,
    ) -> Result<PortfolioAsset, AppError> {
        if let Some(balance) = payload.balance {
            if balance < 0.0 {
                return Err(AppError::ValidationError(
                    "Balance cannot be negative".to_string(),
                ));
            }
        }
        if let Some(target) = payload.target_allocation {
            if !(0.0..=1.0).contains(&target) {
                return Err(AppError::ValidationError(
                    "target_allocation must be between 0.0 and 1.0".to_string(),
                ));
            }
        }
        if let Some(status) = payload.status.as_deref() {
            if ![STATUS_OWNED, STATUS_PLANNED, STATUS_HIDDEN].contains(&status) {
                return Err(AppError::ValidationError(format!(
                    "Unsupported asset status: {}",
                    status
                )));
            }
        }

        let user = self.find_user(wallet_address).await?;
        let asset = self.find_asset(user.id, asset_id).await?;

        let updated = sqlx::query_as::<_, PortfolioAsset>(
            "UPDATE portfolio_assets
             SET balance = COALESCE($1, balance),
                 target_allocation = COALESCE($2, target_allocation),
                 status = COALESCE($3, status),
                 notes = COALESCE($4, notes),
                 target_date = COALESCE($5, target_date),
                 updated_at = NOW()
             WHERE id = $6
             RETURNING *",
        )
        .bind(payload.balance)
        .bind(payload.target_allocation)
        .bind(&payload.status)
        .bind(&payload.notes)
        .bind(payload.target_date)
        .bind(asset.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    /// Planned assets are deleted outright. Owned assets are hidden so the
    /// next wallet sync can bring them back.
    pub async fn remove_asset(
        &self,
        wallet_address: &str,
        asset_id: Uuid,
    ) -> Result<String, AppError> {
        let user = self.find_user(wallet_address).await?;
        let asset = self.find_asset(user.id, asset_id).await?;

        if asset.status == STATUS_PLANNED {
            sqlx::query("DELETE FROM portfolio_assets WHERE id = $1")
                .bind(asset.id)
                .execute(&self.pool)
                .await?;
            Ok(format!("Removed planned asset {}", asset.asset_code))
        } else {
            sqlx::query(
                "UPDATE portfolio_assets SET status = $1, updated_at = NOW() WHERE id = $2",
            )
            .bind(STATUS_HIDDEN)
            .bind(asset.id)
            .execute(&self.pool)
            .await?;
            Ok(format!("Hidden asset {}", asset.asset_code))
        }
    }

    /// Re-reads on-chain balances and reconciles the stored portfolio:
    /// new assets are added, known ones updated, and holdings no longer in
    /// the wallet are zeroed out.
    pub async fn sync_assets(&self, wallet_address: &str) -> Result<SyncResult, AppError> {
        let user = self.find_user(wallet_address).await?;
        let discovered = self.horizon.account_balances(wallet_address).await;
        if discovered.is_empty() {
            return Err(AppError::ValidationError(
                "No balances found on the network for this wallet".to_string(),
            ));
        }

        let stored = sqlx::query_as::<_, PortfolioAsset>(
            "SELECT * FROM portfolio_assets WHERE user_id = $1",
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        let mut added = 0;
        let mut updated = 0;
        for asset in &discovered {
            let known = stored.iter().find(|s| {
                s.asset_code == asset.asset_code && s.asset_issuer == asset.asset_issuer
            });
            match known {
                Some(row) => {
                    sqlx::query(
                        "UPDATE portfolio_assets
                         SET balance = $1, status = $2, updated_at = NOW()
                         WHERE id = $3",
                    )
                    .bind(asset.balance)
                    .bind(STATUS_OWNED)
                    .bind(row.id)
                    .execute(&self.pool)
                    .await?;
                    updated += 1;
                }
                None => {
                    let created = CreateAsset {
                        asset_code: asset.asset_code.clone(),
                        asset_issuer: asset.asset_issuer.clone(),
                        balance: asset.balance,
                        target_allocation: 0.0,
                        status: Some(STATUS_OWNED.to_string()),
                        notes: None,
                        target_date: None,
                    };
                    self.insert_asset(user.id, created).await?;
                    added += 1;
                }
            }
        }

        let mut zeroed = 0;
        for row in stored.iter().filter(|s| s.status == STATUS_OWNED) {
            let still_held = discovered.iter().any(|d| {
                d.asset_code == row.asset_code && d.asset_issuer == row.asset_issuer
            });
            if !still_held && row.balance != 0.0 {
                sqlx::query(
                    "UPDATE portfolio_assets SET balance = 0, updated_at = NOW() WHERE id = $1",
                )
                .bind(row.id)
                .execute(&self.pool)
                .await?;
                zeroed += 1;
            }
        }

        info!(
            "Synced wallet {}: {} added, {} updated, {} zeroed",
            wallet_address, added, updated, zeroed
        );
        Ok(SyncResult {
            assets_added: added,
            assets_updated: updated,
            assets_zeroed: zeroed,
        })
    }

    /// Single-asset view with price history for the detail page.
    pub async fn asset_detail(
        &self,
        wallet_address: &str,
        asset_id: Uuid,
    ) -> Result<AssetDetail, AppError> {
        let user = self.find_user(wallet_address).await?;
        let asset = self.find_asset(user.id, asset_id).await?;

        let price = self
            .price_feed
            .price(&asset.asset_code, asset.asset_issuer.as_deref())
            .await;
        let history = self
            .price_feed
            .history(&asset.asset_code, asset.asset_issuer.as_deref())
            .await;

        let price_change_7d = match (history.first(), history.last()) {
            (Some(first), Some(last)) if first.price > 0.0 => {
                (last.price - first.price) / first.price
            }
            _ => 0.0,
        };

        Ok(AssetDetail {
            value_usd: asset.value_usd(price),
            price_usd: price,
            price_change_7d,
            history,
            asset,
        })
    }

    /// Visible holdings (everything except hidden rows) for a user.
    pub async fn visible_assets(&self, user_id: Uuid) -> Result<Vec<PortfolioAsset>, AppError> {
        let assets = sqlx::query_as::<_, PortfolioAsset>(
            "SELECT * FROM portfolio_assets
             WHERE user_id = $1 AND status != $2
             ORDER BY created_at",
        )
        .bind(user_id)
        .bind(STATUS_HIDDEN)
        .fetch_all(&self.pool)
        .await?;
        Ok(assets)
    }

    /// Owned holdings with a positive balance, the set that risk math and
    /// rebalancing operate on.
    pub async fn owned_assets(&self, user_id: Uuid) -> Result<Vec<PortfolioAsset>, AppError> {
        let assets = sqlx::query_as::<_, PortfolioAsset>(
            "SELECT * FROM portfolio_assets
             WHERE user_id = $1 AND status = $2 AND balance > 0
             ORDER BY created_at",
        )
        .bind(user_id)
        .bind(STATUS_OWNED)
        .fetch_all(&self.pool)
        .await?;
        Ok(assets)
    }

    async fn insert_asset(
        &self,
        user_id: Uuid,
        payload: CreateAsset,
    ) -> Result<PortfolioAsset, AppError> {
        let asset = PortfolioAsset::new(user_id, payload);
        sqlx::query(
            "INSERT INTO portfolio_assets
             (id, user_id, asset_code, asset_issuer, balance, target_allocation,
              status, notes, target_date, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(asset.id)
        .bind(asset.user_id)
        .bind(&asset.asset_code)
        .bind(&asset.asset_issuer)
        .bind(asset.balance)
        .bind(asset.target_allocation)
        .bind(&asset.status)
        .bind(&asset.notes)
        .bind(asset.target_date)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(asset)
    }

    async fn find_asset(&self, user_id: Uuid, asset_id: Uuid) -> Result<PortfolioAsset, AppError> {
        sqlx::query_as::<_, PortfolioAsset>(
            "SELECT * FROM portfolio_assets WHERE id = $1 AND user_id = $2",
        )
        .bind(asset_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Asset not found: {}", asset_id)))
    }

    async fn find_asset_by_code(
        &self,
        user_id: Uuid,
        asset_code: &str,
        asset_issuer: Option<&str>,
    ) -> Result<Option<PortfolioAsset>, AppError> {
        let asset = sqlx::query_as::<_, PortfolioAsset>(
            "SELECT * FROM portfolio_assets
             WHERE user_id = $1 AND asset_code = $2
               AND asset_issuer IS NOT DISTINCT FROM $3",
        )
        .bind(user_id)
        .bind(asset_code)
        .bind(asset_issuer)
        .fetch_optional(&self.pool)
        .await?;
        Ok(asset)
    }
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub wallet_address: String,
    pub risk_tolerance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUser {
    pub wallet_address: String,
    pub risk_tolerance: Option<f64>,
}

impl User {
    pub fn new(create_user: CreateUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            wallet_address: create_user.wallet_address,
            risk_tolerance: create_user.risk_tolerance.unwrap_or(0.5),
            created_at: now,
            updated_at: now,
        }
    }
}

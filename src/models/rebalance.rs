use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RebalanceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// JSON snapshot of allocations before the rebalance.
    pub old_allocation: String,
    /// JSON snapshot of the executed orders.
    pub new_allocation: String,
    pub rebalance_type: String,
    pub executed_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl RebalanceRecord {
    pub fn new(
        user_id: Uuid,
        old_allocation: String,
        new_allocation: String,
        rebalance_type: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            old_allocation,
            new_allocation,
            rebalance_type,
            executed_at: Utc::now(),
            success: true,
            error_message: None,
        }
    }
}

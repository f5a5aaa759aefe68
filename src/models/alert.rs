use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RiskAlert {
    pub id: Uuid,
    pub user_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAlert {
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub asset_id: Option<Uuid>,
}

impl RiskAlert {
    pub fn new(user_id: Uuid, create_alert: CreateAlert) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            asset_id: create_alert.asset_id,
            alert_type: create_alert.alert_type,
            severity: create_alert.severity,
            message: create_alert.message,
            triggered_at: Utc::now(),
            resolved_at: None,
            is_active: true,
        }
    }
}

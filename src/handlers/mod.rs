pub mod alerts;
pub mod health;
pub mod portfolio;
pub mod rebalance;
pub mod risk;

use serde::Serialize;

/// Standard envelope for every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

pub use alerts::create_alert_routes;
pub use health::create_health_routes;
pub use portfolio::create_portfolio_routes;
pub use rebalance::create_rebalance_routes;
pub use risk::create_risk_routes;

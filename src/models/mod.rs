pub mod user;
pub mod asset;
pub mod price_history;
pub mod alert;
pub mod risk_metrics;
pub mod rebalance;

pub use user::*;
pub use asset::*;
pub use price_history::*;
pub use alert::*;
pub use risk_metrics::*;
pub use rebalance::*;

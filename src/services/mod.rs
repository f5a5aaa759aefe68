pub mod alert_service;
pub mod analyzer;
pub mod cache;
pub mod horizon;
pub mod oracle;
pub mod portfolio_service;
pub mod rebalance_service;
pub mod risk_engine;
pub mod risk_service;

pub use alert_service::AlertService;
pub use cache::CacheService;
pub use horizon::HorizonClient;
pub use oracle::{PriceFeed, ReflectorClient};
pub use portfolio_service::PortfolioService;
pub use rebalance_service::RebalanceService;
pub use risk_service::RiskService;

use serde::Deserialize;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::config::HorizonSettings;
use crate::services::oracle::OracleError;

/// Asset discovered on a wallet via Horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredAsset {
    pub asset_code: String,
    pub asset_issuer: Option<String>,
    pub balance: f64,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<AccountBalance>,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    balance: String,
    asset_type: String,
    asset_code: Option<String>,
    asset_issuer: Option<String>,
}

/// Minimal Horizon client used for wallet asset discovery and sync.
#[derive(Clone)]
pub struct HorizonClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HorizonClient {
    pub fn new(settings: &HorizonSettings) -> Result<Self, OracleError> {
        let base_url =
            Url::parse(&settings.url).map_err(|e| OracleError::InvalidUrl(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Balances held by a wallet. Unknown or unfunded accounts yield an empty
    /// list rather than an error; callers fall back to demo assets.
    pub async fn account_balances(&self, wallet_address: &str) -> Vec<DiscoveredAsset> {
        let url = match self.base_url.join(&format!("accounts/{}", wallet_address)) {
            Ok(url) => url,
            Err(e) => {
                warn!("Invalid Horizon account URL: {}", e);
                return Vec::new();
            }
        };

        let response = match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(
                    "Horizon lookup for {} returned {}",
                    wallet_address,
                    response.status()
                );
                return Vec::new();
            }
            Err(e) => {
                warn!("Horizon lookup for {} failed: {}", wallet_address, e);
                return Vec::new();
            }
        };

        let account: AccountResponse = match response.json().await {
            Ok(account) => account,
            Err(e) => {
                warn!("Horizon response for {} failed to parse: {}", wallet_address, e);
                return Vec::new();
            }
        };

        account
            .balances
            .into_iter()
            .filter_map(|entry| {
                let balance: f64 = entry.balance.parse().ok()?;
                if balance <= 0.0 {
                    return None;
                }
                if entry.asset_type == "native" {
                    Some(DiscoveredAsset {
                        asset_code: "XLM".to_string(),
                        asset_issuer: None,
                        balance,
                    })
                } else {
                    Some(DiscoveredAsset {
                        asset_code: entry.asset_code?,
                        asset_issuer: entry.asset_issuer,
                        balance,
                    })
                }
            })
            .collect()
    }
}

/// Demo holdings used when discovery finds nothing, so new users see a
/// populated dashboard immediately.
pub fn demo_assets() -> Vec<DiscoveredAsset> {
    vec![
        DiscoveredAsset {
            asset_code: "XLM".to_string(),
            asset_issuer: None,
            balance: 1000.0,
        },
        DiscoveredAsset {
            asset_code: "USDC".to_string(),
            asset_issuer: Some(
                "GA5ZSEJYB37JRC5AVCIA5MOP4RHTM335X2KGX3IHOJAPP5RE34K4KZVN".to_string(),
            ),
            balance: 500.0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_assets() {
        let assets = demo_assets();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].asset_code, "XLM");
        assert!(assets[0].asset_issuer.is_none());
        assert!(assets[1].asset_issuer.is_some());
    }
}

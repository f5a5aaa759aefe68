use std::sync::OnceLock;
use regex::Regex;

static WALLET_ADDRESS_RE: OnceLock<Regex> = OnceLock::new();

fn wallet_address_re() -> &'static Regex {
    // Stellar ed25519 public keys are 56-char base32 strings starting with 'G'.
    WALLET_ADDRESS_RE.get_or_init(|| Regex::new(r"^G[A-Z2-7]{55}$").expect("wallet address regex"))
}

pub fn is_valid_wallet_address(address: &str) -> bool {
    wallet_address_re().is_match(address.trim())
}

/// Asset codes are 1-12 characters; non-native assets must name an issuer.
pub fn is_valid_asset(asset_code: &str, asset_issuer: Option<&str>) -> bool {
    let code = asset_code.trim();
    if code.is_empty() || code.len() > 12 {
        return false;
    }
    if code == "XLM" {
        return true;
    }
    asset_issuer.map(is_valid_wallet_address).unwrap_or(false)
}

/// Composite key used by the oracle layer and cache ("CODE:ISSUER" or
/// "CODE" for native assets).
pub fn asset_id(asset_code: &str, asset_issuer: Option<&str>) -> String {
    match asset_issuer {
        Some(issuer) => format!("{}:{}", asset_code, issuer),
        None => asset_code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_ADDRESS: &str = "GA5ZSEJYB37JRC5AVCIA5MOP4RHTM335X2KGX3IHOJAPP5RE34K4KZVN";

    #[test]
    fn test_wallet_address_validation() {
        assert!(is_valid_wallet_address(VALID_ADDRESS));
        assert!(is_valid_wallet_address(&format!("  {}  ", VALID_ADDRESS)));
        assert!(!is_valid_wallet_address(""));
        assert!(!is_valid_wallet_address("SA5ZSEJYB37JRC5AVCIA5MOP4RHTM335X2KGX3IHOJAPP5RE34K4KZVN"));
        assert!(!is_valid_wallet_address("GA5ZSEJYB37"));
        // '1' is outside the base32 alphabet
        assert!(!is_valid_wallet_address("G1AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"));
    }

    #[test]
    fn test_asset_validation() {
        assert!(is_valid_asset("XLM", None));
        assert!(is_valid_asset("USDC", Some(VALID_ADDRESS)));
        assert!(!is_valid_asset("USDC", None));
        assert!(!is_valid_asset("", None));
        assert!(!is_valid_asset("TOOLONGASSETCODE", Some(VALID_ADDRESS)));
        assert!(!is_valid_asset("USDC", Some("not-an-issuer")));
    }

    #[test]
    fn test_asset_id() {
        assert_eq!(asset_id("XLM", None), "XLM");
        assert_eq!(
            asset_id("USDC", Some(VALID_ADDRESS)),
            format!("USDC:{}", VALID_ADDRESS)
        );
    }
}

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use defi_risk_guardian::config::{CacheSettings, OracleSettings};
use defi_risk_guardian::services::cache::CacheService;
use defi_risk_guardian::services::oracle::{OracleError, PriceFeed, ReflectorClient};

fn oracle_settings(base_url: &str) -> OracleSettings {
    OracleSettings {
        reflector_url: base_url.to_string(),
        reflector_api_key: None,
        timeout_seconds: 5,
    }
}

fn cache_settings() -> CacheSettings {
    CacheSettings {
        price_ttl_seconds: 300,
        history_ttl_seconds: 1800,
        max_entries: 1000,
    }
}

fn price_feed(base_url: &str) -> PriceFeed {
    let settings = cache_settings();
    let cache = CacheService::new(&settings);
    let client = ReflectorClient::new(&oracle_settings(base_url)).unwrap();
    PriceFeed::new(client, cache, &settings)
}

#[tokio::test]
async fn fetches_spot_price() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price/XLM"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "price_usd": 0.1234 })))
        .mount(&server)
        .await;

    let client = ReflectorClient::new(&oracle_settings(&server.uri())).unwrap();
    let price = client.price("XLM").await.unwrap();
    assert_eq!(price, 0.1234);
}

#[tokio::test]
async fn sends_bearer_token_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price/XLM"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "price_usd": 0.12 })))
        .mount(&server)
        .await;

    let mut settings = oracle_settings(&server.uri());
    settings.reflector_api_key = Some("secret-key".to_string());
    let client = ReflectorClient::new(&settings).unwrap();
    assert_eq!(client.price("XLM").await.unwrap(), 0.12);
}

#[tokio::test]
async fn unknown_asset_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price/BOGUS"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ReflectorClient::new(&oracle_settings(&server.uri())).unwrap();
    match client.price("BOGUS").await {
        Err(OracleError::AssetNotFound(asset)) => assert_eq!(asset, "BOGUS"),
        other => panic!("expected AssetNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price/XLM"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = ReflectorClient::new(&oracle_settings(&server.uri())).unwrap();
    assert!(matches!(
        client.price("XLM").await,
        Err(OracleError::ApiError(_))
    ));
}

#[tokio::test]
async fn fetches_history_with_period_params() {
    let server = MockServer::start().await;
    let now = Utc::now();
    Mock::given(method("GET"))
        .and(path("/history/XLM"))
        .and(query_param("period", "7d"))
        .and(query_param("interval", "1h"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [
                { "timestamp": now - Duration::hours(2), "price": 0.11, "volume": 1500.0 },
                { "timestamp": now - Duration::hours(1), "price": 0.12, "volume": null },
            ]
        })))
        .mount(&server)
        .await;

    let client = ReflectorClient::new(&oracle_settings(&server.uri())).unwrap();
    let history = client.history("XLM", "7d", "1h").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].price, 0.11);
    assert_eq!(history[0].volume, Some(1500.0));
    assert_eq!(history[1].volume, None);
}

#[tokio::test]
async fn price_feed_caches_oracle_prices() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price/XLM"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "price_usd": 0.2 })))
        .expect(1)
        .mount(&server)
        .await;

    let feed = price_feed(&server.uri());
    assert_eq!(feed.price("XLM", None).await, 0.2);
    // Second call must be served from the cache; the mock allows one hit.
    assert_eq!(feed.price("XLM", None).await, 0.2);
}

#[tokio::test]
async fn price_feed_falls_back_to_demo_price() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price/USDC:GISSUER"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let feed = price_feed(&server.uri());
    assert_eq!(feed.price("USDC", Some("GISSUER")).await, 1.0);
}

#[tokio::test]
async fn price_feed_synthesizes_history_when_oracle_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history/XLM"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let feed = price_feed(&server.uri());
    let history = feed.history("XLM", None).await;
    assert_eq!(history.len(), 168);
    assert!(history.iter().all(|p| p.price > 0.0));
}

#[tokio::test]
async fn health_check_reflects_oracle_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = ReflectorClient::new(&oracle_settings(&server.uri())).unwrap();
    assert!(client.health_check().await);
}

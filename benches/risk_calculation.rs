use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use defi_risk_guardian::models::PricePoint;
use defi_risk_guardian::services::analyzer::PortfolioAnalyzer;
use defi_risk_guardian::services::risk_engine::{
    self, annualized_volatility, AssetSnapshot, RiskEngine,
};

fn history(points: usize) -> Vec<PricePoint> {
    let start = Utc::now() - Duration::hours(points as i64);
    (0..points)
        .map(|i| PricePoint {
            timestamp: start + Duration::hours(i as i64),
            price: 0.12 + (i as f64 * 0.3).sin() * 0.01,
            volume: Some(1000.0 + i as f64),
        })
        .collect()
}

fn snapshots() -> Vec<AssetSnapshot> {
    let codes = ["XLM", "USDC", "BTC", "ETH"];
    let allocations = [0.4, 0.3, 0.2, 0.1];
    codes
        .iter()
        .zip(allocations.iter())
        .map(|(code, allocation)| AssetSnapshot {
            asset_code: code.to_string(),
            asset_issuer: None,
            balance: 1000.0,
            price_usd: 1.0,
            value_usd: allocation * 10_000.0,
            allocation: *allocation,
            volatility: risk_engine::default_volatility(code),
            beta: risk_engine::default_beta(code),
            correlation_xlm: risk_engine::default_correlation(code),
        })
        .collect()
}

fn benchmark_portfolio_analysis(c: &mut Criterion) {
    let engine = RiskEngine::new(10_000);
    let assets = snapshots();

    c.bench_function("portfolio_analysis", |b| {
        b.iter(|| engine.analyze(black_box(&assets)))
    });
}

fn benchmark_volatility(c: &mut Criterion) {
    let series = history(168);

    c.bench_function("annualized_volatility", |b| {
        b.iter(|| annualized_volatility(black_box(&series)))
    });
}

fn benchmark_price_prediction(c: &mut Criterion) {
    let analyzer = PortfolioAnalyzer::new(0.1);
    let series = history(168);

    c.bench_function("price_prediction", |b| {
        b.iter(|| analyzer.predict_price(black_box("XLM"), black_box(&series)))
    });
}

fn benchmark_anomaly_detection(c: &mut Criterion) {
    let analyzer = PortfolioAnalyzer::new(0.1);
    let series = history(168);

    c.bench_function("anomaly_detection", |b| {
        b.iter(|| analyzer.detect_anomalies(black_box("XLM"), black_box(&series)))
    });
}

criterion_group!(
    benches,
    benchmark_portfolio_analysis,
    benchmark_volatility,
    benchmark_price_prediction,
    benchmark_anomaly_detection
);
criterion_main!(benches);

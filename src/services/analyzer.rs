use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::PricePoint;
use crate::services::risk_engine::{AssetSnapshot, PortfolioRiskMetrics};
use crate::utils::math;

const FORECAST_HORIZON_HOURS: usize = 24;
const MIN_HISTORY_POINTS: usize = 10;
const TREND_THRESHOLD: f64 = 0.05;
const MIN_CONFIDENCE: f64 = 0.5;

const FOREST_TREES: usize = 100;
const FOREST_SUBSAMPLE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

/// 24h price outlook for a single asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePrediction {
    pub asset_code: String,
    pub current_price: f64,
    pub predicted_price: f64,
    pub confidence: f64,
    pub trend: Trend,
    pub support_level: f64,
    pub resistance_level: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub asset_code: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub score: f64,
    /// How many standard deviations the price sits from the series mean.
    pub price_zscore: f64,
    /// Volume more than twice the series average.
    pub volume_spike: bool,
    /// Rolling return volatility more than twice the series average.
    pub volatility_spike: bool,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub anomalies: Vec<Anomaly>,
    pub total_points: usize,
    pub anomaly_rate: f64,
}

/// One actionable suggestion for the dashboard. Lower priority numbers
/// surface first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: String,
    pub priority: u8,
    pub message: String,
    pub asset_code: Option<String>,
}

pub struct PortfolioAnalyzer {
    contamination: f64,
}

impl PortfolioAnalyzer {
    pub fn new(contamination: f64) -> Self {
        Self {
            contamination: contamination.clamp(0.01, 0.5),
        }
    }

    /// Fits ordinary least squares over the hourly series and extrapolates
    /// one day ahead. Short series fall back to a random-walk forecast.
    pub fn predict_price(&self, asset_code: &str, history: &[PricePoint]) -> PricePrediction {
        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
        let current_price = prices.last().copied().unwrap_or(0.0);

        if prices.len() < MIN_HISTORY_POINTS {
            return random_walk_prediction(asset_code, current_price);
        }

        let (slope, intercept) = match math::linear_regression(&prices) {
            Some(fit) => fit,
            None => return random_walk_prediction(asset_code, current_price),
        };

        let horizon_x = (prices.len() - 1 + FORECAST_HORIZON_HOURS) as f64;
        let predicted_price = (slope * horizon_x + intercept).max(0.0);

        // Confidence from in-sample fit quality, floored so the UI never
        // shows a near-zero number for a usable model.
        let residual_mse = prices
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let fitted = slope * i as f64 + intercept;
                (p - fitted).powi(2)
            })
            .sum::<f64>()
            / prices.len() as f64;
        let price_variance = math::variance(&prices);
        let confidence = if price_variance > 0.0 {
            (1.0 - residual_mse / price_variance).clamp(MIN_CONFIDENCE, 1.0)
        } else {
            MIN_CONFIDENCE
        };

        let residual_sigma = residual_mse.sqrt();
        let lower_bound = (predicted_price - 1.96 * residual_sigma).max(0.0);
        let upper_bound = predicted_price + 1.96 * residual_sigma;

        let change = if current_price > 0.0 {
            (predicted_price - current_price) / current_price
        } else {
            0.0
        };
        let trend = if change > TREND_THRESHOLD {
            Trend::Bullish
        } else if change < -TREND_THRESHOLD {
            Trend::Bearish
        } else {
            Trend::Neutral
        };

        let recent = &prices[prices.len().saturating_sub(FORECAST_HORIZON_HOURS)..];
        let recent_min = recent.iter().cloned().fold(f64::INFINITY, f64::min);
        let recent_max = recent.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        debug!(
            "Prediction for {}: {:.4} -> {:.4} ({:?}, conf {:.2})",
            asset_code, current_price, predicted_price, trend, confidence
        );

        PricePrediction {
            asset_code: asset_code.to_string(),
            current_price,
            predicted_price,
            confidence,
            trend,
            support_level: recent_min * 0.98,
            resistance_level: recent_max * 1.02,
            lower_bound,
            upper_bound,
        }
    }

    /// Flags unusual points in a price series with an isolation forest over
    /// price, normalized volume, and rolling return volatility.
    pub fn detect_anomalies(&self, asset_code: &str, history: &[PricePoint]) -> AnomalyReport {
        if history.len() < MIN_HISTORY_POINTS {
            return AnomalyReport {
                anomalies: Vec::new(),
                total_points: history.len(),
                anomaly_rate: 0.0,
            };
        }

        let features = build_features(history);
        let forest = IsolationForest::fit(&features, FOREST_TREES, FOREST_SUBSAMPLE);
        let scores: Vec<f64> = features.iter().map(|f| forest.score(f)).collect();

        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
        let price_mean = math::mean(&prices);
        let price_std = math::std_dev(&prices);
        let volumes: Vec<f64> = history.iter().map(|p| p.volume.unwrap_or(0.0)).collect();
        let volume_mean = math::mean(&volumes);
        let rolling_vols: Vec<f64> = features.iter().map(|f| f[2]).collect();
        let rolling_vol_mean = math::mean(&rolling_vols);

        // Score cutoff at the contamination quantile, highest scores flagged.
        let flagged = ((scores.len() as f64 * self.contamination).ceil() as usize)
            .clamp(1, scores.len());
        let mut ranked: Vec<(usize, f64)> =
            scores.iter().cloned().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let cutoff = ranked[flagged - 1].1;

        let mut anomalies: Vec<Anomaly> = ranked
            .into_iter()
            .take(flagged)
            .filter(|(_, score)| *score >= cutoff)
            .map(|(i, score)| {
                let price_zscore = if price_std > 0.0 {
                    (history[i].price - price_mean) / price_std
                } else {
                    0.0
                };
                let volume_spike = volume_mean > 0.0
                    && history[i].volume.unwrap_or(0.0) > volume_mean * 2.0;
                let volatility_spike =
                    rolling_vol_mean > 0.0 && rolling_vols[i] > rolling_vol_mean * 2.0;
                Anomaly {
                    asset_code: asset_code.to_string(),
                    timestamp: history[i].timestamp,
                    price: history[i].price,
                    score,
                    price_zscore,
                    volume_spike,
                    volatility_spike,
                    severity: severity_for_score(score),
                }
            })
            .collect();
        anomalies.sort_by_key(|a| a.timestamp);

        let anomaly_rate = anomalies.len() as f64 / history.len() as f64;
        AnomalyReport {
            anomalies,
            total_points: history.len(),
            anomaly_rate,
        }
    }
}

/// Prioritized suggestions from the combined analysis: risk warnings first,
/// then concentration and prediction-driven trades, capped at ten entries.
pub fn generate_recommendations(
    metrics: &PortfolioRiskMetrics,
    assets: &[AssetSnapshot],
    predictions: &[PricePrediction],
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if metrics.risk_score > 80.0 {
        let riskiest = assets
            .iter()
            .max_by(|a, b| a.volatility.total_cmp(&b.volatility));
        if let Some(asset) = riskiest {
            recommendations.push(Recommendation {
                category: "risk".to_string(),
                priority: 1,
                message: format!(
                    "Portfolio risk score is {:.0}. Consider reducing your {} position by about 30%",
                    metrics.risk_score, asset.asset_code
                ),
                asset_code: Some(asset.asset_code.clone()),
            });
        }
    }

    if assets.len() == 1 {
        recommendations.push(Recommendation {
            category: "diversification".to_string(),
            priority: 2,
            message: "Portfolio holds a single asset. Add uncorrelated holdings".to_string(),
            asset_code: None,
        });
    } else if metrics.diversification_ratio < 1.2 && metrics.diversification_ratio > 0.0 {
        recommendations.push(Recommendation {
            category: "diversification".to_string(),
            priority: 2,
            message: "Holdings move together; diversification adds little benefit".to_string(),
            asset_code: None,
        });
    }

    for asset in assets {
        if asset.allocation > 0.6 {
            recommendations.push(Recommendation {
                category: "concentration".to_string(),
                priority: 2,
                message: format!(
                    "{} is {:.0}% of the portfolio. Consider trimming below 60%",
                    asset.asset_code,
                    asset.allocation * 100.0
                ),
                asset_code: Some(asset.asset_code.clone()),
            });
        }
    }

    for prediction in predictions {
        if prediction.confidence <= 0.7 || prediction.current_price <= 0.0 {
            continue;
        }
        let expected_move =
            (prediction.predicted_price - prediction.current_price) / prediction.current_price;
        if expected_move > 0.1 {
            recommendations.push(Recommendation {
                category: "prediction".to_string(),
                priority: 3,
                message: format!(
                    "{} projects {:.1}% upside over 24h (confidence {:.0}%)",
                    prediction.asset_code,
                    expected_move * 100.0,
                    prediction.confidence * 100.0
                ),
                asset_code: Some(prediction.asset_code.clone()),
            });
        } else if expected_move < -0.1 {
            recommendations.push(Recommendation {
                category: "prediction".to_string(),
                priority: 3,
                message: format!(
                    "{} projects {:.1}% downside over 24h (confidence {:.0}%)",
                    prediction.asset_code,
                    expected_move * 100.0,
                    prediction.confidence * 100.0
                ),
                asset_code: Some(prediction.asset_code.clone()),
            });
        }
    }

    if metrics.volatility > 0.0 {
        for asset in assets {
            if asset.volatility > metrics.volatility * 2.0 && asset.allocation > 0.1 {
                recommendations.push(Recommendation {
                    category: "volatility".to_string(),
                    priority: 4,
                    message: format!(
                        "{} is more than twice as volatile as the portfolio. Consider an inverse-volatility weighting",
                        asset.asset_code
                    ),
                    asset_code: Some(asset.asset_code.clone()),
                });
            }
        }
    }

    recommendations.sort_by_key(|r| r.priority);
    recommendations.truncate(10);
    recommendations
}

fn random_walk_prediction(asset_code: &str, current_price: f64) -> PricePrediction {
    PricePrediction {
        asset_code: asset_code.to_string(),
        current_price,
        predicted_price: current_price,
        confidence: MIN_CONFIDENCE,
        trend: Trend::Neutral,
        support_level: current_price * 0.98,
        resistance_level: current_price * 1.02,
        lower_bound: current_price * 0.95,
        upper_bound: current_price * 1.05,
    }
}

fn severity_for_score(score: f64) -> String {
    if score >= 0.7 {
        "high".to_string()
    } else if score >= 0.6 {
        "medium".to_string()
    } else {
        "low".to_string()
    }
}

/// Feature matrix: [price, normalized volume, rolling std of log returns].
fn build_features(history: &[PricePoint]) -> Vec<Vec<f64>> {
    let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
    let volumes: Vec<f64> = history.iter().map(|p| p.volume.unwrap_or(0.0)).collect();
    let max_volume = volumes.iter().cloned().fold(0.0, f64::max).max(1.0);

    let returns = math::log_returns(&prices);
    let rolling = math::rolling_std(&returns, 10);

    (0..history.len())
        .map(|i| {
            // Return series is one shorter than the price series.
            let vol_feature = if i == 0 {
                0.0
            } else {
                rolling.get(i - 1).copied().unwrap_or(0.0)
            };
            vec![prices[i], volumes[i] / max_volume, vol_feature]
        })
        .collect()
}

enum IsolationNode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
}

struct IsolationForest {
    trees: Vec<IsolationNode>,
    subsample: usize,
}

impl IsolationForest {
    fn fit(data: &[Vec<f64>], trees: usize, subsample: usize) -> Self {
        let subsample = subsample.min(data.len()).max(2);
        let max_depth = (subsample as f64).log2().ceil() as usize;
        let mut rng = rand::thread_rng();

        let trees = (0..trees)
            .map(|_| {
                let mut sample: Vec<&Vec<f64>> = data.iter().collect();
                sample.shuffle(&mut rng);
                sample.truncate(subsample);
                build_tree(&sample, 0, max_depth, &mut rng)
            })
            .collect();

        Self { trees, subsample }
    }

    /// Anomaly score in (0, 1); values above ~0.6 indicate isolation.
    fn score(&self, point: &[f64]) -> f64 {
        let avg_path: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, point, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        let normalizer = average_path_length(self.subsample);
        if normalizer == 0.0 {
            return 0.5;
        }
        2f64.powf(-avg_path / normalizer)
    }
}

fn build_tree(
    sample: &[&Vec<f64>],
    depth: usize,
    max_depth: usize,
    rng: &mut impl Rng,
) -> IsolationNode {
    if depth >= max_depth || sample.len() <= 1 {
        return IsolationNode::Leaf { size: sample.len() };
    }

    let dims = sample[0].len();
    let feature = rng.gen_range(0..dims);
    let min = sample
        .iter()
        .map(|p| p[feature])
        .fold(f64::INFINITY, f64::min);
    let max = sample
        .iter()
        .map(|p| p[feature])
        .fold(f64::NEG_INFINITY, f64::max);
    if max <= min {
        return IsolationNode::Leaf { size: sample.len() };
    }

    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<&Vec<f64>>, Vec<&Vec<f64>>) =
        sample.iter().copied().partition(|p| p[feature] < threshold);
    if left.is_empty() || right.is_empty() {
        return IsolationNode::Leaf { size: sample.len() };
    }

    IsolationNode::Split {
        feature,
        threshold,
        left: Box::new(build_tree(&left, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(&right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &IsolationNode, point: &[f64], depth: usize) -> f64 {
    match node {
        IsolationNode::Leaf { size } => depth as f64 + average_path_length(*size),
        IsolationNode::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if point[*feature] < *threshold {
                path_length(left, point, depth + 1)
            } else {
                path_length(right, point, depth + 1)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over n points.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + 0.577_215_664_901_532_9) - 2.0 * (n - 1.0) / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(prices: &[f64]) -> Vec<PricePoint> {
        let start = Utc::now() - Duration::hours(prices.len() as i64);
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| PricePoint {
                timestamp: start + Duration::hours(i as i64),
                price: *p,
                volume: Some(1000.0),
            })
            .collect()
    }

    #[test]
    fn test_predict_short_history_random_walk() {
        let analyzer = PortfolioAnalyzer::new(0.1);
        let history = series(&[0.12, 0.13]);
        let prediction = analyzer.predict_price("XLM", &history);
        assert_eq!(prediction.predicted_price, 0.13);
        assert_eq!(prediction.trend, Trend::Neutral);
        assert_eq!(prediction.confidence, 0.5);
    }

    #[test]
    fn test_predict_uptrend_is_bullish() {
        let analyzer = PortfolioAnalyzer::new(0.1);
        let prices: Vec<f64> = (0..48).map(|i| 1.0 + i as f64 * 0.01).collect();
        let prediction = analyzer.predict_price("XLM", &series(&prices));
        assert_eq!(prediction.trend, Trend::Bullish);
        assert!(prediction.predicted_price > prediction.current_price);
        assert!(prediction.confidence > 0.9);
        assert!(prediction.lower_bound <= prediction.predicted_price);
        assert!(prediction.upper_bound >= prediction.predicted_price);
    }

    #[test]
    fn test_predict_downtrend_is_bearish() {
        let analyzer = PortfolioAnalyzer::new(0.1);
        let prices: Vec<f64> = (0..48).map(|i| 10.0 - i as f64 * 0.1).collect();
        let prediction = analyzer.predict_price("BTC", &series(&prices));
        assert_eq!(prediction.trend, Trend::Bearish);
        assert!(prediction.predicted_price < prediction.current_price);
    }

    #[test]
    fn test_support_and_resistance_bracket_recent_range() {
        let analyzer = PortfolioAnalyzer::new(0.1);
        let prices: Vec<f64> = (0..48).map(|i| 1.0 + (i as f64 * 0.5).sin() * 0.1).collect();
        let prediction = analyzer.predict_price("XLM", &series(&prices));
        let recent = &prices[prices.len() - 24..];
        let min = recent.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = recent.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(prediction.support_level < min);
        assert!(prediction.resistance_level > max);
    }

    #[test]
    fn test_detect_anomalies_short_history_is_empty() {
        let analyzer = PortfolioAnalyzer::new(0.1);
        let report = analyzer.detect_anomalies("XLM", &series(&[1.0, 1.0, 1.0]));
        assert!(report.anomalies.is_empty());
        assert_eq!(report.anomaly_rate, 0.0);
    }

    #[test]
    fn test_detect_anomalies_flags_price_spike() {
        let analyzer = PortfolioAnalyzer::new(0.05);
        let mut prices = vec![1.0; 100];
        prices[50] = 25.0;
        let report = analyzer.detect_anomalies("XLM", &series(&prices));

        assert!(!report.anomalies.is_empty());
        assert!(report.anomalies.iter().any(|a| a.price == 25.0));
        assert!(report.anomaly_rate <= 0.1);
    }

    #[test]
    fn test_anomaly_scores_are_bounded() {
        let analyzer = PortfolioAnalyzer::new(0.1);
        let prices: Vec<f64> = (0..80).map(|i| 1.0 + (i as f64 * 0.3).cos() * 0.05).collect();
        let report = analyzer.detect_anomalies("XLM", &series(&prices));
        for anomaly in &report.anomalies {
            assert!(anomaly.score > 0.0 && anomaly.score < 1.0);
        }
    }

    #[test]
    fn test_average_path_length_monotonic() {
        assert_eq!(average_path_length(1), 0.0);
        assert!(average_path_length(64) > average_path_length(8));
    }

    fn snapshot(code: &str, allocation: f64, volatility: f64) -> AssetSnapshot {
        AssetSnapshot {
            asset_code: code.to_string(),
            asset_issuer: None,
            balance: 100.0,
            price_usd: 1.0,
            value_usd: allocation * 1000.0,
            allocation,
            volatility,
            beta: 1.0,
            correlation_xlm: 1.0,
        }
    }

    #[test]
    fn test_recommendations_flag_high_risk_and_concentration() {
        let mut metrics = PortfolioRiskMetrics::empty();
        metrics.risk_score = 85.0;
        metrics.volatility = 0.2;
        metrics.diversification_ratio = 1.5;
        let assets = vec![snapshot("BTC", 0.7, 0.5), snapshot("USDC", 0.3, 0.01)];

        let recs = generate_recommendations(&metrics, &assets, &[]);

        assert!(recs.iter().any(|r| r.category == "risk"
            && r.asset_code.as_deref() == Some("BTC")));
        assert!(recs.iter().any(|r| r.category == "concentration"));
        assert!(recs.windows(2).all(|w| w[0].priority <= w[1].priority));
    }

    #[test]
    fn test_recommendations_include_confident_predictions() {
        let metrics = PortfolioRiskMetrics::empty();
        let assets = vec![snapshot("XLM", 0.5, 0.2), snapshot("BTC", 0.5, 0.3)];
        let prediction = PricePrediction {
            asset_code: "XLM".to_string(),
            current_price: 0.10,
            predicted_price: 0.12,
            confidence: 0.85,
            trend: Trend::Bullish,
            support_level: 0.09,
            resistance_level: 0.13,
            lower_bound: 0.11,
            upper_bound: 0.13,
        };

        let recs = generate_recommendations(&metrics, &assets, &[prediction]);

        assert!(recs
            .iter()
            .any(|r| r.category == "prediction" && r.message.contains("upside")));
    }

    #[test]
    fn test_recommendations_single_asset_suggests_diversifying() {
        let metrics = PortfolioRiskMetrics::empty();
        let assets = vec![snapshot("XLM", 1.0, 0.25)];

        let recs = generate_recommendations(&metrics, &assets, &[]);

        assert!(recs.iter().any(|r| r.category == "diversification"));
        assert!(recs.len() <= 10);
    }
}

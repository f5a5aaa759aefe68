//! Statistical primitives shared by the risk engine and analyzer.
//!
//! All series are plain `f64` slices; callers are responsible for filtering
//! non-finite values out of oracle data before handing it here.

/// Calculate percentage change between two values.
pub fn percentage_change(old_value: f64, new_value: f64) -> Result<f64, String> {
    if old_value == 0.0 {
        return Err("Cannot calculate percentage change with zero base value".to_string());
    }
    Ok((new_value - old_value) / old_value * 100.0)
}

/// Log returns of a price series. Non-positive prices are skipped.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Population variance, used where the analyzer needs Var(y) of a fit target.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Percentile of a sample by nearest-rank on a sorted copy, q in [0, 100].
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (q / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Pearson correlation coefficient between two equal-length series.
pub fn correlation(x: &[f64], y: &[f64]) -> Result<f64, String> {
    if x.len() != y.len() || x.len() < 2 {
        return Err("Series must have equal length and at least 2 values".to_string());
    }

    let mean_x = mean(x);
    let mean_y = mean(y);

    let numerator: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();

    let sum_sq_x: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    let sum_sq_y: f64 = y.iter().map(|yi| (yi - mean_y).powi(2)).sum();

    let denominator = (sum_sq_x * sum_sq_y).sqrt();
    if denominator == 0.0 {
        return Ok(0.0);
    }

    Ok(numerator / denominator)
}

/// Simple moving average over a fixed window.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return vec![];
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

/// Ordinary least squares fit y = slope * x + intercept over x = 0..n.
pub fn linear_regression(y: &[f64]) -> Option<(f64, f64)> {
    let n = y.len();
    if n < 2 {
        return None;
    }

    let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let mean_x = mean(&xs);
    let mean_y = mean(y);

    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = xs
        .iter()
        .zip(y.iter())
        .map(|(x, yi)| (x - mean_x) * (yi - mean_y))
        .sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    Some((slope, intercept))
}

/// Rolling sample standard deviation of the trailing `window` values at each
/// index, padded at the front so output length equals input length.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = (i + 1).saturating_sub(window);
            std_dev(&values[start..=i])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(100.0, 110.0).unwrap(), 10.0);
        assert_eq!(percentage_change(100.0, 90.0).unwrap(), -10.0);
        assert!(percentage_change(0.0, 100.0).is_err());
    }

    #[test]
    fn test_log_returns_skips_non_positive() {
        let returns = log_returns(&[1.0, 2.0, 0.0, 4.0]);
        assert_eq!(returns.len(), 1);
        assert!((returns[0] - 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // Sample std dev of this classic series is ~2.138
        assert!((std_dev(&values) - 2.138).abs() < 1e-3);
        assert_eq!(std_dev(&[1.0]), 0.0);
    }

    #[test]
    fn test_percentile_bounds() {
        let values = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
        assert_eq!(percentile(&values, 50.0), 3.0);
    }

    #[test]
    fn test_correlation_perfect() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((correlation(&x, &y).unwrap() - 1.0).abs() < 1e-12);

        let inverse = [8.0, 6.0, 4.0, 2.0];
        assert!((correlation(&x, &inverse).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_constant_series_is_zero() {
        let x = [1.0, 2.0, 3.0];
        let y = [5.0, 5.0, 5.0];
        assert_eq!(correlation(&x, &y).unwrap(), 0.0);
    }

    #[test]
    fn test_moving_average() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ma = moving_average(&values, 3);
        assert_eq!(ma, vec![2.0, 3.0, 4.0]);
        assert!(moving_average(&values, 0).is_empty());
        assert!(moving_average(&values, 6).is_empty());
    }

    #[test]
    fn test_linear_regression_exact_line() {
        let y = [1.0, 3.0, 5.0, 7.0];
        let (slope, intercept) = linear_regression(&y).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
        assert!(linear_regression(&[1.0]).is_none());
    }

    #[test]
    fn test_rolling_std_length() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let rolled = rolling_std(&values, 2);
        assert_eq!(rolled.len(), values.len());
        assert_eq!(rolled[0], 0.0);
    }

    #[test]
    fn test_rolling_std_window_spans_exactly_window_points() {
        // With window 3 the fourth entry covers [0, 0, 9], not [1, 0, 0, 9].
        let values = [1.0, 0.0, 0.0, 9.0, 9.0, 9.0];
        let rolled = rolling_std(&values, 3);
        assert!((rolled[3] - std_dev(&[0.0, 0.0, 9.0])).abs() < 1e-12);
        // Once the window is saturated with equal values the deviation is 0.
        assert_eq!(rolled[5], 0.0);
    }

    proptest! {
        #[test]
        fn correlation_is_bounded(
            x in proptest::collection::vec(-1e6..1e6f64, 2..50),
            y in proptest::collection::vec(-1e6..1e6f64, 2..50),
        ) {
            let n = x.len().min(y.len());
            if let Ok(r) = correlation(&x[..n], &y[..n]) {
                prop_assert!(r >= -1.0 - 1e-9 && r <= 1.0 + 1e-9);
            }
        }

        #[test]
        fn percentile_within_range(
            values in proptest::collection::vec(-1e6..1e6f64, 1..100),
            q in 0.0..100.0f64,
        ) {
            let p = percentile(&values, q);
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(p >= min && p <= max);
        }
    }
}

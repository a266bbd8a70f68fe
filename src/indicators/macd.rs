use super::moving_average::{calculate_ema, calculate_ema_defined};

/// MACD line, signal line and histogram, index-aligned to the input
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Moving Average Convergence Divergence
///
/// `macd = EMA(fast) - EMA(slow)`, `signal = EMA(macd, signal_period)`,
/// `histogram = macd - signal`. The caller guarantees `fast < slow`.
pub fn calculate_macd(
    series: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdSeries {
    let fast = calculate_ema(series, fast_period);
    let slow = calculate_ema(series, slow_period);

    let macd: Vec<Option<f64>> = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let signal = calculate_ema_defined(&macd, signal_period);

    let histogram = macd
        .iter()
        .zip(signal.iter())
        .map(|(m, s)| Some((*m)? - (*s)?))
        .collect();

    MacdSeries {
        macd,
        signal,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_lengths_match_input() {
        let prices: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let macd = calculate_macd(&prices, 2, 5, 3);

        assert_eq!(macd.macd.len(), prices.len());
        assert_eq!(macd.signal.len(), prices.len());
        assert_eq!(macd.histogram.len(), prices.len());
    }

    #[test]
    fn test_warm_up_offsets() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let macd = calculate_macd(&prices, 12, 26, 9);

        // MACD defined from slow-1, signal from slow-1 + signal-1
        assert!(macd.macd[24].is_none());
        assert!(macd.macd[25].is_some());
        assert!(macd.signal[32].is_none());
        assert!(macd.signal[33].is_some());
        assert_eq!(macd.histogram.iter().flatten().count(), 60 - 33);
    }

    #[test]
    fn test_rising_series_has_positive_macd() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let macd = calculate_macd(&prices, 12, 26, 9);

        let last = macd.macd.last().copied().flatten().unwrap();
        assert!(last > 0.0);
    }

    #[test]
    fn test_histogram_is_difference() {
        let prices: Vec<f64> = (0..40).map(|i| 50.0 + (i % 7) as f64).collect();
        let macd = calculate_macd(&prices, 3, 6, 4);

        for i in 0..prices.len() {
            if let (Some(m), Some(s), Some(h)) = (macd.macd[i], macd.signal[i], macd.histogram[i]) {
                assert!((h - (m - s)).abs() < 1e-12);
            }
        }
    }
}

/// Exponential Moving Average over a full series
///
/// Seeded with the arithmetic mean of the first `period` values at index
/// `period - 1`, then `ema[i] = (x[i] - ema[i-1]) * 2/(period+1) + ema[i-1]`.
/// Positions before the seed are `None`.
pub fn calculate_ema(series: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; series.len()];
    if period == 0 || series.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Start with SMA
    let mut ema = series[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);

    for (i, value) in series.iter().enumerate().skip(period) {
        ema = (value - ema) * multiplier + ema;
        out[i] = Some(ema);
    }

    out
}

/// EMA over a series that itself has an undefined prefix
///
/// The seed window starts at the first defined value, so the result's
/// warm-up is the input's warm-up plus `period - 1`.
pub fn calculate_ema_defined(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; series.len()];

    let Some(start) = series.iter().position(Option::is_some) else {
        return out;
    };

    let defined: Vec<f64> = series[start..].iter().map_while(|v| *v).collect();
    for (offset, value) in calculate_ema(&defined, period).into_iter().enumerate() {
        out[start + offset] = value;
    }

    out
}

/// Simple rolling mean, defined from index `period - 1`
pub fn calculate_sma(series: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; series.len()];
    if period == 0 || series.len() < period {
        return out;
    }

    for i in (period - 1)..series.len() {
        let window = &series[i + 1 - period..=i];
        out[i] = Some(window.iter().sum::<f64>() / period as f64);
    }

    out
}

/// Rolling mean of traded volume
pub fn calculate_volume_ma(volumes: &[f64], period: usize) -> Vec<Option<f64>> {
    calculate_sma(volumes, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_known_values() {
        let ema = calculate_ema(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(ema, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_ema_constant_series() {
        let prices = vec![42.5; 30];
        let ema = calculate_ema(&prices, 10);

        assert!(ema[..9].iter().all(Option::is_none));
        for value in &ema[9..] {
            assert_eq!(*value, Some(42.5));
        }
    }

    #[test]
    fn test_ema_monotonic_on_rising_series() {
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 0.7).collect();
        let ema: Vec<f64> = calculate_ema(&prices, 12).into_iter().flatten().collect();

        assert_eq!(ema.len(), 50 - 11);
        for pair in ema.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_ema_insufficient_data() {
        let ema = calculate_ema(&[100.0, 102.0], 5);
        assert_eq!(ema, vec![None, None]);
    }

    #[test]
    fn test_ema_defined_skips_prefix() {
        let series = vec![None, None, Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let ema = calculate_ema_defined(&series, 3);
        assert_eq!(ema, vec![None, None, None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_sma() {
        let sma = calculate_sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(sma, vec![None, Some(1.5), Some(2.5), Some(3.5), Some(4.5)]);
    }

    #[test]
    fn test_volume_ma_period_one_is_identity() {
        let volumes = vec![10.0, 0.3, 17.25, 1e6, 0.0];
        let ma = calculate_volume_ma(&volumes, 1);
        let expected: Vec<Option<f64>> = volumes.iter().copied().map(Some).collect();
        assert_eq!(ma, expected);
    }
}

/// Guards the RS ratio against a zero average loss
const RSI_EPSILON: f64 = 1e-10;

/// Calculate Relative Strength Index (RSI) over a full series
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// The first average gain/loss is the mean of the first `period` deltas and
/// lands at index `period`; later values use Wilder smoothing
/// `avg = (avg * (period - 1) + new) / period`.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period + 1 {
        return out;
    }

    let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |d: f64| d.max(0.0);
    let loss = |d: f64| (-d).max(0.0);

    let mut avg_gain = deltas[..period].iter().map(|&d| gain(d)).sum::<f64>() / period as f64;
    let mut avg_loss = deltas[..period].iter().map(|&d| loss(d)).sum::<f64>() / period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    let p = period as f64;
    for (i, &delta) in deltas.iter().enumerate().skip(period) {
        avg_gain = (avg_gain * (p - 1.0) + gain(delta)) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss(delta)) / p;
        // deltas[i] is the move into prices[i + 1]
        out[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain > 0.0 {
        return 100.0;
    }

    let rs = avg_gain / (avg_loss + RSI_EPSILON);
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_calculation() {
        let prices = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5, 46.0, 46.5, 46.25,
            46.0, 46.5, 46.75, 46.25,
        ];

        let rsi = calculate_rsi(&prices, 14);
        assert_eq!(rsi.iter().flatten().count(), prices.len() - 14);

        for value in rsi.iter().flatten() {
            assert!(*value > 0.0 && *value < 100.0);
        }
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let rsi = calculate_rsi(&[100.0, 102.0, 101.0], 14);
        assert!(rsi.iter().all(Option::is_none));
    }

    #[test]
    fn test_rsi_all_gains() {
        let prices = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0];
        let rsi = calculate_rsi(&prices, 5);
        assert_eq!(rsi[5], Some(100.0));
        assert_eq!(rsi[6], Some(100.0));
    }

    #[test]
    fn test_rsi_all_losses() {
        let prices = vec![106.0, 105.0, 104.0, 103.0, 102.0, 101.0, 100.0];
        let rsi = calculate_rsi(&prices, 5);
        assert_eq!(rsi[5], Some(0.0));
        assert_eq!(rsi[6], Some(0.0));
    }

    #[test]
    fn test_rsi_bounded_on_oscillation() {
        let prices = vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 5.0, 0.5, 9.0];
        for value in calculate_rsi(&prices, 3).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_wilder_smoothing_step() {
        // seed over 2 deltas: gains 1,0 losses 0,1 -> avg 0.5/0.5 -> RSI 50
        // next delta +2: gain (0.5*1+2)/2 = 1.25, loss (0.5*1+0)/2 = 0.25 -> rs 5
        let rsi = calculate_rsi(&[10.0, 11.0, 10.0, 12.0], 2);
        assert!((rsi[2].unwrap() - 50.0).abs() < 1e-6);
        assert!((rsi[3].unwrap() - (100.0 - 100.0 / 6.0)).abs() < 1e-6);
    }
}

use serde::Deserialize;

use crate::indicators::{value_at, IndicatorSet};
use crate::models::Candle;

/// Thresholds shared by the signal filters
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalFilters {
    /// Buy requires `rsi_buy_min < RSI < rsi_buy_max`
    pub rsi_buy_min: f64,
    pub rsi_buy_max: f64,
    /// Sell requires `rsi_sell_min < RSI < rsi_sell_max`
    pub rsi_sell_min: f64,
    pub rsi_sell_max: f64,
    /// Midline used by the momentum variant
    pub rsi_midline: f64,
    /// Minimum `|close - open| / (high - low)` of the latest bar
    pub min_body_ratio: f64,
    /// Volume must exceed `volume_factor * volume MA`
    pub volume_factor: f64,
    /// Latest range above this multiple of the lookback mean is an outlier
    pub anomaly_range_multiple: f64,
    pub anomaly_lookback: usize,
    /// Bars of history needed before any signal
    pub min_history: usize,
}

impl Default for SignalFilters {
    fn default() -> Self {
        Self {
            rsi_buy_min: 50.0,
            rsi_buy_max: 70.0,
            rsi_sell_min: 30.0,
            rsi_sell_max: 50.0,
            rsi_midline: 50.0,
            min_body_ratio: 0.6,
            volume_factor: 1.0,
            anomaly_range_multiple: 1.8,
            anomaly_lookback: 10,
            min_history: 35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdCross {
    Bullish,
    Bearish,
}

/// MACD crossing its signal line between bar `t - 1` and bar `t`
///
/// Bullish: `macd[t-1] < signal[t-1]` and `macd[t] > signal[t]`;
/// bearish is the mirror. None if either bar is still warming up.
pub fn detect_macd_cross(indicators: &IndicatorSet, t: usize) -> Option<MacdCross> {
    let prev = t.checked_sub(1)?;
    let macd_prev = value_at(&indicators.macd, prev)?;
    let signal_prev = value_at(&indicators.macd_signal, prev)?;
    let macd_now = value_at(&indicators.macd, t)?;
    let signal_now = value_at(&indicators.macd_signal, t)?;

    if macd_prev < signal_prev && macd_now > signal_now {
        Some(MacdCross::Bullish)
    } else if macd_prev > signal_prev && macd_now < signal_now {
        Some(MacdCross::Bearish)
    } else {
        None
    }
}

/// Body-to-range ratio filter; a zero-range bar fails
pub fn is_strong_candle(candle: &Candle, min_body_ratio: f64) -> bool {
    let range = candle.range();
    if range <= 0.0 {
        return false;
    }
    candle.body() / range >= min_body_ratio
}

/// Volume above its moving average (scaled by `factor`)
pub fn is_volume_confirmed(volume: f64, volume_ma: Option<f64>, factor: f64) -> bool {
    volume_ma.is_some_and(|ma| volume > ma * factor)
}

/// Latest bar's range exceeds `multiple` times the mean range of the
/// `lookback` bars before it
pub fn is_anomalous_candle(candles: &[Candle], lookback: usize, multiple: f64) -> bool {
    let Some((latest, history)) = candles.split_last() else {
        return false;
    };

    let window = &history[history.len().saturating_sub(lookback)..];
    if window.is_empty() {
        return false;
    }

    let mean_range = window.iter().map(Candle::range).sum::<f64>() / window.len() as f64;
    latest.range() > mean_range * multiple
}

/// Open interval check used by the RSI bands
pub fn within_band(value: f64, low: f64, high: f64) -> bool {
    value > low && value < high
}

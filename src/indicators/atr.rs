//! Average True Range (ATR) indicator
//!
//! Measures market volatility by averaging true ranges over a period.
//! True Range is the greatest of:
//! - Current High - Current Low
//! - Abs(Current High - Previous Close)
//! - Abs(Current Low - Previous Close)
//!
//! The averaging method is selectable: a plain mean of the last `period`
//! true ranges, or Wilder's smoothing (same recursion as RSI).

use serde::Deserialize;

use crate::models::Candle;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AtrSmoothing {
    #[default]
    Simple,
    Wilder,
}

/// True range of each bar; index 0 has no previous close and is `None`
pub fn true_ranges(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];

    for i in 1..candles.len() {
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;

        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());

        out[i] = Some(tr);
    }

    out
}

/// ATR series aligned with candles, defined from index `period`
///
/// Needs at least `period + 1` candles; otherwise every position is `None`.
pub fn calculate_atr_series(
    candles: &[Candle],
    period: usize,
    smoothing: AtrSmoothing,
) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < period + 1 {
        return out;
    }

    // trs[i] is the true range of candles[i + 1]
    let trs: Vec<f64> = true_ranges(candles).into_iter().flatten().collect();

    match smoothing {
        AtrSmoothing::Simple => {
            for i in period..candles.len() {
                let window = &trs[i - period..i];
                out[i] = Some(window.iter().sum::<f64>() / period as f64);
            }
        }
        AtrSmoothing::Wilder => {
            let mut atr = trs[..period].iter().sum::<f64>() / period as f64;
            out[period] = Some(atr);

            let p = period as f64;
            for i in (period + 1)..candles.len() {
                atr = (atr * (p - 1.0) + trs[i - 1]) / p;
                out[i] = Some(atr);
            }
        }
    }

    out
}

/// Current ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize, smoothing: AtrSmoothing) -> Option<f64> {
    calculate_atr_series(candles, period, smoothing)
        .last()
        .copied()
        .flatten()
}

// Technical indicators module
// Implements EMA, MACD, RSI, volume MA and ATR over full candle series.
//
// Every function returns a series as long as its input; warm-up positions
// are `None` and never take part in decisions.

pub mod atr;
pub mod macd;
pub mod moving_average;
pub mod rsi;

use serde::Deserialize;

use crate::models::Candle;

pub use atr::{calculate_atr, calculate_atr_series, true_ranges, AtrSmoothing};
pub use macd::{calculate_macd, MacdSeries};
pub use moving_average::{calculate_ema, calculate_ema_defined, calculate_sma, calculate_volume_ma};
pub use rsi::calculate_rsi;

/// Indicator periods and smoothing choices
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub volume_ma_period: usize,
    pub atr_period: usize,
    pub atr_smoothing: AtrSmoothing,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast: 12,
            ema_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            volume_ma_period: 20,
            atr_period: 14,
            atr_smoothing: AtrSmoothing::Simple,
        }
    }
}

/// All indicators for one instrument, index-aligned to its candles
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub volume_ma: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
}

/// Latest defined values, for logging and notifications
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub rsi: Option<f64>,
    pub volume_ma: Option<f64>,
    pub atr: Option<f64>,
}

impl IndicatorSet {
    pub fn compute(candles: &[Candle], config: &IndicatorConfig) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        let MacdSeries {
            macd,
            signal,
            histogram,
        } = calculate_macd(&closes, config.ema_fast, config.ema_slow, config.macd_signal);

        Self {
            ema_fast: calculate_ema(&closes, config.ema_fast),
            ema_slow: calculate_ema(&closes, config.ema_slow),
            macd,
            macd_signal: signal,
            histogram,
            rsi: calculate_rsi(&closes, config.rsi_period),
            volume_ma: calculate_volume_ma(&volumes, config.volume_ma_period),
            atr: calculate_atr_series(candles, config.atr_period, config.atr_smoothing),
        }
    }

    /// Number of bars the set is aligned to
    pub fn len(&self) -> usize {
        self.macd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macd.is_empty()
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        let Some(last) = self.len().checked_sub(1) else {
            return IndicatorSnapshot::default();
        };

        IndicatorSnapshot {
            macd: value_at(&self.macd, last),
            macd_signal: value_at(&self.macd_signal, last),
            rsi: value_at(&self.rsi, last),
            volume_ma: value_at(&self.volume_ma, last),
            atr: value_at(&self.atr, last),
        }
    }
}

/// Defined value at `index`, `None` when out of range or still warming up
pub fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

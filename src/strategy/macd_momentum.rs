use chrono::{DateTime, Utc};

use super::signals::{is_anomalous_candle, is_volume_confirmed, SignalFilters};
use super::{ready_to_evaluate, Strategy};
use crate::indicators::{value_at, IndicatorSet};
use crate::models::{Candle, Signal};

/// MACD momentum strategy
///
/// Buy when MACD is above zero, RSI is above the midline and volume beats
/// its average; Sell on the mirror. No crossing or candle-body filter.
#[derive(Debug, Clone)]
pub struct MacdMomentumStrategy {
    filters: SignalFilters,
}

impl MacdMomentumStrategy {
    pub fn new(filters: SignalFilters) -> Self {
        Self { filters }
    }
}

impl Default for MacdMomentumStrategy {
    fn default() -> Self {
        Self::new(SignalFilters::default())
    }
}

impl Strategy for MacdMomentumStrategy {
    fn evaluate(
        &self,
        candles: &[Candle],
        indicators: &IndicatorSet,
        cooldown_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Signal {
        let f = &self.filters;
        if !ready_to_evaluate(candles, indicators, cooldown_until, now, f.min_history) {
            return Signal::None;
        }

        let t = candles.len() - 1;
        let latest = &candles[t];

        let (Some(macd), Some(rsi)) = (value_at(&indicators.macd, t), value_at(&indicators.rsi, t))
        else {
            return Signal::None;
        };

        let volume_ok =
            is_volume_confirmed(latest.volume, value_at(&indicators.volume_ma, t), f.volume_factor);
        if !volume_ok || is_anomalous_candle(candles, f.anomaly_lookback, f.anomaly_range_multiple)
        {
            return Signal::None;
        }

        if macd > 0.0 && rsi > f.rsi_midline {
            Signal::Buy
        } else if macd < 0.0 && rsi < f.rsi_midline {
            Signal::Sell
        } else {
            Signal::None
        }
    }

    fn name(&self) -> &str {
        "MacdMomentumStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.filters.min_history
    }
}

use chrono::{DateTime, Utc};

use super::signals::{
    detect_macd_cross, is_anomalous_candle, is_strong_candle, is_volume_confirmed, within_band,
    MacdCross, SignalFilters,
};
use super::{ready_to_evaluate, Strategy};
use crate::indicators::{value_at, IndicatorSet};
use crate::models::{Candle, Signal};

/// MACD crossing strategy with confirmation filters
///
/// Buy on a bullish MACD/signal crossing when:
/// - RSI is inside the upper band
/// - the latest bar has a strong body
/// - volume is above its moving average
/// - the latest bar is not an outlier wick
/// - MACD and signal are both above zero
///
/// Sell is the mirror on the lower band, below zero.
#[derive(Debug, Clone)]
pub struct MacdCrossoverStrategy {
    filters: SignalFilters,
}

impl MacdCrossoverStrategy {
    pub fn new(filters: SignalFilters) -> Self {
        Self { filters }
    }
}

impl Default for MacdCrossoverStrategy {
    fn default() -> Self {
        Self::new(SignalFilters::default())
    }
}

impl Strategy for MacdCrossoverStrategy {
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

        let (Some(cross), Some(macd), Some(signal), Some(rsi)) = (
            detect_macd_cross(indicators, t),
            value_at(&indicators.macd, t),
            value_at(&indicators.macd_signal, t),
            value_at(&indicators.rsi, t),
        ) else {
            return Signal::None;
        };

        let strong = is_strong_candle(latest, f.min_body_ratio);
        let volume_ok =
            is_volume_confirmed(latest.volume, value_at(&indicators.volume_ma, t), f.volume_factor);
        let anomalous = is_anomalous_candle(candles, f.anomaly_lookback, f.anomaly_range_multiple);

        tracing::debug!(
            cross = ?cross,
            macd,
            signal,
            rsi,
            strong,
            volume_ok,
            anomalous,
            "MACD crossover filters"
        );

        if !strong || !volume_ok || anomalous {
            return Signal::None;
        }

        let buy = cross == MacdCross::Bullish
            && within_band(rsi, f.rsi_buy_min, f.rsi_buy_max)
            && macd > 0.0
            && signal > 0.0;
        if buy {
            return Signal::Buy;
        }

        let sell = cross == MacdCross::Bearish
            && within_band(rsi, f.rsi_sell_min, f.rsi_sell_max)
            && macd < 0.0
            && signal < 0.0;
        if sell {
            return Signal::Sell;
        }

        Signal::None
    }

    fn name(&self) -> &str {
        "MacdCrossoverStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.filters.min_history
    }
}

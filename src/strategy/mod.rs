// Trading strategy module
pub mod macd_crossover;
pub mod macd_momentum;
pub mod signals;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::indicators::{IndicatorConfig, IndicatorSet};
use crate::models::{Candle, Signal};

pub use macd_crossover::MacdCrossoverStrategy;
pub use macd_momentum::MacdMomentumStrategy;
pub use signals::{MacdCross, SignalFilters};

/// Base trait for all trading strategies
///
/// Implementations read the instrument's cooldown but never arm it; the
/// caller decides what an emitted signal leads to.
pub trait Strategy: Send + Sync {
    /// Generate a trading signal from the latest candles and indicators
    fn evaluate(
        &self,
        candles: &[Candle],
        indicators: &IndicatorSet,
        cooldown_until: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Signal;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// MACD/signal crossing with RSI band, candle-body, volume and
    /// anomalous-range filters
    #[default]
    MacdCrossover,
    /// MACD sign with RSI midline and volume confirmation
    MacdMomentum,
}

/// Strategy selection plus the parameters every variant shares
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    pub indicators: IndicatorConfig,
    pub filters: SignalFilters,
}

/// Build the configured strategy
pub fn build_strategy(config: &StrategyConfig) -> Box<dyn Strategy> {
    match config.kind {
        StrategyKind::MacdCrossover => Box::new(MacdCrossoverStrategy::new(config.filters.clone())),
        StrategyKind::MacdMomentum => Box::new(MacdMomentumStrategy::new(config.filters.clone())),
    }
}

/// Shared early-outs: cooldown, history length, indicator alignment
pub(crate) fn ready_to_evaluate(
    candles: &[Candle],
    indicators: &IndicatorSet,
    cooldown_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    min_history: usize,
) -> bool {
    if cooldown_until.is_some_and(|until| now < until) {
        return false;
    }
    if candles.len() < min_history.max(2) {
        return false;
    }
    indicators.len() == candles.len()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{Duration, TimeZone};

    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    /// Quiet bars with a 1.0 range, then a strong bullish last bar
    pub fn candles_with_last(n: usize, last: (f64, f64, f64, f64, f64)) -> Vec<Candle> {
        let start = base_time();
        let mut candles: Vec<Candle> = (0..n - 1)
            .map(|i| Candle {
                open_time: start + Duration::minutes(i as i64),
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.0,
                volume: 1000.0,
                close_time: start + Duration::minutes(i as i64 + 1),
            })
            .collect();

        let (open, high, low, close, volume) = last;
        candles.push(Candle {
            open_time: start + Duration::minutes(n as i64 - 1),
            open,
            high,
            low,
            close,
            volume,
            close_time: start + Duration::minutes(n as i64),
        });
        candles
    }

    /// Indicator set with only the last two bars defined
    pub fn indicators_at_end(
        n: usize,
        macd: (f64, f64),
        signal: (f64, f64),
        rsi: f64,
        volume_ma: f64,
    ) -> IndicatorSet {
        let mut set = IndicatorSet {
            ema_fast: vec![None; n],
            ema_slow: vec![None; n],
            macd: vec![None; n],
            macd_signal: vec![None; n],
            histogram: vec![None; n],
            rsi: vec![None; n],
            volume_ma: vec![None; n],
            atr: vec![None; n],
        };
        set.macd[n - 2] = Some(macd.0);
        set.macd[n - 1] = Some(macd.1);
        set.macd_signal[n - 2] = Some(signal.0);
        set.macd_signal[n - 1] = Some(signal.1);
        set.histogram[n - 1] = Some(macd.1 - signal.1);
        set.rsi[n - 1] = Some(rsi);
        set.volume_ma[n - 1] = Some(volume_ma);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_strategy_by_kind() {
        let crossover = build_strategy(&StrategyConfig::default());
        assert_eq!(crossover.name(), "MacdCrossoverStrategy");

        let momentum = build_strategy(&StrategyConfig {
            kind: StrategyKind::MacdMomentum,
            ..Default::default()
        });
        assert_eq!(momentum.name(), "MacdMomentumStrategy");
        assert_eq!(momentum.min_candles_required(), 35);
    }

    #[test]
    fn test_ready_to_evaluate_guards() {
        let now = test_support::base_time();
        let candles = test_support::candles_with_last(40, (100.0, 101.0, 99.9, 100.9, 2000.0));
        let set = test_support::indicators_at_end(40, (0.1, 0.3), (0.2, 0.2), 60.0, 1000.0);

        assert!(ready_to_evaluate(&candles, &set, None, now, 35));
        assert!(!ready_to_evaluate(&candles, &set, Some(now + chrono::Duration::seconds(1)), now, 35));
        assert!(ready_to_evaluate(&candles, &set, Some(now), now, 35));
        assert!(!ready_to_evaluate(&candles[..34], &set, None, now, 35));
    }
}

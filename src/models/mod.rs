use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV candlestick (kline) for one fixed-duration bar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: DateTime<Utc>,
}

impl Candle {
    /// Absolute open-to-close distance
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// High-to-low spread
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// A bar is closed once its close time is no later than `now`
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.close_time <= now
    }
}

/// Trading signal, recomputed every cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    None,
}

impl Signal {
    /// Position side an entry on this signal opens
    pub fn entry_side(&self) -> Option<PositionSide> {
        match self {
            Signal::Buy => Some(PositionSide::Long),
            Signal::Sell => Some(PositionSide::Short),
            Signal::None => None,
        }
    }
}

/// Direction of a futures position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PositionSide {
    Long,
    Short,
    #[default]
    Flat,
}

impl PositionSide {
    /// Order side that opens a position in this direction
    pub fn entry_order_side(&self) -> Option<OrderSide> {
        match self {
            PositionSide::Long => Some(OrderSide::Buy),
            PositionSide::Short => Some(OrderSide::Sell),
            PositionSide::Flat => None,
        }
    }

    /// Order side that reduces a position in this direction
    pub fn exit_order_side(&self) -> Option<OrderSide> {
        match self {
            PositionSide::Long => Some(OrderSide::Sell),
            PositionSide::Short => Some(OrderSide::Buy),
            PositionSide::Flat => None,
        }
    }
}

/// Side of a market order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Minimum tradable increment for an instrument
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LotSizeSpec {
    pub step_size: Decimal,
}

impl LotSizeSpec {
    pub fn new(step_size: Decimal) -> Self {
        Self { step_size }
    }

    /// Decimal places a quantity is formatted with
    ///
    /// Equals `round(-log10(step_size))` for the power-of-ten steps exchanges
    /// publish (0.001 -> 3, 1 -> 0); for other steps it is the step's own
    /// scale so multiples stay representable (0.5 -> 1).
    pub fn precision(&self) -> u32 {
        self.step_size.normalize().scale()
    }

    /// Largest multiple of the step that does not exceed `quantity`
    pub fn floor_to_step(&self, quantity: Decimal) -> Decimal {
        if self.step_size <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let steps = (quantity / self.step_size).floor();
        (steps * self.step_size).round_dp(self.precision())
    }

    /// Whether `quantity` is an exact multiple of the step
    pub fn is_aligned(&self, quantity: Decimal) -> bool {
        self.step_size > Decimal::ZERO && (quantity % self.step_size).is_zero()
    }
}

/// Result of a market order submission
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub filled: bool,
    pub execution_price: Option<Decimal>,
    /// Quantity the exchange reports as executed, when it reports one
    pub executed_quantity: Option<Decimal>,
}

impl OrderFill {
    /// Executed quantity, falling back to `requested` when none was reported
    pub fn filled_quantity(&self, requested: Decimal) -> Decimal {
        self.executed_quantity
            .filter(|q| *q > Decimal::ZERO)
            .map_or(requested, |q| q.min(requested))
    }
}

/// Position as reported by the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangePosition {
    pub is_open: bool,
    pub quantity: Decimal,
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub unrealized_pnl_pct: f64,
}

impl ExchangePosition {
    pub fn flat() -> Self {
        Self {
            is_open: false,
            quantity: Decimal::ZERO,
            side: PositionSide::Flat,
            entry_price: Decimal::ZERO,
            unrealized_pnl_pct: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_candle_shape() {
        let open_time = Utc::now();
        let candle = Candle {
            open_time,
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 108.0,
            volume: 1000.0,
            close_time: open_time + Duration::seconds(59),
        };

        assert_eq!(candle.body(), 8.0);
        assert_eq!(candle.range(), 15.0);
        assert!(!candle.is_closed_at(open_time));
        assert!(candle.is_closed_at(open_time + Duration::minutes(1)));
    }

    #[test]
    fn test_signal_entry_side() {
        assert_eq!(Signal::Buy.entry_side(), Some(PositionSide::Long));
        assert_eq!(Signal::Sell.entry_side(), Some(PositionSide::Short));
        assert_eq!(Signal::None.entry_side(), None);
    }

    #[test]
    fn test_exit_side_mirrors_entry() {
        assert_eq!(PositionSide::Long.exit_order_side(), Some(OrderSide::Sell));
        assert_eq!(PositionSide::Short.exit_order_side(), Some(OrderSide::Buy));
        assert_eq!(PositionSide::Flat.exit_order_side(), None);
    }

    #[test]
    fn test_lot_size_precision() {
        assert_eq!(LotSizeSpec::new(dec("0.001")).precision(), 3);
        assert_eq!(LotSizeSpec::new(dec("0.1")).precision(), 1);
        assert_eq!(LotSizeSpec::new(dec("1")).precision(), 0);
        assert_eq!(LotSizeSpec::new(dec("0.0100")).precision(), 2);
    }

    #[test]
    fn test_floor_to_step() {
        let lot = LotSizeSpec::new(dec("0.1"));
        assert_eq!(lot.floor_to_step(dec("123.456")), dec("123.4"));
        assert!(lot.is_aligned(lot.floor_to_step(dec("123.456"))));
        assert_eq!(lot.floor_to_step(dec("0.05")), Decimal::ZERO);
    }
}

use rust_decimal::Decimal;

use crate::error::BotError;
use crate::models::LotSizeSpec;

/// Converts available margin into an exchange-aligned order quantity
#[derive(Debug, Clone)]
pub struct PositionSizer {
    utilization: Decimal,
    leverage: Decimal,
}

impl PositionSizer {
    /// # Arguments
    /// * `utilization` - Fraction of the balance committed as margin (e.g. 0.95)
    /// * `leverage` - Futures leverage multiplier
    pub fn new(utilization: Decimal, leverage: Decimal) -> Self {
        Self {
            utilization,
            leverage,
        }
    }

    /// Unrounded quantity: `balance * utilization * leverage / price`
    pub fn raw_quantity(&self, balance: Decimal, price: Decimal) -> Decimal {
        if price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        balance * self.utilization * self.leverage / price
    }

    /// Size an entry order
    ///
    /// Floors the raw quantity to a multiple of the step. Fails with
    /// `InsufficientQuantity` when the raw quantity is below one step.
    pub fn size(
        &self,
        symbol: &str,
        balance: Decimal,
        price: Decimal,
        lot: &LotSizeSpec,
    ) -> Result<Decimal, BotError> {
        let raw = self.raw_quantity(balance, price);

        if raw < lot.step_size || lot.step_size <= Decimal::ZERO {
            return Err(BotError::InsufficientQuantity {
                symbol: symbol.to_string(),
                raw: raw.round_dp(8).to_string(),
                step: lot.step_size.to_string(),
            });
        }

        let quantity = lot.floor_to_step(raw);

        tracing::debug!(
            "Sized {}: raw {} -> {} (step {})",
            symbol,
            raw.round_dp(8),
            quantity,
            lot.step_size
        );

        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_aligned_quantity_is_kept() {
        let sizer = PositionSizer::new(dec("0.9"), dec("20"));
        let lot = LotSizeSpec::new(dec("0.01"));

        assert_eq!(sizer.raw_quantity(dec("1000"), dec("50")), dec("360"));

        let quantity = sizer.size("XRPUSDT", dec("1000"), dec("50"), &lot).unwrap();
        assert_eq!(quantity, dec("360.00"));
        assert_eq!(quantity.to_string(), "360.00");
    }

    #[test]
    fn test_quantity_is_floored_to_step() {
        let sizer = PositionSizer::new(dec("0.95"), dec("20"));
        let lot = LotSizeSpec::new(dec("0.1"));

        // 123.45 * 0.95 * 20 / 2.6 = 902.1346...
        let raw = sizer.raw_quantity(dec("123.45"), dec("2.6"));
        let quantity = sizer.size("XRPUSDT", dec("123.45"), dec("2.6"), &lot).unwrap();

        assert_eq!(quantity, dec("902.1"));
        assert!(quantity <= raw);
        assert!(lot.is_aligned(quantity));
    }

    #[test]
    fn test_insufficient_quantity() {
        let sizer = PositionSizer::new(dec("0.95"), dec("20"));
        let lot = LotSizeSpec::new(dec("0.001"));

        let result = sizer.size("BTCUSDT", dec("1"), dec("60000"), &lot);
        assert!(matches!(result, Err(BotError::InsufficientQuantity { .. })));
    }

    #[test]
    fn test_sized_quantity_invariants() {
        let sizer = PositionSizer::new(dec("0.93"), dec("7"));
        let steps = ["0.001", "0.01", "0.1", "1", "0.5"];
        let balances = ["12.5", "99.99", "1000", "4321.77"];
        let prices = ["0.5123", "2.61", "101.3", "2500"];

        for step in steps {
            let lot = LotSizeSpec::new(dec(step));
            for balance in balances {
                for price in prices {
                    let raw = sizer.raw_quantity(dec(balance), dec(price));
                    match sizer.size("TEST", dec(balance), dec(price), &lot) {
                        Ok(quantity) => {
                            assert!(quantity > Decimal::ZERO);
                            assert!(quantity <= raw);
                            assert!(lot.is_aligned(quantity));
                            assert!(raw - quantity < lot.step_size);
                        }
                        Err(_) => assert!(raw < lot.step_size),
                    }
                }
            }
        }
    }
}

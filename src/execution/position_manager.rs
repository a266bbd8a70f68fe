use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::{ExchangePosition, PositionSide};

/// Leveraged PnL thresholds, all in percent
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiskThresholds {
    pub take_profit_pct: f64,
    /// Negative, e.g. -5.0
    pub stop_loss_pct: f64,
    pub trailing_activation_pct: f64,
    pub trailing_drawdown_pct: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            take_profit_pct: 3.0,
            stop_loss_pct: -5.0,
            trailing_activation_pct: 3.0,
            trailing_drawdown_pct: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    TakeProfit,
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::TakeProfit => "TAKE_PROFIT",
        }
    }
}

/// Exit condition hit this cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    pub reason: ExitReason,
    pub pnl_pct: f64,
    pub max_favorable_pnl_pct: f64,
}

/// An open futures position
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: PositionSide,
    pub entry_price: f64,
    pub quantity: Decimal,
    pub max_favorable_pnl_pct: f64,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Open(Position),
}

/// Leveraged PnL percent of a move from `entry` to `current`
///
/// Long: `(current - entry) / entry`, Short: `(entry - current) / entry`,
/// scaled by leverage and 100. Flat positions have no PnL.
pub fn pnl_percent(side: PositionSide, entry: f64, current: f64, leverage: f64) -> f64 {
    if entry <= 0.0 {
        return 0.0;
    }
    let diff = match side {
        PositionSide::Long => current - entry,
        PositionSide::Short => entry - current,
        PositionSide::Flat => return 0.0,
    };
    diff * leverage * 100.0 / entry
}

/// Position and cooldown state machine for one instrument
///
/// Flat -> Open on a filled entry order, Open -> Flat on a filled
/// reduce-only close. Failed orders leave the state untouched.
#[derive(Debug, Clone)]
pub struct PositionManager {
    symbol: String,
    leverage: f64,
    thresholds: RiskThresholds,
    state: PositionState,
    cooldown_until: Option<DateTime<Utc>>,
}

impl PositionManager {
    pub fn new(symbol: impl Into<String>, leverage: f64, thresholds: RiskThresholds) -> Self {
        Self {
            symbol: symbol.into(),
            leverage,
            thresholds,
            state: PositionState::Flat,
            cooldown_until: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            PositionState::Open(position) => Some(position),
            PositionState::Flat => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, PositionState::Open(_))
    }

    pub fn side(&self) -> PositionSide {
        self.position().map_or(PositionSide::Flat, |p| p.side)
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.cooldown_until
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    pub fn arm_cooldown(&mut self, now: DateTime<Utc>, duration: Duration) {
        self.cooldown_until = Some(now + duration);
    }

    /// Record a filled entry order (Flat -> Open)
    pub fn open_position(
        &mut self,
        side: PositionSide,
        entry_price: f64,
        quantity: Decimal,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if self.is_open() {
            anyhow::bail!("Already have open position for {}", self.symbol);
        }
        if side == PositionSide::Flat {
            anyhow::bail!("Cannot open a flat position for {}", self.symbol);
        }
        if quantity <= Decimal::ZERO || entry_price <= 0.0 {
            anyhow::bail!(
                "Invalid entry for {}: qty {} @ {}",
                self.symbol,
                quantity,
                entry_price
            );
        }

        self.state = PositionState::Open(Position {
            side,
            entry_price,
            quantity,
            max_favorable_pnl_pct: 0.0,
            opened_at: now,
        });

        tracing::info!(
            "Opened {:?} {} qty {} @ {:.6}",
            side,
            self.symbol,
            quantity,
            entry_price
        );

        Ok(())
    }

    /// Current leveraged PnL percent, None when flat
    pub fn pnl_percent(&self, current_price: f64) -> Option<f64> {
        self.position()
            .map(|p| pnl_percent(p.side, p.entry_price, current_price, self.leverage))
    }

    /// Update the high-water mark and check exit conditions
    ///
    /// Priority: stop-loss, trailing stop, take-profit. Returns None while
    /// flat or when no condition is met.
    pub fn evaluate(&mut self, current_price: f64) -> Option<ExitSignal> {
        let leverage = self.leverage;
        let thresholds = self.thresholds.clone();

        let PositionState::Open(position) = &mut self.state else {
            return None;
        };

        let pnl = pnl_percent(position.side, position.entry_price, current_price, leverage);
        position.max_favorable_pnl_pct = position.max_favorable_pnl_pct.max(pnl);
        let max_favorable = position.max_favorable_pnl_pct;

        let reason = if pnl <= thresholds.stop_loss_pct {
            Some(ExitReason::StopLoss)
        } else if max_favorable >= thresholds.trailing_activation_pct
            && pnl <= max_favorable - thresholds.trailing_drawdown_pct
        {
            Some(ExitReason::TrailingStop)
        } else if pnl >= thresholds.take_profit_pct {
            Some(ExitReason::TakeProfit)
        } else {
            None
        };

        reason.map(|reason| ExitSignal {
            reason,
            pnl_pct: pnl,
            max_favorable_pnl_pct: max_favorable,
        })
    }

    /// Record a filled close order (Open -> Flat) and arm the cooldown
    pub fn close_position(
        &mut self,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> anyhow::Result<Position> {
        let PositionState::Open(position) = std::mem::take(&mut self.state) else {
            anyhow::bail!("No open position for {}", self.symbol);
        };

        self.arm_cooldown(now, cooldown);

        tracing::info!(
            "Closed {:?} {} qty {} (cooldown until {})",
            position.side,
            self.symbol,
            position.quantity,
            now + cooldown
        );

        Ok(position)
    }

    /// Record a partially filled close; returns the quantity still open
    pub fn reduce_quantity(&mut self, closed: Decimal) -> anyhow::Result<Decimal> {
        let PositionState::Open(position) = &mut self.state else {
            anyhow::bail!("No open position for {}", self.symbol);
        };
        if closed <= Decimal::ZERO || closed >= position.quantity {
            anyhow::bail!(
                "Partial close of {} for {} must be below open qty {}",
                closed,
                self.symbol,
                position.quantity
            );
        }

        position.quantity -= closed;
        Ok(position.quantity)
    }

    /// Seed state from the exchange's view of the position (after a restart)
    ///
    /// The high-water mark starts from the current PnL.
    pub fn restore(&mut self, exchange: &ExchangePosition, mark_price: f64, now: DateTime<Utc>) {
        if !exchange.is_open || exchange.side == PositionSide::Flat {
            self.state = PositionState::Flat;
            return;
        }

        let entry_price = exchange.entry_price.to_f64().unwrap_or(0.0);
        if entry_price <= 0.0 || exchange.quantity <= Decimal::ZERO {
            tracing::warn!(
                "Ignoring exchange position for {} with entry {} qty {}",
                self.symbol,
                exchange.entry_price,
                exchange.quantity
            );
            self.state = PositionState::Flat;
            return;
        }

        let current_pnl = pnl_percent(exchange.side, entry_price, mark_price, self.leverage);

        self.state = PositionState::Open(Position {
            side: exchange.side,
            entry_price,
            quantity: exchange.quantity,
            max_favorable_pnl_pct: current_pnl,
            opened_at: now,
        });

        tracing::info!(
            "Restored {:?} {} qty {} @ {:.6} (PnL {:.2}%)",
            exchange.side,
            self.symbol,
            exchange.quantity,
            entry_price,
            current_pnl
        );
    }
}

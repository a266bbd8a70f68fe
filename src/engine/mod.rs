// Scheduler: one cooperative loop over every configured instrument
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;

use crate::api::ExchangeGateway;
use crate::error::BotError;
use crate::execution::{
    CandleBuffer, ExitReason, ExitSignal, PositionManager, PositionSizer, PositionState,
};
use crate::indicators::{IndicatorConfig, IndicatorSet};
use crate::journal::{TradeAction, TradeJournal, TradeRecord};
use crate::models::{Candle, LotSizeSpec, PositionSide, Signal};
use crate::notify::{format_entry, format_exit, EntryReport, Notifier};
use crate::settings::{BotConfig, InstrumentConfig, MAX_COOLDOWN_SECS};
use crate::strategy::{build_strategy, Strategy};

/// Per-instrument state owned by the engine
#[derive(Debug)]
pub struct InstrumentState {
    pub buffer: CandleBuffer,
    pub position: PositionManager,
    pub lot: LotSizeSpec,
    pub last_price: Option<f64>,
    /// Position state has been seeded from the exchange
    pub reconciled: bool,
}

/// What one instrument did in a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    /// No candles yet
    NoData,
    /// Flat, strategy returned no signal
    Idle,
    /// Entry order filled
    Entered(PositionSide),
    /// Entry order accepted but not filled; still flat
    EntryNotFilled,
    /// Open, no exit condition met
    Holding,
    /// Close order filled
    Exited(ExitReason),
    /// Close order accepted but not filled; still open
    ExitNotFilled(ExitReason),
    /// Instrument skipped for this cycle
    Skipped(String),
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub outcomes: Vec<(String, InstrumentOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, symbol: &str) -> Option<&InstrumentOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, outcome)| outcome)
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, InstrumentOutcome::Skipped(_)))
            .count()
    }
}

pub struct TradingEngine {
    gateway: Arc<dyn ExchangeGateway>,
    notifier: Arc<dyn Notifier>,
    journal: Arc<dyn TradeJournal>,
    strategy: Box<dyn Strategy>,
    sizer: PositionSizer,
    config: BotConfig,
    indicator_config: IndicatorConfig,
    cooldown: Duration,
    order: Vec<String>,
    instruments: HashMap<String, InstrumentState>,
}

impl TradingEngine {
    pub fn new(
        config: BotConfig,
        gateway: Arc<dyn ExchangeGateway>,
        notifier: Arc<dyn Notifier>,
        journal: Arc<dyn TradeJournal>,
    ) -> Self {
        let strategy = build_strategy(&config.strategy);
        let sizer = PositionSizer::new(
            config.trading.utilization,
            Decimal::from(config.trading.leverage),
        );
        let cooldown_secs = config.trading.cooldown_secs.min(MAX_COOLDOWN_SECS);
        let cooldown = Duration::seconds(i64::try_from(cooldown_secs).unwrap_or(0));

        Self {
            gateway,
            notifier,
            journal,
            strategy,
            sizer,
            indicator_config: config.strategy.indicators.clone(),
            cooldown,
            config,
            order: Vec::new(),
            instruments: HashMap::new(),
        }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentState> {
        self.instruments.get(symbol)
    }

    pub fn symbols(&self) -> &[String] {
        &self.order
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Register all configured instruments, set leverage, reconcile positions
    pub async fn bootstrap(&mut self, now: DateTime<Utc>) -> Result<(), BotError> {
        let instruments = self.config.trading.instruments.clone();
        for instrument in &instruments {
            self.add_instrument(instrument).await?;
        }

        for symbol in self.order.clone() {
            if let Err(e) = self
                .gateway
                .set_leverage(&symbol, self.config.trading.leverage)
                .await
            {
                tracing::warn!("⚠️  {}: failed to set leverage: {}", symbol, e);
            }
        }

        self.reconcile(now).await;
        Ok(())
    }

    /// Add one instrument; the lot filter comes from config or the exchange
    pub async fn add_instrument(&mut self, instrument: &InstrumentConfig) -> Result<(), BotError> {
        let symbol = instrument.symbol.clone();
        if self.instruments.contains_key(&symbol) {
            return Err(BotError::Configuration(format!(
                "instrument {} configured twice",
                symbol
            )));
        }

        let lot = match instrument.step_size {
            Some(step) => LotSizeSpec::new(step),
            None => self.gateway.fetch_lot_size(&symbol).await?,
        };

        let trading = &self.config.trading;
        let state = InstrumentState {
            buffer: CandleBuffer::new(&symbol, trading.candle_limit, trading.bar_mode),
            position: PositionManager::new(
                &symbol,
                f64::from(trading.leverage),
                self.config.risk.clone(),
            ),
            lot,
            last_price: None,
            reconciled: false,
        };

        tracing::info!(
            "  - {} (step {}, precision {})",
            symbol,
            lot.step_size,
            lot.precision()
        );

        self.order.push(symbol.clone());
        self.instruments.insert(symbol, state);
        Ok(())
    }

    /// Seed each position machine from the exchange's open position
    pub async fn reconcile(&mut self, now: DateTime<Utc>) {
        for symbol in self.order.clone() {
            let Some(mut state) = self.instruments.remove(&symbol) else {
                continue;
            };

            if let Err(e) = self.reconcile_instrument(&mut state, now).await {
                tracing::warn!(
                    "⚠️  {}: reconciliation failed, not trading until it succeeds: {}",
                    symbol,
                    e
                );
            }

            self.instruments.insert(symbol, state);
        }
    }

    async fn reconcile_instrument(
        &self,
        state: &mut InstrumentState,
        now: DateTime<Utc>,
    ) -> Result<(), BotError> {
        let symbol = state.buffer.symbol().to_string();
        let exchange = self.gateway.fetch_open_position(&symbol).await?;

        if !exchange.is_open {
            tracing::info!("  {} flat on exchange", symbol);
            state.reconciled = true;
            return Ok(());
        }

        let mark = decimal_to_f64(self.gateway.fetch_mark_price(&symbol).await?)?;
        state.position.restore(&exchange, mark, now);
        state.last_price = Some(mark);
        state.reconciled = true;
        Ok(())
    }

    // ========================================================================
    // Cycle
    // ========================================================================

    /// Loop forever at the configured cadence; a slow cycle skips missed ticks
    pub async fn run(&mut self) {
        let period = std::time::Duration::from_secs(self.config.trading.cycle_secs);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.run_cycle(Utc::now()).await;
        }
    }

    /// Process every instrument once, sequentially
    ///
    /// Errors are caught at the instrument boundary: the instrument is
    /// skipped for this cycle and its state is left as it was.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        tracing::info!("💹 [CYCLE] Tick at {}", now.format("%H:%M:%S"));
        let mut report = CycleReport::default();

        for symbol in self.order.clone() {
            let Some(mut state) = self.instruments.remove(&symbol) else {
                continue;
            };

            let outcome = match self.process_instrument(&mut state, now).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    match &e {
                        BotError::InsufficientQuantity { .. } => {
                            tracing::warn!("❌ {}: {}, waiting", symbol, e)
                        }
                        BotError::OrderRejected { .. } => {
                            tracing::error!("❌ {}: {}", symbol, e)
                        }
                        _ => tracing::warn!("⚠️  {}: skipped this cycle: {}", symbol, e),
                    }
                    InstrumentOutcome::Skipped(e.to_string())
                }
            };

            self.instruments.insert(symbol.clone(), state);
            report.outcomes.push((symbol, outcome));
        }

        self.log_cycle_summary(now);
        report
    }

    async fn process_instrument(
        &self,
        state: &mut InstrumentState,
        now: DateTime<Utc>,
    ) -> Result<InstrumentOutcome, BotError> {
        let symbol = state.buffer.symbol().to_string();
        let trading = &self.config.trading;

        if !state.reconciled {
            self.reconcile_instrument(state, now).await?;
            tracing::info!("✅ {} reconciled", symbol);
        }

        let fetched = self
            .gateway
            .fetch_candles(&symbol, &trading.interval, trading.candle_limit)
            .await?;
        let stats = state.buffer.ingest(fetched, now);
        tracing::debug!("{}: ingest {:?}", symbol, stats);

        let candles = state.buffer.candles();
        if candles.is_empty() {
            return Ok(InstrumentOutcome::NoData);
        }

        let mark = self.gateway.fetch_mark_price(&symbol).await?;
        let price = decimal_to_f64(mark)?;
        state.last_price = Some(price);

        if state.position.is_open() {
            return self.manage_open_position(state, price, now).await;
        }

        let indicators = IndicatorSet::compute(&candles, &self.indicator_config);
        tracing::debug!("{}: {:?}", symbol, indicators.snapshot());

        let signal = self.strategy.evaluate(
            &candles,
            &indicators,
            state.position.cooldown_until(),
            now,
        );

        let Some(side) = signal.entry_side() else {
            tracing::info!("⚪ {} @ {:.4}: no signal", symbol, price);
            return Ok(InstrumentOutcome::Idle);
        };

        self.enter_position(state, signal, side, mark, &candles, &indicators, now)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn enter_position(
        &self,
        state: &mut InstrumentState,
        signal: Signal,
        side: PositionSide,
        mark: Decimal,
        candles: &[Candle],
        indicators: &IndicatorSet,
        now: DateTime<Utc>,
    ) -> Result<InstrumentOutcome, BotError> {
        let symbol = state.buffer.symbol().to_string();
        let trading = &self.config.trading;

        let balance = self.gateway.fetch_available_balance().await?;
        let quantity = self.sizer.size(&symbol, balance, mark, &state.lot)?;

        let Some(order_side) = side.entry_order_side() else {
            return Ok(InstrumentOutcome::Idle);
        };

        tracing::info!(
            "📈 {:?} signal on {}: {} qty {} @ ~{} ({}x, balance {})",
            signal,
            symbol,
            order_side.as_str(),
            quantity,
            mark,
            trading.leverage,
            balance.round_dp(2)
        );

        let fill = self
            .gateway
            .place_market_order(&symbol, order_side, quantity, false)
            .await?;

        if !fill.filled {
            tracing::warn!("❌ {}: entry order not filled, staying flat", symbol);
            return Ok(InstrumentOutcome::EntryNotFilled);
        }

        let entry_price = match fill.execution_price {
            Some(p) => decimal_to_f64(p)?,
            None => decimal_to_f64(mark)?,
        };
        let quantity = fill.filled_quantity(quantity);

        if let Err(e) = state.position.open_position(side, entry_price, quantity, now) {
            tracing::error!("{}: {}", symbol, e);
            return Ok(InstrumentOutcome::Idle);
        }
        state.position.arm_cooldown(now, self.cooldown);

        if let Some(action) = TradeAction::entry(side) {
            self.record_trade(&symbol, action, quantity, entry_price, balance, now);
        }

        let report = EntryReport {
            symbol: &symbol,
            side,
            interval: &trading.interval,
            quantity,
            entry_price,
            leverage: trading.leverage,
            balance,
            volume: candles.last().map_or(0.0, |c| c.volume),
            indicators: indicators.snapshot(),
        };
        self.notify(&format_entry(&report)).await;

        Ok(InstrumentOutcome::Entered(side))
    }

    async fn manage_open_position(
        &self,
        state: &mut InstrumentState,
        price: f64,
        now: DateTime<Utc>,
    ) -> Result<InstrumentOutcome, BotError> {
        let symbol = state.buffer.symbol().to_string();

        let Some(exit) = state.position.evaluate(price) else {
            if let Some(pnl) = state.position.pnl_percent(price) {
                tracing::info!("📊 {} in position: PnL {:+.2}%", symbol, pnl);
            }
            return Ok(InstrumentOutcome::Holding);
        };

        let Some(position) = state.position.position().cloned() else {
            return Ok(InstrumentOutcome::Idle);
        };
        let Some(order_side) = position.side.exit_order_side() else {
            return Ok(InstrumentOutcome::Idle);
        };

        tracing::info!(
            "🎯 {} on {}: PnL {:+.2}% (peak {:+.2}%), closing {}",
            exit.reason.label(),
            symbol,
            exit.pnl_pct,
            exit.max_favorable_pnl_pct,
            position.quantity
        );

        let fill = self
            .gateway
            .place_market_order(&symbol, order_side, position.quantity, true)
            .await?;

        if !fill.filled {
            tracing::error!("❌ {}: close order not filled, position stays open", symbol);
            return Ok(InstrumentOutcome::ExitNotFilled(exit.reason));
        }

        let exit_price = match fill.execution_price {
            Some(p) => decimal_to_f64(p)?,
            None => price,
        };
        let closed = fill.filled_quantity(position.quantity);

        if closed < position.quantity {
            match state.position.reduce_quantity(closed) {
                Ok(remaining) => tracing::warn!(
                    "⚠️  {}: close partially filled ({} of {}), {} still open",
                    symbol,
                    closed,
                    position.quantity,
                    remaining
                ),
                Err(e) => tracing::error!("{}: {}", symbol, e),
            }
            self.record_trade(
                &symbol,
                TradeAction::from(exit.reason),
                closed,
                exit_price,
                Decimal::ZERO,
                now,
            );
            return Ok(InstrumentOutcome::ExitNotFilled(exit.reason));
        }

        if let Err(e) = state.position.close_position(now, self.cooldown) {
            tracing::error!("{}: {}", symbol, e);
        }

        let balance = match self.gateway.fetch_available_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!("{}: balance unavailable for journal: {}", symbol, e);
                Decimal::ZERO
            }
        };

        self.record_trade(
            &symbol,
            TradeAction::from(exit.reason),
            position.quantity,
            exit_price,
            balance,
            now,
        );
        self.notify_exit(&symbol, position.side, &exit, exit_price).await;

        Ok(InstrumentOutcome::Exited(exit.reason))
    }

    // ========================================================================
    // Side effects (best effort)
    // ========================================================================

    async fn notify(&self, text: &str) {
        if let Err(e) = self.notifier.send_message(text).await {
            tracing::warn!("Notification failed: {}", e);
        }
    }

    async fn notify_exit(&self, symbol: &str, side: PositionSide, exit: &ExitSignal, price: f64) {
        self.notify(&format_exit(symbol, side, exit, price)).await;
    }

    fn record_trade(
        &self,
        symbol: &str,
        action: TradeAction,
        quantity: Decimal,
        price: f64,
        balance: Decimal,
        now: DateTime<Utc>,
    ) {
        let record = TradeRecord {
            timestamp: now,
            symbol: symbol.to_string(),
            action,
            quantity,
            price,
            balance,
        };
        if let Err(e) = self.journal.append_record(&record) {
            tracing::warn!("Failed to journal {} {}: {}", action.as_str(), symbol, e);
        }
    }

    fn log_cycle_summary(&self, now: DateTime<Utc>) {
        tracing::info!("\n📊 Cycle summary:");
        for symbol in &self.order {
            let Some(state) = self.instruments.get(symbol) else {
                continue;
            };
            tracing::info!("  {}", summary_line(symbol, state, now));
        }
    }
}

fn summary_line(symbol: &str, state: &InstrumentState, now: DateTime<Utc>) -> String {
    let price = state
        .last_price
        .map_or_else(|| "n/a".to_string(), |p| format!("{:.4}", p));

    let mut line = match state.position.state() {
        PositionState::Flat => format!("{} | FLAT | price {}", symbol, price),
        PositionState::Open(position) => {
            let pnl = state
                .last_price
                .and_then(|p| state.position.pnl_percent(p))
                .unwrap_or(0.0);
            format!(
                "{} | {:?} {} @ {:.4} | price {} | PnL {:+.2}% (peak {:+.2}%)",
                symbol,
                position.side,
                position.quantity,
                position.entry_price,
                price,
                pnl,
                position.max_favorable_pnl_pct
            )
        }
    };

    if let Some(until) = state.position.cooldown_until().filter(|u| *u > now) {
        line.push_str(&format!(" | cooldown {}s", (until - now).num_seconds()));
    }
    line
}

fn decimal_to_f64(value: Decimal) -> Result<f64, BotError> {
    value
        .to_f64()
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| BotError::MalformedResponse(format!("unusable price {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{BarMode, RiskThresholds};
    use chrono::TimeZone;

    fn state(symbol: &str) -> InstrumentState {
        InstrumentState {
            buffer: CandleBuffer::new(symbol, 100, BarMode::Partial),
            position: PositionManager::new(symbol, 20.0, RiskThresholds::default()),
            lot: LotSizeSpec::new(Decimal::new(1, 1)),
            last_price: None,
            reconciled: true,
        }
    }

    #[test]
    fn test_summary_line_flat_without_price() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let line = summary_line("XRPUSDT", &state("XRPUSDT"), now);
        assert_eq!(line, "XRPUSDT | FLAT | price n/a");
    }

    #[test]
    fn test_summary_line_open_with_cooldown() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut state = state("XRPUSDT");
        state
            .position
            .open_position(PositionSide::Long, 100.0, Decimal::new(10, 0), now)
            .unwrap();
        state.position.arm_cooldown(now, Duration::seconds(300));
        state.last_price = Some(101.0);

        let line = summary_line("XRPUSDT", &state, now + Duration::seconds(60));
        assert!(line.starts_with("XRPUSDT | Long 10 @ 100.0000 | price 101.0000"));
        assert!(line.contains("PnL +20.00%"));
        assert!(line.ends_with("| cooldown 240s"));
    }
}

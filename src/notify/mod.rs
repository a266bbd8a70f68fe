// Operator notifications (best effort, never block trading)
pub mod telegram;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::BotError;
use crate::execution::ExitSignal;
use crate::indicators::IndicatorSnapshot;
use crate::models::PositionSide;

pub use telegram::TelegramNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<(), BotError>;
}

/// Fallback when no chat is configured: messages go to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, text: &str) -> Result<(), BotError> {
        tracing::info!("📣 {}", text.replace('\n', " | "));
        Ok(())
    }
}

/// Everything shown to the operator when a position is opened
#[derive(Debug, Clone)]
pub struct EntryReport<'a> {
    pub symbol: &'a str,
    pub side: PositionSide,
    pub interval: &'a str,
    pub quantity: Decimal,
    pub entry_price: f64,
    pub leverage: u32,
    pub balance: Decimal,
    pub volume: f64,
    pub indicators: IndicatorSnapshot,
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.*}", decimals, v))
}

pub fn format_entry(report: &EntryReport<'_>) -> String {
    let headline = match report.side {
        PositionSide::Long => "🟢 LONG",
        PositionSide::Short => "🔴 SHORT",
        PositionSide::Flat => "⚪ FLAT",
    };
    let ind = &report.indicators;

    format!(
        "{} {} | qty {} | {}x\n\n\
         📊 Indicators:\n\
         - MACD: {} / {}\n\
         - RSI: {}\n\
         - Volume: {:.2} vs MA {}\n\
         - ATR: {}\n\n\
         💰 Entry price: {:.4}\n\
         🔁 Quantity: {}\n\
         ⚙️ Leverage: {}x\n\
         💼 Balance USDT: {:.2}\n\n\
         ⏱ Interval: {} | Symbol: {}",
        headline,
        report.symbol,
        report.quantity,
        report.leverage,
        fmt_opt(ind.macd, 4),
        fmt_opt(ind.macd_signal, 4),
        fmt_opt(ind.rsi, 2),
        report.volume,
        fmt_opt(ind.volume_ma, 2),
        fmt_opt(ind.atr, 4),
        report.entry_price,
        report.quantity,
        report.leverage,
        report.balance,
        report.interval,
        report.symbol,
    )
}

pub fn format_exit(symbol: &str, side: PositionSide, exit: &ExitSignal, price: f64) -> String {
    let icon = if exit.pnl_pct >= 0.0 { "🎯" } else { "⚠️" };
    format!(
        "{} {} {} {:?} @ {:.4} | PnL {:+.2}% (peak {:+.2}%)",
        icon,
        exit.reason.label(),
        symbol,
        side,
        price,
        exit.pnl_pct,
        exit.max_favorable_pnl_pct
    )
}

// Exchange access: the gateway capability the engine trades through
pub mod binance;
pub mod signature;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::BotError;
use crate::models::{Candle, ExchangePosition, LotSizeSpec, OrderFill, OrderSide};

pub use binance::BinanceFuturesClient;

/// Request/response access to a futures exchange
///
/// Every call may fail with a network-class error; callers treat those as
/// "skip this instrument for the cycle".
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Most recent `limit` klines, oldest first
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, BotError>;

    async fn fetch_mark_price(&self, symbol: &str) -> Result<Decimal, BotError>;

    /// Available margin in the quote asset (USDT)
    async fn fetch_available_balance(&self) -> Result<Decimal, BotError>;

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Result<OrderFill, BotError>;

    async fn fetch_open_position(&self, symbol: &str) -> Result<ExchangePosition, BotError>;

    async fn fetch_lot_size(&self, symbol: &str) -> Result<LotSizeSpec, BotError>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), BotError>;
}

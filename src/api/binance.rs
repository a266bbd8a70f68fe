use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::signature::{canonical_query, sign};
use super::ExchangeGateway;
use crate::error::BotError;
use crate::execution::pnl_percent;
use crate::models::{
    Candle, ExchangePosition, LotSizeSpec, OrderFill, OrderSide, PositionSide,
};
use crate::settings::{Credentials, ExchangeConfig};

const MAINNET_BASE_URL: &str = "https://fapi.binance.com";
const TESTNET_BASE_URL: &str = "https://testnet.binancefuture.com";
const QUOTE_ASSET: &str = "USDT";

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Client for Binance USDⓈ-M futures REST API
///
/// Signed endpoints carry `timestamp` + `recvWindow` and an HMAC-SHA256
/// signature of the query; all calls share one rate limiter.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    recv_window_ms: u64,
    rate_limiter: Arc<BinanceRateLimiter>,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

/// One kline row: open time, OHLCV as strings, close time, then fields we skip
#[derive(Debug, Deserialize)]
struct RawKline(
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndex {
    mark_price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceEntry {
    asset: String,
    available_balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    status: String,
    #[serde(default)]
    avg_price: Option<String>,
    #[serde(default)]
    executed_qty: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    symbol: String,
    position_amt: String,
    entry_price: String,
    mark_price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilter {
    filter_type: String,
    #[serde(default)]
    step_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeverageResponse {
    leverage: u32,
}

impl TryFrom<RawKline> for Candle {
    type Error = BotError;

    fn try_from(raw: RawKline) -> Result<Self, Self::Error> {
        Ok(Candle {
            open_time: parse_millis("openTime", raw.0)?,
            open: parse_price("open", &raw.1)?,
            high: parse_price("high", &raw.2)?,
            low: parse_price("low", &raw.3)?,
            close: parse_price("close", &raw.4)?,
            volume: parse_price("volume", &raw.5)?,
            close_time: parse_millis("closeTime", raw.6)?,
        })
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, BotError> {
    Decimal::from_str(value)
        .map_err(|_| BotError::MalformedResponse(format!("{} is not a decimal: {:?}", field, value)))
}

fn parse_price(field: &str, value: &str) -> Result<f64, BotError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| BotError::MalformedResponse(format!("{} is not a number: {:?}", field, value)))
}

fn parse_millis(field: &str, millis: i64) -> Result<DateTime<Utc>, BotError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| BotError::MalformedResponse(format!("{} out of range: {}", field, millis)))
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Query,
    Order,
}

/// Map status and body to a typed record or a taxonomy error
fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    kind: RequestKind,
) -> Result<T, BotError> {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::IM_A_TEAPOT
        || status.is_server_error()
    {
        return Err(BotError::TransientNetwork(format!(
            "HTTP {}: {}",
            status,
            snippet(body)
        )));
    }

    if let Ok(error) = serde_json::from_str::<ApiErrorBody>(body) {
        if error.code != 0 {
            return Err(match kind {
                RequestKind::Order => BotError::OrderRejected {
                    code: error.code,
                    message: error.msg,
                },
                RequestKind::Query => BotError::TransientNetwork(format!(
                    "API error {}: {}",
                    error.code, error.msg
                )),
            });
        }
    }

    if !status.is_success() {
        return Err(BotError::TransientNetwork(format!(
            "HTTP {}: {}",
            status,
            snippet(body)
        )));
    }

    serde_json::from_str(body)
        .map_err(|e| BotError::MalformedResponse(format!("{} in {}", e, snippet(body))))
}

// ============== Implementation ==============

impl BinanceFuturesClient {
    pub fn new(credentials: Credentials, config: &ExchangeConfig) -> Result<Self, BotError> {
        let base_url = config.base_url.clone().unwrap_or_else(|| {
            if config.testnet {
                TESTNET_BASE_URL.to_string()
            } else {
                MAINNET_BASE_URL.to_string()
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BotError::Configuration(format!("HTTP client: {}", e)))?;

        let per_minute = NonZeroU32::new(config.max_requests_per_minute).ok_or_else(|| {
            BotError::Configuration("max_requests_per_minute must be positive".into())
        })?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            recv_window_ms: config.recv_window_ms,
            rate_limiter,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        kind: RequestKind,
    ) -> Result<T, BotError> {
        self.rate_limiter.until_ready().await;

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        decode_response(status, &body, kind)
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, BotError> {
        let mut url = format!("{}{}", self.base_url, path);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&canonical_query(params)?);
        }
        self.execute(self.client.get(&url), RequestKind::Query).await
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
        kind: RequestKind,
    ) -> Result<T, BotError> {
        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));

        let query = canonical_query(&params)?;
        let signature = sign(&query, &self.credentials.api_secret)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);

        let request = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.credentials.api_key);

        self.execute(request, kind).await
    }
}

#[async_trait]
impl ExchangeGateway for BinanceFuturesClient {
    /// Endpoint: GET /fapi/v1/klines
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, BotError> {
        let rows: Vec<RawKline> = self
            .get_public(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.into_iter().map(Candle::try_from).collect()
    }

    /// Endpoint: GET /fapi/v1/premiumIndex
    async fn fetch_mark_price(&self, symbol: &str) -> Result<Decimal, BotError> {
        let index: PremiumIndex = self
            .get_public("/fapi/v1/premiumIndex", &[("symbol", symbol.to_string())])
            .await?;

        let price = parse_decimal("markPrice", &index.mark_price)?;
        if price <= Decimal::ZERO {
            return Err(BotError::MalformedResponse(format!(
                "non-positive mark price for {}: {}",
                symbol, price
            )));
        }
        Ok(price)
    }

    /// Endpoint: GET /fapi/v2/balance (signed)
    async fn fetch_available_balance(&self) -> Result<Decimal, BotError> {
        let balances: Vec<BalanceEntry> = self
            .send_signed(Method::GET, "/fapi/v2/balance", Vec::new(), RequestKind::Query)
            .await?;

        let entry = balances
            .iter()
            .find(|b| b.asset == QUOTE_ASSET)
            .ok_or_else(|| {
                BotError::MalformedResponse(format!("no {} entry in balance response", QUOTE_ASSET))
            })?;

        parse_decimal("availableBalance", &entry.available_balance)
    }

    /// Endpoint: POST /fapi/v1/order (signed)
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Result<OrderFill, BotError> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
            ("newOrderRespType", "RESULT".to_string()),
            ("newClientOrderId", format!("fb-{}", Uuid::new_v4().simple())),
        ];
        if reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }

        tracing::debug!(
            "Submitting MARKET {} {} qty {} (reduce_only={})",
            side.as_str(),
            symbol,
            quantity,
            reduce_only
        );

        let order: OrderResponse = self
            .send_signed(Method::POST, "/fapi/v1/order", params, RequestKind::Order)
            .await?;

        let executed_quantity = order
            .executed_qty
            .as_deref()
            .map(|q| parse_decimal("executedQty", q))
            .transpose()?;
        let executed = executed_quantity.unwrap_or(Decimal::ZERO);
        let execution_price = order
            .avg_price
            .as_deref()
            .map(|p| parse_decimal("avgPrice", p))
            .transpose()?
            .filter(|p| *p > Decimal::ZERO);

        let filled = order.status == "FILLED" || executed > Decimal::ZERO;

        tracing::info!(
            "📨 Order {} {} {}: status {} executed {} avg {:?}",
            order.order_id,
            side.as_str(),
            symbol,
            order.status,
            executed,
            execution_price
        );

        Ok(OrderFill {
            filled,
            execution_price,
            executed_quantity,
        })
    }

    /// Endpoint: GET /fapi/v2/positionRisk (signed)
    async fn fetch_open_position(&self, symbol: &str) -> Result<ExchangePosition, BotError> {
        let positions: Vec<PositionRisk> = self
            .send_signed(
                Method::GET,
                "/fapi/v2/positionRisk",
                vec![("symbol", symbol.to_string())],
                RequestKind::Query,
            )
            .await?;

        for position in positions.iter().filter(|p| p.symbol == symbol) {
            let amount = parse_decimal("positionAmt", &position.position_amt)?;
            if amount.is_zero() {
                continue;
            }

            let side = if amount > Decimal::ZERO {
                PositionSide::Long
            } else {
                PositionSide::Short
            };
            let entry_price = parse_decimal("entryPrice", &position.entry_price)?;
            let mark_price = parse_decimal("markPrice", &position.mark_price)?;

            let unrealized_pnl_pct = pnl_percent(
                side,
                entry_price.to_f64().unwrap_or(0.0),
                mark_price.to_f64().unwrap_or(0.0),
                1.0,
            );

            return Ok(ExchangePosition {
                is_open: true,
                quantity: amount.abs(),
                side,
                entry_price,
                unrealized_pnl_pct,
            });
        }

        Ok(ExchangePosition::flat())
    }

    /// Endpoint: GET /fapi/v1/exchangeInfo
    async fn fetch_lot_size(&self, symbol: &str) -> Result<LotSizeSpec, BotError> {
        let info: ExchangeInfo = self.get_public("/fapi/v1/exchangeInfo", &[]).await?;

        let step = info
            .symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .and_then(|s| s.filters.iter().find(|f| f.filter_type == "LOT_SIZE"))
            .and_then(|f| f.step_size.as_deref())
            .ok_or_else(|| {
                BotError::MalformedResponse(format!("no LOT_SIZE filter for {}", symbol))
            })?;

        let step_size = parse_decimal("stepSize", step)?;
        if step_size <= Decimal::ZERO {
            return Err(BotError::MalformedResponse(format!(
                "non-positive step size for {}: {}",
                symbol, step_size
            )));
        }

        Ok(LotSizeSpec::new(step_size))
    }

    /// Endpoint: POST /fapi/v1/leverage (signed)
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), BotError> {
        let response: LeverageResponse = self
            .send_signed(
                Method::POST,
                "/fapi/v1/leverage",
                vec![
                    ("symbol", symbol.to_string()),
                    ("leverage", leverage.to_string()),
                ],
                RequestKind::Order,
            )
            .await?;

        tracing::info!("⚙️ Leverage for {} set to {}x", symbol, response.leverage);
        Ok(())
    }
}

// Runtime configuration: TOML file layered with BOT__* environment overrides
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::error::BotError;
use crate::execution::{BarMode, RiskThresholds};
use crate::strategy::StrategyConfig;

const ENV_PREFIX: &str = "BOT";

/// Upper bound on `trading.cooldown_secs` (one week)
pub const MAX_COOLDOWN_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BotConfig {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    pub risk: RiskThresholds,
    pub strategy: StrategyConfig,
    pub notify: NotifyConfig,
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExchangeConfig {
    pub testnet: bool,
    /// Overrides the production/testnet URL (used by tests)
    pub base_url: Option<String>,
    pub recv_window_ms: u64,
    pub request_timeout_secs: u64,
    pub max_requests_per_minute: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            testnet: false,
            base_url: None,
            recv_window_ms: 5000,
            request_timeout_secs: 10,
            max_requests_per_minute: 1200,
        }
    }
}

/// One traded instrument; without `step_size` the lot filter is fetched
/// from the exchange at startup
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InstrumentConfig {
    pub symbol: String,
    #[serde(default)]
    pub step_size: Option<Decimal>,
}

impl InstrumentConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            step_size: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TradingConfig {
    pub instruments: Vec<InstrumentConfig>,
    /// Kline interval, e.g. "1m"
    pub interval: String,
    pub candle_limit: usize,
    pub cycle_secs: u64,
    pub leverage: u32,
    /// Fraction of available balance committed per entry
    pub utilization: Decimal,
    pub cooldown_secs: u64,
    pub bar_mode: BarMode,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            instruments: vec![InstrumentConfig::new("XRPUSDT")],
            interval: "1m".to_string(),
            candle_limit: 100,
            cycle_secs: 60,
            leverage: 20,
            utilization: Decimal::new(95, 2),
            cooldown_secs: 300,
            bar_mode: BarMode::Partial,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct NotifyConfig {
    pub telegram: Option<TelegramConfig>,
}

#[derive(Clone, Deserialize, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default)]
    pub api_url: Option<String>,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***")
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct JournalConfig {
    pub path: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: "trades.csv".to_string(),
        }
    }
}

/// Exchange API credentials, read from the environment only
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, BotError> {
        let api_key = non_empty_env("BINANCE_API_KEY")
            .ok_or_else(|| BotError::Configuration("BINANCE_API_KEY not set".into()))?;
        let api_secret = non_empty_env("BINANCE_API_SECRET")
            .ok_or_else(|| BotError::Configuration("BINANCE_API_SECRET not set".into()))?;

        Ok(Self {
            api_key,
            api_secret,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl BotConfig {
    /// Load the file (optional) and `BOT__SECTION__KEY` overrides, then validate
    pub fn load(path: &Path) -> Result<Self, BotError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: BotConfig = settings.try_deserialize()?;
        config.apply_telegram_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_telegram_env(&mut self) {
        if self.notify.telegram.is_some() {
            return;
        }
        if let (Some(bot_token), Some(chat_id)) = (
            non_empty_env("TELEGRAM_BOT_TOKEN"),
            non_empty_env("TELEGRAM_CHAT_ID"),
        ) {
            self.notify.telegram = Some(TelegramConfig {
                bot_token,
                chat_id,
                api_url: None,
            });
        }
    }

    /// Reject parameter sets the engine cannot trade with
    pub fn validate(&self) -> Result<(), BotError> {
        let invalid = |msg: String| Err(BotError::Configuration(msg));
        let trading = &self.trading;

        if trading.instruments.is_empty() {
            return invalid("no instruments configured".into());
        }
        for instrument in &trading.instruments {
            if instrument.symbol.trim().is_empty() {
                return invalid("instrument with empty symbol".into());
            }
            if instrument.step_size.is_some_and(|s| s <= Decimal::ZERO) {
                return invalid(format!("{}: step_size must be positive", instrument.symbol));
            }
        }
        if trading.leverage == 0 {
            return invalid("leverage must be positive".into());
        }
        if trading.utilization <= Decimal::ZERO || trading.utilization > Decimal::ONE {
            return invalid(format!(
                "utilization must be in (0, 1], got {}",
                trading.utilization
            ));
        }
        if trading.candle_limit == 0 || trading.cycle_secs == 0 {
            return invalid("candle_limit and cycle_secs must be positive".into());
        }
        if trading.cooldown_secs > MAX_COOLDOWN_SECS {
            return invalid(format!(
                "cooldown_secs must be at most {}, got {}",
                MAX_COOLDOWN_SECS, trading.cooldown_secs
            ));
        }

        let risk = &self.risk;
        if risk.stop_loss_pct >= 0.0 {
            return invalid(format!("stop_loss_pct must be negative, got {}", risk.stop_loss_pct));
        }
        if risk.take_profit_pct <= 0.0
            || risk.trailing_activation_pct <= 0.0
            || risk.trailing_drawdown_pct <= 0.0
        {
            return invalid("take-profit and trailing thresholds must be positive".into());
        }

        let ind = &self.strategy.indicators;
        if [
            ind.ema_fast,
            ind.ema_slow,
            ind.macd_signal,
            ind.rsi_period,
            ind.volume_ma_period,
            ind.atr_period,
        ]
        .contains(&0)
        {
            return invalid("indicator periods must be positive".into());
        }
        if ind.ema_fast >= ind.ema_slow {
            return invalid(format!(
                "ema_fast ({}) must be below ema_slow ({})",
                ind.ema_fast, ind.ema_slow
            ));
        }

        let filters = &self.strategy.filters;
        if filters.rsi_buy_min >= filters.rsi_buy_max || filters.rsi_sell_min >= filters.rsi_sell_max
        {
            return invalid("RSI bands must have min < max".into());
        }
        if filters.min_history > trading.candle_limit {
            return invalid(format!(
                "min_history ({}) exceeds candle_limit ({})",
                filters.min_history, trading.candle_limit
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::AtrSmoothing;
    use crate::strategy::StrategyKind;
    use std::io::Write;
    use std::str::FromStr;

    fn load_toml(contents: &str) -> Result<BotConfig, BotError> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        BotConfig::load(file.path())
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = BotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trading.leverage, 20);
        assert_eq!(config.trading.instruments[0].symbol, "XRPUSDT");
        assert_eq!(config.risk.stop_loss_pct, -5.0);
        assert_eq!(config.strategy.filters.min_history, 35);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BotConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.trading.interval, "1m");
        assert_eq!(config.journal.path, "trades.csv");
    }

    #[test]
    fn test_load_sections_from_toml() {
        let config = load_toml(
            r#"
            [trading]
            interval = "5m"
            leverage = 10
            utilization = "0.9"
            bar_mode = "closed"
            instruments = [
                { symbol = "XRPUSDT", step_size = "0.1" },
                { symbol = "DOGEUSDT" },
            ]

            [risk]
            stop_loss_pct = -4.0

            [strategy]
            kind = "macd_momentum"

            [strategy.indicators]
            atr_smoothing = "wilder"
            "#,
        )
        .unwrap();

        assert_eq!(config.trading.interval, "5m");
        assert_eq!(config.trading.leverage, 10);
        assert_eq!(config.trading.utilization, Decimal::from_str("0.9").unwrap());
        assert_eq!(config.trading.bar_mode, BarMode::Closed);
        assert_eq!(config.trading.instruments.len(), 2);
        assert_eq!(
            config.trading.instruments[0].step_size,
            Some(Decimal::from_str("0.1").unwrap())
        );
        assert_eq!(config.trading.instruments[1].step_size, None);
        assert_eq!(config.risk.stop_loss_pct, -4.0);
        assert_eq!(config.risk.take_profit_pct, 3.0);
        assert_eq!(config.strategy.kind, StrategyKind::MacdMomentum);
        assert_eq!(config.strategy.indicators.atr_smoothing, AtrSmoothing::Wilder);
        assert_eq!(config.strategy.indicators.ema_slow, 26);
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let err = load_toml("[risk]\nstop_loss_pct = 5.0\n").unwrap_err();
        assert!(err.is_fatal());

        let err = load_toml("[trading]\nutilization = \"1.5\"\n").unwrap_err();
        assert!(matches!(err, BotError::Configuration(_)));

        let err = load_toml("[strategy.indicators]\nema_fast = 30\n").unwrap_err();
        assert!(err.to_string().contains("ema_fast"));
    }

    #[test]
    fn test_validate_rules() {
        let mut config = BotConfig::default();
        config.trading.instruments.clear();
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.trading.leverage = 0;
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.trading.instruments[0].step_size = Some(Decimal::ZERO);
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.strategy.indicators.rsi_period = 0;
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.risk.trailing_drawdown_pct = 0.0;
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.trading.cooldown_secs = u64::MAX;
        assert!(config.validate().is_err());
        config.trading.cooldown_secs = MAX_COOLDOWN_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let credentials = Credentials {
            api_key: "key-123".into(),
            api_secret: "secret-456".into(),
        };
        let printed = format!("{:?}", credentials);
        assert!(!printed.contains("key-123"));
        assert!(!printed.contains("secret-456"));
    }
}

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use futuresbot::api::BinanceFuturesClient;
use futuresbot::engine::TradingEngine;
use futuresbot::journal::CsvTradeJournal;
use futuresbot::notify::{LogNotifier, Notifier, TelegramNotifier};
use futuresbot::settings::{BotConfig, Credentials};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "futuresbot", about = "MACD/RSI futures trading bot")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "config/bot.toml")]
    config: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();

    tracing::info!("🚀 futuresbot starting");

    // ============================================================================
    // Configuration
    // ============================================================================

    let config = BotConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let credentials = Credentials::from_env()?;

    tracing::info!("\n📊 Configuration:");
    tracing::info!(
        "  Exchange: {}",
        if config.exchange.testnet { "testnet" } else { "mainnet" }
    );
    tracing::info!("  Interval: {} ({} candles)", config.trading.interval, config.trading.candle_limit);
    tracing::info!("  Leverage: {}x", config.trading.leverage);
    tracing::info!("  Utilization: {}", config.trading.utilization);
    tracing::info!(
        "  TP {}% | SL {}% | trailing {}% / {}%",
        config.risk.take_profit_pct,
        config.risk.stop_loss_pct,
        config.risk.trailing_activation_pct,
        config.risk.trailing_drawdown_pct
    );
    tracing::info!("  Cooldown: {}s", config.trading.cooldown_secs);
    tracing::info!("  Bar mode: {:?}", config.trading.bar_mode);

    // ============================================================================
    // Adapters
    // ============================================================================

    let gateway = Arc::new(BinanceFuturesClient::new(credentials, &config.exchange)?);
    let notifier = create_notifier(&config)?;
    let journal = Arc::new(CsvTradeJournal::new(&config.journal.path));
    tracing::info!("  Journal: {}", journal.path().display());

    let mut engine = TradingEngine::new(config, gateway, notifier, journal);
    tracing::info!("  Strategy: {}", engine.strategy_name());

    tracing::info!("\n🔍 Preparing instruments...");
    engine.bootstrap(Utc::now()).await?;
    tracing::info!("✅ {} instruments ready", engine.symbols().len());

    if args.once {
        let report = engine.run_cycle(Utc::now()).await;
        tracing::info!("Single cycle done ({} skipped)", report.skipped());
        return Ok(());
    }

    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        _ = engine.run() => {
            tracing::error!("Trading loop exited");
        }
    }

    tracing::info!("👋 futuresbot stopped");
    Ok(())
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("futuresbot=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn create_notifier(config: &BotConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.notify.telegram {
        Some(telegram) => {
            tracing::info!("  Notifications: Telegram chat {}", telegram.chat_id);
            Ok(Arc::new(TelegramNotifier::new(telegram)?))
        }
        None => {
            tracing::info!("  Notifications: log only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

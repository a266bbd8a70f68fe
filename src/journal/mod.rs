// Append-only trade journal
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::execution::ExitReason;
use crate::models::PositionSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
    TakeProfitClose,
    StopLossClose,
    TrailingStopClose,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::TakeProfitClose => "TP-CLOSE",
            TradeAction::StopLossClose => "SL-CLOSE",
            TradeAction::TrailingStopClose => "TS-CLOSE",
        }
    }

    /// Entry action for a newly opened position
    pub fn entry(side: PositionSide) -> Option<Self> {
        match side {
            PositionSide::Long => Some(TradeAction::Buy),
            PositionSide::Short => Some(TradeAction::Sell),
            PositionSide::Flat => None,
        }
    }
}

impl From<ExitReason> for TradeAction {
    fn from(reason: ExitReason) -> Self {
        match reason {
            ExitReason::TakeProfit => TradeAction::TakeProfitClose,
            ExitReason::StopLoss => TradeAction::StopLossClose,
            ExitReason::TrailingStop => TradeAction::TrailingStopClose,
        }
    }
}

/// One executed action
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: Decimal,
    pub price: f64,
    pub balance: Decimal,
}

/// One CSV row; field order is the column order
#[derive(Debug, Serialize)]
struct JournalRow<'a> {
    timestamp: String,
    symbol: &'a str,
    action: &'static str,
    quantity: String,
    price: f64,
    balance: String,
}

impl TradeRecord {
    fn row(&self) -> JournalRow<'_> {
        JournalRow {
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            symbol: &self.symbol,
            action: self.action.as_str(),
            quantity: self.quantity.to_string(),
            price: self.price,
            balance: self.balance.round_dp(2).to_string(),
        }
    }
}

/// Sink for executed trades; never read back by the engine
pub trait TradeJournal: Send + Sync {
    fn append_record(&self, record: &TradeRecord) -> io::Result<()>;
}

/// CSV file journal, header written when the file is created
#[derive(Debug)]
pub struct CsvTradeJournal {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvTradeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TradeJournal for CsvTradeJournal {
    fn append_record(&self, record: &TradeRecord) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let is_new = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(record.row())?;
        writer.flush()?;

        tracing::debug!(
            "📝 Journal {}: {} {} {} @ {}",
            self.path.display(),
            record.action.as_str(),
            record.symbol,
            record.quantity,
            record.price
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(action: TradeAction, price: f64) -> TradeRecord {
        TradeRecord {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap(),
            symbol: "XRPUSDT".to_string(),
            action,
            quantity: Decimal::new(9021, 1),
            price,
            balance: Decimal::new(123456, 3),
        }
    }

    #[test]
    fn test_action_labels() {
        assert_eq!(TradeAction::entry(PositionSide::Long), Some(TradeAction::Buy));
        assert_eq!(TradeAction::entry(PositionSide::Short), Some(TradeAction::Sell));
        assert_eq!(TradeAction::from(ExitReason::TrailingStop).as_str(), "TS-CLOSE");
        assert_eq!(TradeAction::from(ExitReason::StopLoss).as_str(), "SL-CLOSE");
        assert_eq!(TradeAction::from(ExitReason::TakeProfit).as_str(), "TP-CLOSE");
    }

    #[test]
    fn test_csv_row_format() {
        let dir = tempfile::tempdir().unwrap();
        let journal = CsvTradeJournal::new(dir.path().join("trades.csv"));

        journal.append_record(&record(TradeAction::Buy, 0.6031)).unwrap();

        let contents = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(
            contents,
            "timestamp,symbol,action,quantity,price,balance\n\
             2025-03-01T12:30:00Z,XRPUSDT,BUY,902.1,0.6031,123.46\n"
        );
    }

    #[test]
    fn test_fields_with_delimiters_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let journal = CsvTradeJournal::new(dir.path().join("trades.csv"));

        let mut odd = record(TradeAction::Sell, 2.5);
        odd.symbol = "XRP,\"USDT\"".to_string();
        journal.append_record(&odd).unwrap();

        let mut reader = csv::Reader::from_path(journal.path()).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 6);
        assert_eq!(&rows[0][1], "XRP,\"USDT\"");
        assert_eq!(&rows[0][2], "SELL");
    }

    #[test]
    fn test_appends_with_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let journal = CsvTradeJournal::new(dir.path().join("trades.csv"));

        journal.append_record(&record(TradeAction::Sell, 0.61)).unwrap();
        journal.append_record(&record(TradeAction::TakeProfitClose, 0.6)).unwrap();

        let contents = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,symbol,action,quantity,price,balance");
        assert!(lines[1].contains(",SELL,"));
        assert!(lines[2].contains(",TP-CLOSE,"));
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let journal = CsvTradeJournal::new(dir.path().join("missing").join("trades.csv"));
        assert!(journal.append_record(&record(TradeAction::Buy, 1.0)).is_err());
    }
}

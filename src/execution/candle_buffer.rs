use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;

use crate::error::BotError;
use crate::models::Candle;

/// Whether the still-forming bar participates in indicators
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BarMode {
    /// React on the partial bar (lower latency, values move until close)
    #[default]
    Partial,
    /// React only on closed bars
    Closed,
}

/// Counts from merging a gateway response into the buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    pub appended: usize,
    pub already_known: usize,
    pub rejected: usize,
    pub forming: bool,
}

/// Rolling window of candles for one instrument
///
/// Closed candles are immutable once appended and ordered by open time;
/// the oldest is dropped when the window is full. The bar that is still
/// forming lives in a separate slot and is replaced on every refresh.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    symbol: String,
    candles: VecDeque<Candle>,
    forming: Option<Candle>,
    max_candles: usize,
    bar_mode: BarMode,
}

impl CandleBuffer {
    /// Create a new candle buffer
    ///
    /// # Arguments
    /// * `max_candles` - Maximum number of candles to keep
    pub fn new(symbol: impl Into<String>, max_candles: usize, bar_mode: BarMode) -> Self {
        Self {
            symbol: symbol.into(),
            candles: VecDeque::with_capacity(max_candles),
            forming: None,
            max_candles,
            bar_mode,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bar_mode(&self) -> BarMode {
        self.bar_mode
    }

    /// Append a closed candle
    ///
    /// Rejects a candle whose open time is not after the last one. If the
    /// buffer is full, removes the oldest candle.
    pub fn append(&mut self, candle: Candle) -> Result<(), BotError> {
        if let Some(last) = self.candles.back() {
            if candle.open_time <= last.open_time {
                return Err(BotError::OutOfOrderCandle {
                    symbol: self.symbol.clone(),
                    open_time: candle.open_time.timestamp_millis(),
                    last_open_time: last.open_time.timestamp_millis(),
                });
            }
        }

        // A forming bar that has now been appended closed is stale
        if self
            .forming
            .as_ref()
            .is_some_and(|f| f.open_time <= candle.open_time)
        {
            self.forming = None;
        }

        self.candles.push_back(candle);

        while self.candles.len() > self.max_candles {
            self.candles.pop_front();
        }

        Ok(())
    }

    /// Merge a freshly fetched kline sequence
    ///
    /// Closed bars newer than the window are appended, bars already held are
    /// skipped, and a bar whose close time is after `now` becomes the forming
    /// bar. Ordering violations are discarded with a warning.
    pub fn ingest(&mut self, fetched: Vec<Candle>, now: DateTime<Utc>) -> IngestStats {
        let mut stats = IngestStats::default();

        for candle in fetched {
            if !candle.is_closed_at(now) {
                let newer = self
                    .candles
                    .back()
                    .map_or(true, |last| candle.open_time > last.open_time);
                if newer {
                    self.forming = Some(candle);
                    stats.forming = true;
                }
                continue;
            }

            if self.contains(candle.open_time) {
                stats.already_known += 1;
                continue;
            }

            match self.append(candle) {
                Ok(()) => stats.appended += 1,
                Err(e) => {
                    tracing::warn!("Discarding candle: {}", e);
                    stats.rejected += 1;
                }
            }
        }

        stats
    }

    fn contains(&self, open_time: DateTime<Utc>) -> bool {
        self.candles.iter().rev().any(|c| c.open_time == open_time)
    }

    /// Candles the strategy sees, oldest first
    ///
    /// In [`BarMode::Partial`] the forming bar is included as the latest
    /// element; the view never exceeds the window size.
    pub fn candles(&self) -> Vec<Candle> {
        let mut view: Vec<Candle> = self.candles.iter().cloned().collect();

        if self.bar_mode == BarMode::Partial {
            if let Some(forming) = &self.forming {
                view.push(forming.clone());
            }
        }

        let overflow = view.len().saturating_sub(self.max_candles);
        view.drain(..overflow);
        view
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles().iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles().iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles().iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles().iter().map(|c| c.volume).collect()
    }

    /// Latest candle of the strategy view
    pub fn last(&self) -> Option<&Candle> {
        match (self.bar_mode, &self.forming) {
            (BarMode::Partial, Some(forming)) => Some(forming),
            _ => self.candles.back(),
        }
    }

    /// Number of candles in the strategy view
    pub fn len(&self) -> usize {
        self.candles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty() && self.forming.is_none()
    }
}

//! Price bars, price series and timeframes.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::domain::error::SignalbenchError;

/// One OHLCV record. Only `close` is mandatory; a missing close is NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<f64>,
}

impl PriceBar {
    pub fn from_close(timestamp: NaiveDateTime, close: f64) -> Self {
        PriceBar {
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    /// A close that can be traded at: finite and strictly positive.
    pub fn has_valid_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }

    pub fn valid_close(&self) -> Option<f64> {
        self.has_valid_close().then_some(self.close)
    }

    pub fn high_or_close(&self) -> f64 {
        self.high.unwrap_or(self.close)
    }

    pub fn low_or_close(&self) -> f64 {
        self.low.unwrap_or(self.close)
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let high = self.high_or_close();
        let low = self.low_or_close();
        let hl = high - low;
        let hc = (high - prev_close).abs();
        let lc = (low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// An immutable, strictly time-ordered series of bars for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Builds a series, rejecting duplicate or out-of-order timestamps.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, SignalbenchError> {
        let symbol = symbol.into();
        if let Some(pos) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(SignalbenchError::InvalidSeries {
                symbol,
                reason: format!(
                    "timestamps must be strictly increasing (bar {} at {} follows {})",
                    pos + 1,
                    bars[pos + 1].timestamp,
                    bars[pos].timestamp
                ),
            });
        }
        Ok(PriceSeries { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    /// Closes as indicator inputs: `None` where the close is unusable.
    pub fn close_values(&self) -> Vec<Option<f64>> {
        self.bars.iter().map(PriceBar::valid_close).collect()
    }

    pub fn first_valid_close(&self) -> Option<(usize, f64)> {
        self.bars
            .iter()
            .enumerate()
            .find_map(|(i, b)| b.valid_close().map(|c| (i, c)))
    }

    pub fn last_valid_close(&self) -> Option<(usize, f64)> {
        self.bars
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, b)| b.valid_close().map(|c| (i, c)))
    }
}

/// Bar interval of a series. Crypto markets trade every day, so the
/// annualisation factors count calendar periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
    #[serde(rename = "1M")]
    Month1,
}

impl Timeframe {
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Timeframe::Hour1 => 8760.0,
            Timeframe::Hour4 => 2190.0,
            Timeframe::Day1 => 365.0,
            Timeframe::Week1 => 52.0,
            Timeframe::Month1 => 12.0,
        }
    }

    /// Nominal spacing between consecutive bars.
    pub fn interval(&self) -> Duration {
        match self {
            Timeframe::Hour1 => Duration::hours(1),
            Timeframe::Hour4 => Duration::hours(4),
            Timeframe::Day1 => Duration::days(1),
            Timeframe::Week1 => Duration::weeks(1),
            Timeframe::Month1 => Duration::days(31),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
            Timeframe::Month1 => "1M",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1h" => Ok(Timeframe::Hour1),
            "4h" => Ok(Timeframe::Hour4),
            "1d" | "daily" => Ok(Timeframe::Day1),
            "1w" | "weekly" => Ok(Timeframe::Week1),
            "1M" | "monthly" => Ok(Timeframe::Month1),
            other => Err(format!(
                "unknown timeframe '{}', expected one of 1h, 4h, 1d, 1w, 1M",
                other
            )),
        }
    }
}

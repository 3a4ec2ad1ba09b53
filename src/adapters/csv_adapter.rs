//! CSV file data adapter.
//!
//! Prices are read from `<base_path>/<SYMBOL>_<timeframe>.csv` with a header
//! row naming `timestamp` (or `date`), `open`, `high`, `low`, `close` and
//! `volume`. Only the timestamp and close columns are required.

use crate::domain::error::SignalbenchError;
use crate::domain::ohlcv::{PriceBar, PriceSeries, Timeframe};
use crate::domain::position::Trade;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    timestamp: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord, path: &Path) -> Result<Self, SignalbenchError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let required = |names: &[&str]| {
            find(names).ok_or_else(|| SignalbenchError::DataLoad {
                reason: format!("{}: missing '{}' column", path.display(), names[0]),
            })
        };
        Ok(Columns {
            timestamp: required(&["timestamp", "date", "datetime"])?,
            open: find(&["open"]),
            high: find(&["high"]),
            low: find(&["low"]),
            close: required(&["close"])?,
            volume: find(&["volume"]),
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Empty and `nan` cells are absent; anything else must parse.
fn parse_optional(raw: Option<&str>, column: &str, line: u64) -> Result<Option<f64>, SignalbenchError> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|e| SignalbenchError::DataLoad {
        reason: format!("line {}: invalid {} value '{}': {}", line, column, raw, e),
    })
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    /// Reads a price file at an explicit path.
    pub fn load_file(path: &Path, symbol: &str) -> Result<PriceSeries, SignalbenchError> {
        let content = fs::read_to_string(path).map_err(|e| SignalbenchError::DataLoad {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| SignalbenchError::DataLoad {
            reason: format!("{}: CSV header error: {}", path.display(), e),
        })?;
        let columns = Columns::from_headers(headers, path)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| SignalbenchError::DataLoad {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let raw_ts = record.get(columns.timestamp).unwrap_or_default();
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| SignalbenchError::DataLoad {
                reason: format!("line {}: invalid timestamp '{}'", line, raw_ts),
            })?;
            let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i));

            bars.push(PriceBar {
                timestamp,
                open: parse_optional(cell(columns.open), "open", line)?,
                high: parse_optional(cell(columns.high), "high", line)?,
                low: parse_optional(cell(columns.low), "low", line)?,
                close: parse_optional(record.get(columns.close), "close", line)?.unwrap_or(f64::NAN),
                volume: parse_optional(cell(columns.volume), "volume", line)?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        tracing::debug!(symbol, path = %path.display(), bars = bars.len(), "loaded price file");
        PriceSeries::new(symbol, bars)
    }

    /// Writes closed trades with a header row.
    pub fn write_trades(path: &Path, trades: &[Trade]) -> Result<(), SignalbenchError> {
        let to_report_err = |e: csv::Error| SignalbenchError::Report {
            reason: format!("failed to write {}: {}", path.display(), e),
        };
        let mut writer = csv::Writer::from_path(path).map_err(to_report_err)?;
        for trade in trades {
            writer.serialize(trade).map_err(to_report_err)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl DataPort for CsvAdapter {
    fn fetch_series(&self, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries, SignalbenchError> {
        let path = self.csv_path(symbol, timeframe);
        if !path.exists() {
            return Err(SignalbenchError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Self::load_file(&path, symbol)
    }

    fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, SignalbenchError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SignalbenchError::DataLoad {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", timeframe);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

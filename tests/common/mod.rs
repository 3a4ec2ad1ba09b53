#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use signalbench::domain::error::SignalbenchError;
pub use signalbench::domain::ohlcv::{PriceBar, PriceSeries, Timeframe};
use signalbench::ports::data_port::DataPort;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
    ) -> Result<PriceSeries, SignalbenchError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SignalbenchError::DataLoad {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) => PriceSeries::new(symbol, bars.clone()),
            None => Err(SignalbenchError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn list_symbols(&self, _timeframe: Timeframe) -> Result<Vec<String>, SignalbenchError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Daily close-only bars starting 2024-01-01.
pub fn make_bars(prices: &[f64]) -> Vec<PriceBar> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar::from_close(start() + Duration::days(i as i64), close))
        .collect()
}

pub fn make_series(symbol: &str, prices: &[f64]) -> PriceSeries {
    PriceSeries::new(symbol, make_bars(prices)).unwrap()
}

/// `n` bars moving linearly from `from` to `to`.
pub fn linear(from: f64, to: f64, n: usize) -> Vec<f64> {
    let step = (to - from) / (n - 1) as f64;
    (0..n).map(|i| from + step * i as f64).collect()
}

/// 40 bars alternating 100/101, a dip to 90 at bar 40, recovery through
/// 92, 95, 98, 101, then alternating again up to 80 bars.
pub fn bollinger_dip_prices() -> Vec<f64> {
    let alternate = |i: usize| if i % 2 == 0 { 100.0 } else { 101.0 };
    let mut prices: Vec<f64> = (0..40).map(alternate).collect();
    prices.extend([90.0, 92.0, 95.0, 98.0, 101.0]);
    prices.extend((45..80).map(alternate));
    prices
}

pub fn write_csv(dir: &Path, symbol: &str, timeframe: &str, prices: &[f64]) {
    let mut file = std::fs::File::create(dir.join(format!("{}_{}.csv", symbol, timeframe))).unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    for bar in make_bars(prices) {
        writeln!(
            file,
            "{},{},{},{},{},1000",
            bar.timestamp.format("%Y-%m-%d"),
            bar.close,
            bar.close + 1.0,
            bar.close - 1.0,
            bar.close
        )
        .unwrap();
    }
}

pub fn write_ini(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("signalbench.ini");
    std::fs::write(&path, content).unwrap();
    path
}

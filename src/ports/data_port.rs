//! Data access port trait.

use crate::domain::error::SignalbenchError;
use crate::domain::ohlcv::{PriceSeries, Timeframe};

pub trait DataPort {
    fn fetch_series(&self, symbol: &str, timeframe: Timeframe) -> Result<PriceSeries, SignalbenchError>;

    fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, SignalbenchError>;
}

//! Technical indicator implementations.
//!
//! - `IndicatorPoint`: one timestamped value, `None` when undefined
//! - `IndicatorValue`: the output shape of an indicator
//! - `IndicatorType`: indicator identity + parameters (usable as a HashMap key)
//! - `IndicatorSeries`: a series aligned one-to-one with a `PriceSeries`
//!
//! Every indicator returns exactly one point per input bar. Warmup and
//! degenerate points carry `value: None` and are never dropped.

pub mod bollinger;
pub mod donchian;
pub mod ema;
pub mod macd;
pub mod sma;
pub mod stddev;
pub mod stochastic;

pub use bollinger::calculate_bollinger;
pub use donchian::calculate_donchian;
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;
pub use stochastic::calculate_stochastic;

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::ohlcv::PriceSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<IndicatorValue>,
}

impl IndicatorPoint {
    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: Option<f64>,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Channel {
        upper: f64,
        lower: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Stddev(usize),
    Atr(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Donchian(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Zips computed values with the series timestamps.
    pub(crate) fn from_values(
        indicator_type: IndicatorType,
        series: &PriceSeries,
        values: Vec<Option<IndicatorValue>>,
    ) -> Self {
        debug_assert_eq!(values.len(), series.len());
        let values = series
            .bars()
            .iter()
            .zip(values)
            .map(|(bar, value)| IndicatorPoint {
                timestamp: bar.timestamp,
                value,
            })
            .collect();
        IndicatorSeries {
            indicator_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn undefined_count(&self) -> usize {
        self.values.iter().filter(|p| !p.is_defined()).count()
    }

    /// Projects one numeric field out of every point.
    pub fn field<F>(&self, extract: F) -> Vec<Option<f64>>
    where
        F: Fn(&IndicatorValue) -> Option<f64>,
    {
        self.values
            .iter()
            .map(|p| p.value.as_ref().and_then(&extract))
            .collect()
    }

    pub fn simple_values(&self) -> Vec<Option<f64>> {
        self.field(|v| match v {
            IndicatorValue::Simple(x) => Some(*x),
            _ => None,
        })
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Donchian(period) => write!(f, "DONCHIAN({})", period),
        }
    }
}

//! Strategy definitions: a closed set of rule families sharing one
//! `generate_signals` entry point.

use std::fmt;

use serde::Serialize;

use crate::domain::error::SignalbenchError;
use crate::domain::indicator::{
    calculate_bollinger, calculate_donchian, calculate_ema, calculate_sma, IndicatorValue,
};
use crate::domain::indicator::macd::macd_line;
use crate::domain::indicator::stochastic::percent_k;
use crate::domain::indicator_helpers::ema_values;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::signal::{
    band_reversion_signals, breakout_signals, crossover_signals, threshold_signals, Bands,
    SignalSeries,
};

const SECTION: &str = "strategy";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum CrossoverKind {
    Sma,
    Ema,
    /// MACD line against its signal line; `fast`/`slow` are the EMA periods.
    Macd { signal: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossoverParams {
    pub kind: CrossoverKind,
    pub fast: usize,
    pub slow: usize,
    pub allow_short: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanReversionParams {
    pub window: usize,
    pub num_std: f64,
    pub allow_short: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OscillatorParams {
    pub k_period: usize,
    pub d_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    pub allow_short: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakoutParams {
    pub lookback: usize,
    pub allow_short: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    Crossover(CrossoverParams),
    MeanReversion(MeanReversionParams),
    OscillatorThreshold(OscillatorParams),
    Breakout(BreakoutParams),
}

impl Strategy {
    pub fn sma_crossover(fast: usize, slow: usize) -> Self {
        Strategy::Crossover(CrossoverParams {
            kind: CrossoverKind::Sma,
            fast,
            slow,
            allow_short: false,
        })
    }

    pub fn bollinger(window: usize, num_std: f64) -> Self {
        Strategy::MeanReversion(MeanReversionParams {
            window,
            num_std,
            allow_short: false,
        })
    }

    /// Checks parameters, naming the offending `[strategy]` key on failure.
    pub fn validate(&self) -> Result<(), SignalbenchError> {
        match self {
            Strategy::Crossover(p) => {
                if p.fast == 0 {
                    return Err(SignalbenchError::invalid(SECTION, "fast", "must be at least 1"));
                }
                if p.slow == 0 {
                    return Err(SignalbenchError::invalid(SECTION, "slow", "must be at least 1"));
                }
                if p.fast >= p.slow {
                    return Err(SignalbenchError::invalid(
                        SECTION,
                        "fast",
                        format!("fast ({}) must be less than slow ({})", p.fast, p.slow),
                    ));
                }
                if let CrossoverKind::Macd { signal: 0 } = p.kind {
                    return Err(SignalbenchError::invalid(SECTION, "signal", "must be at least 1"));
                }
            }
            Strategy::MeanReversion(p) => {
                if p.window < 2 {
                    return Err(SignalbenchError::invalid(SECTION, "window", "must be at least 2"));
                }
                if !p.num_std.is_finite() || p.num_std <= 0.0 {
                    return Err(SignalbenchError::invalid(
                        SECTION,
                        "num_std",
                        format!("must be positive, got {}", p.num_std),
                    ));
                }
            }
            Strategy::OscillatorThreshold(p) => {
                if p.k_period == 0 {
                    return Err(SignalbenchError::invalid(SECTION, "k_period", "must be at least 1"));
                }
                if p.d_period == 0 {
                    return Err(SignalbenchError::invalid(SECTION, "d_period", "must be at least 1"));
                }
                if !(0.0..=100.0).contains(&p.oversold) {
                    return Err(SignalbenchError::invalid(SECTION, "oversold", "must be within [0, 100]"));
                }
                if !(0.0..=100.0).contains(&p.overbought) {
                    return Err(SignalbenchError::invalid(SECTION, "overbought", "must be within [0, 100]"));
                }
                if p.oversold >= p.overbought {
                    return Err(SignalbenchError::invalid(
                        SECTION,
                        "oversold",
                        format!(
                            "oversold ({}) must be less than overbought ({})",
                            p.oversold, p.overbought
                        ),
                    ));
                }
            }
            Strategy::Breakout(p) => {
                if p.lookback == 0 {
                    return Err(SignalbenchError::invalid(SECTION, "lookback", "must be at least 1"));
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> String {
        self.to_string()
    }

    pub fn allows_short(&self) -> bool {
        match self {
            Strategy::Crossover(p) => p.allow_short,
            Strategy::MeanReversion(p) => p.allow_short,
            Strategy::OscillatorThreshold(p) => p.allow_short,
            Strategy::Breakout(p) => p.allow_short,
        }
    }

    /// Bars consumed before the first signal can fire.
    pub fn warmup(&self) -> usize {
        match self {
            Strategy::Crossover(p) => match p.kind {
                CrossoverKind::Sma | CrossoverKind::Ema => p.slow,
                CrossoverKind::Macd { signal } => p.slow + signal - 1,
            },
            Strategy::MeanReversion(p) => p.window,
            Strategy::OscillatorThreshold(p) => p.k_period,
            Strategy::Breakout(p) => p.lookback,
        }
    }

    pub fn generate_signals(&self, series: &PriceSeries) -> SignalSeries {
        let closes = series.close_values();
        let signals = match self {
            Strategy::Crossover(p) => {
                let (fast, slow) = match p.kind {
                    CrossoverKind::Sma => (
                        calculate_sma(series, p.fast).simple_values(),
                        calculate_sma(series, p.slow).simple_values(),
                    ),
                    CrossoverKind::Ema => (
                        calculate_ema(series, p.fast).simple_values(),
                        calculate_ema(series, p.slow).simple_values(),
                    ),
                    CrossoverKind::Macd { signal } => {
                        let line = macd_line(&closes, p.fast, p.slow);
                        let signal_line = ema_values(&line, signal);
                        (line, signal_line)
                    }
                };
                crossover_signals(&fast, &slow, p.allow_short)
            }
            Strategy::MeanReversion(p) => {
                let bands: Vec<Option<Bands>> = calculate_bollinger(series, p.window, p.num_std)
                    .values
                    .iter()
                    .map(|point| match point.value {
                        Some(IndicatorValue::Bollinger {
                            upper,
                            middle,
                            lower,
                        }) => Some(Bands {
                            upper,
                            middle,
                            lower,
                        }),
                        _ => None,
                    })
                    .collect();
                band_reversion_signals(&closes, &bands, p.allow_short)
            }
            Strategy::OscillatorThreshold(p) => {
                let k = percent_k(series, p.k_period);
                threshold_signals(&k, p.oversold, p.overbought, p.allow_short)
            }
            Strategy::Breakout(p) => {
                let channel: Vec<Option<(f64, f64)>> = calculate_donchian(series, p.lookback)
                    .values
                    .iter()
                    .map(|point| match point.value {
                        Some(IndicatorValue::Channel { upper, lower }) => Some((upper, lower)),
                        _ => None,
                    })
                    .collect();
                breakout_signals(&closes, &channel, p.allow_short)
            }
        };
        SignalSeries::new(&series.timestamps(), signals)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.allows_short() { " long/short" } else { "" };
        match self {
            Strategy::Crossover(p) => match p.kind {
                CrossoverKind::Sma => write!(f, "SMA({}/{}) crossover{}", p.fast, p.slow, side),
                CrossoverKind::Ema => write!(f, "EMA({}/{}) crossover{}", p.fast, p.slow, side),
                CrossoverKind::Macd { signal } => {
                    write!(f, "MACD({},{},{}) crossover{}", p.fast, p.slow, signal, side)
                }
            },
            Strategy::MeanReversion(p) => {
                write!(f, "Bollinger({},{}) mean reversion{}", p.window, p.num_std, side)
            }
            Strategy::OscillatorThreshold(p) => write!(
                f,
                "Stochastic({},{}) {}/{}{}",
                p.k_period, p.d_period, p.oversold, p.overbought, side
            ),
            Strategy::Breakout(p) => write!(f, "Donchian({}) breakout{}", p.lookback, side),
        }
    }
}

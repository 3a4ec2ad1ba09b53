//! Position sizing rules.
//!
//! A rule maps the closed-trade history and the closes seen so far to the
//! fraction of equity committed to a new position.

use serde::Serialize;

use crate::domain::error::SignalbenchError;
use crate::domain::indicator_helpers::sample_stddev;
use crate::domain::position::Trade;

const SECTION: &str = "sizing";

const MIN_VOL_FACTOR: f64 = 0.5;
const MAX_VOL_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptiveKellyParams {
    /// Fraction used until `min_trades` trades have closed.
    pub base_fraction: f64,
    pub kelly_multiplier: f64,
    pub max_fraction: f64,
    /// Window (in bar returns) for the volatility estimate.
    pub lookback: usize,
    pub min_trades: usize,
}

impl Default for AdaptiveKellyParams {
    fn default() -> Self {
        AdaptiveKellyParams {
            base_fraction: 0.5,
            kelly_multiplier: 0.5,
            max_fraction: 1.0,
            lookback: 20,
            min_trades: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum SizingRule {
    FixedFraction { fraction: f64 },
    AdaptiveKelly(AdaptiveKellyParams),
}

impl Default for SizingRule {
    fn default() -> Self {
        SizingRule::FixedFraction { fraction: 1.0 }
    }
}

impl SizingRule {
    pub fn validate(&self) -> Result<(), SignalbenchError> {
        let in_unit = |v: f64| v.is_finite() && v > 0.0 && v <= 1.0;
        match self {
            SizingRule::FixedFraction { fraction } => {
                if !in_unit(*fraction) {
                    return Err(SignalbenchError::invalid(
                        SECTION,
                        "fraction",
                        format!("must be in (0, 1], got {}", fraction),
                    ));
                }
            }
            SizingRule::AdaptiveKelly(p) => {
                if !in_unit(p.base_fraction) {
                    return Err(SignalbenchError::invalid(SECTION, "base_fraction", "must be in (0, 1]"));
                }
                if !in_unit(p.max_fraction) {
                    return Err(SignalbenchError::invalid(SECTION, "max_fraction", "must be in (0, 1]"));
                }
                if !p.kelly_multiplier.is_finite() || p.kelly_multiplier <= 0.0 {
                    return Err(SignalbenchError::invalid(SECTION, "kelly_multiplier", "must be positive"));
                }
                if p.lookback < 2 {
                    return Err(SignalbenchError::invalid(SECTION, "lookback", "must be at least 2"));
                }
            }
        }
        Ok(())
    }

    /// Fraction of equity for a position opened at bar `at`.
    ///
    /// `closes` may extend past `at`; only `closes[..=at]` is read.
    pub fn fraction(&self, closed_trades: &[Trade], closes: &[Option<f64>], at: usize) -> f64 {
        match self {
            SizingRule::FixedFraction { fraction } => *fraction,
            SizingRule::AdaptiveKelly(p) => {
                if closed_trades.len() < p.min_trades {
                    return p.base_fraction.min(p.max_fraction);
                }
                let kelly = kelly_fraction(closed_trades) * p.kelly_multiplier;
                let end = (at + 1).min(closes.len());
                let scaled = kelly * volatility_factor(&closes[..end], p.lookback);
                scaled.clamp(0.0, p.max_fraction)
            }
        }
    }
}

/// Kelly fraction `p - (1 - p) / R`. Zero without both wins and losses.
pub fn kelly_fraction(trades: &[Trade]) -> f64 {
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.return_pct).collect();
    let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.return_pct).collect();
    if wins.is_empty() || losses.is_empty() {
        return 0.0;
    }
    let p = wins.len() as f64 / trades.len() as f64;
    let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
    let avg_loss = losses.iter().sum::<f64>().abs() / losses.len() as f64;
    let payoff = avg_win / avg_loss;
    p - (1.0 - p) / payoff
}

/// Average rolling volatility over current volatility, clamped to [0.5, 2.0].
/// 1.0 when there is not enough history.
pub fn volatility_factor(closes: &[Option<f64>], lookback: usize) -> f64 {
    let returns: Vec<Option<f64>> = closes
        .windows(2)
        .map(|w| match (w[0], w[1]) {
            (Some(prev), Some(curr)) => Some(curr / prev - 1.0),
            _ => None,
        })
        .collect();
    if lookback < 2 || returns.len() < lookback {
        return 1.0;
    }

    let vols: Vec<f64> = returns
        .windows(lookback)
        .filter_map(|w| {
            let window: Option<Vec<f64>> = w.iter().copied().collect();
            sample_stddev(&window?)
        })
        .collect();
    let Some(&current) = vols.last() else {
        return 1.0;
    };
    if current < 1e-12 {
        return 1.0;
    }
    let average = vols.iter().sum::<f64>() / vols.len() as f64;
    (average / current).clamp(MIN_VOL_FACTOR, MAX_VOL_FACTOR)
}

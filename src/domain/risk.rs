//! Stop-loss and take-profit exits.
//!
//! Levels are fixed once, when a position opens: the base distances are
//! scaled by `(1 + ATR / entry price)` and by the volatility factor used for
//! sizing, then clamped to `[0.5, 2.0]` times the base. A level is checked
//! against each bar's close; the exit itself fills at the next bar's close
//! like any other order.

use serde::Serialize;

use crate::domain::error::SignalbenchError;
use crate::domain::position::{ExitReason, Position};
use crate::domain::sizing::volatility_factor;

const SECTION: &str = "risk";

const MIN_SCALE: f64 = 0.5;
const MAX_SCALE: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskExits {
    /// Base adverse move, as a fraction of the entry price.
    pub stop_loss: f64,
    /// Base favourable move, as a fraction of the entry price.
    pub take_profit: f64,
    pub atr_period: usize,
    /// Window (in bar returns) for the volatility factor.
    pub lookback: usize,
}

impl Default for RiskExits {
    fn default() -> Self {
        RiskExits {
            stop_loss: 0.02,
            take_profit: 0.04,
            atr_period: 14,
            lookback: 20,
        }
    }
}

/// Distances in force for one open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExitLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl RiskExits {
    pub fn validate(&self) -> Result<(), SignalbenchError> {
        if !self.stop_loss.is_finite() || self.stop_loss <= 0.0 || self.stop_loss >= 1.0 {
            return Err(SignalbenchError::invalid(
                SECTION,
                "stop_loss",
                format!("must be in (0, 1), got {}", self.stop_loss),
            ));
        }
        if !self.take_profit.is_finite() || self.take_profit <= 0.0 {
            return Err(SignalbenchError::invalid(
                SECTION,
                "take_profit",
                format!("must be positive, got {}", self.take_profit),
            ));
        }
        if self.atr_period == 0 {
            return Err(SignalbenchError::invalid(SECTION, "atr_period", "must be at least 1"));
        }
        if self.lookback < 2 {
            return Err(SignalbenchError::invalid(SECTION, "lookback", "must be at least 2"));
        }
        Ok(())
    }

    /// Levels for a position opened at bar `at` and `price`.
    ///
    /// `atr` is the ATR at `at`, `None` during its warmup. Only
    /// `closes[..=at]` is read.
    pub fn levels(&self, atr: Option<f64>, price: f64, closes: &[Option<f64>], at: usize) -> ExitLevels {
        let atr_ratio = atr
            .filter(|a| a.is_finite() && price > 0.0)
            .map_or(0.0, |a| a / price);
        let end = (at + 1).min(closes.len());
        let scale = (1.0 + atr_ratio) * volatility_factor(&closes[..end], self.lookback);
        let bounded = |base: f64| (base * scale).clamp(base * MIN_SCALE, base * MAX_SCALE);
        ExitLevels {
            stop_loss: bounded(self.stop_loss),
            take_profit: bounded(self.take_profit),
        }
    }
}

impl ExitLevels {
    /// The exit triggered by a close at `price`, if any. The stop wins when
    /// both are reachable.
    pub fn check(&self, position: &Position, price: f64) -> Option<ExitReason> {
        let move_since_entry = position.gross_return(price);
        if move_since_entry <= -self.stop_loss {
            Some(ExitReason::StopLoss)
        } else if move_since_entry >= self.take_profit {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }
}

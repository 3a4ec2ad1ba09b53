//! Open positions, closed trades and equity points.

use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Long,
    Short,
}

/// Simulator state per bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl From<Direction> for PositionState {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => PositionState::Long,
            Direction::Short => PositionState::Short,
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    #[default]
    Signal,
    StopLoss,
    TakeProfit,
    /// Equity reached zero; the account cannot open further positions.
    Liquidation,
}

/// An open position. `size` is the fraction of `entry_equity` committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub size: f64,
    pub entry_equity: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    /// Price return before costs, signed by direction.
    pub fn gross_return(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => price / self.entry_price - 1.0,
            Direction::Short => (self.entry_price - price) / self.entry_price,
        }
    }

    /// Account equity if marked at `price` with `cost` (as a fraction) deducted.
    pub fn marked_equity(&self, price: f64, cost: f64) -> f64 {
        self.entry_equity * (1.0 + self.size * (self.gross_return(price) - cost))
    }

    /// Closes at `exit_price`, charging `round_trip_cost` against the return.
    pub fn close(&self, exit_time: NaiveDateTime, exit_price: f64, round_trip_cost: f64) -> Trade {
        Trade {
            entry_time: self.entry_time,
            exit_time,
            entry_price: self.entry_price,
            exit_price,
            direction: self.direction,
            size: self.size,
            return_pct: self.gross_return(exit_price) - round_trip_cost,
            exit_reason: ExitReason::Signal,
        }
    }
}

/// A completed round trip. `return_pct` is net of costs, as a fraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub direction: Direction,
    pub size: f64,
    pub return_pct: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.return_pct > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.return_pct < 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

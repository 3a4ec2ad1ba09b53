//! Position simulation with next-bar execution.
//!
//! A signal read on bar N that changes the desired position is filled at the
//! close of bar N+1. Orders waiting on an unusable close are carried to the
//! next valid close and recorded as [`DataQualityKind::DeferredExecution`].
//!
//! Equity never goes below zero. A position whose marked or realized equity
//! reaches zero is closed as a liquidation and no further positions open.

use serde::Serialize;

use crate::domain::error::SignalbenchError;
use crate::domain::indicator_helpers::calc_atr;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::position::{Direction, EquityPoint, ExitReason, Position, PositionState, Trade};
use crate::domain::quality::{DataQualityIssue, DataQualityKind};
use crate::domain::risk::{ExitLevels, RiskExits};
use crate::domain::signal::{Signal, SignalSeries};
use crate::domain::sizing::SizingRule;

/// Per-side trading costs, in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionConfig {
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

impl ExecutionConfig {
    /// Cost of one side as a fraction of notional.
    pub fn cost_per_side(&self) -> f64 {
        (self.commission_pct + self.slippage_pct) / 100.0
    }

    pub fn round_trip_cost(&self) -> f64 {
        2.0 * self.cost_per_side()
    }

    pub fn validate(&self) -> Result<(), SignalbenchError> {
        for (key, value) in [
            ("commission_pct", self.commission_pct),
            ("slippage_pct", self.slippage_pct),
        ] {
            if !value.is_finite() || !(0.0..100.0).contains(&value) {
                return Err(SignalbenchError::invalid(
                    "backtest",
                    key,
                    format!("must be in [0, 100), got {}", value),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub position_trace: Vec<PositionState>,
    /// Still open at the last bar; included in the equity curve, not in `trades`.
    pub open_position: Option<Position>,
    pub issues: Vec<DataQualityIssue>,
}

impl SimulationResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|p| p.equity)
    }
}

fn target_state(signal: Signal) -> PositionState {
    match signal {
        Signal::Long => PositionState::Long,
        Signal::Short => PositionState::Short,
        Signal::Flat => PositionState::Flat,
    }
}

/// An order waiting for the next valid close.
#[derive(Debug, Clone, Copy)]
struct Order {
    target: PositionState,
    reason: ExitReason,
}

struct Simulator<'a> {
    series: &'a PriceSeries,
    closes: Vec<Option<f64>>,
    sizing: &'a SizingRule,
    config: &'a ExecutionConfig,
    risk: Option<&'a RiskExits>,
    atr: Vec<Option<f64>>,
    realized_equity: f64,
    last_mark: f64,
    position: Option<Position>,
    levels: Option<ExitLevels>,
    /// Direction last closed by a risk exit; re-entry waits for the signal to leave it.
    stopped: Option<Direction>,
    trades: Vec<Trade>,
    issues: Vec<DataQualityIssue>,
}

impl<'a> Simulator<'a> {
    fn new(
        series: &'a PriceSeries,
        initial_capital: f64,
        sizing: &'a SizingRule,
        config: &'a ExecutionConfig,
        risk: Option<&'a RiskExits>,
    ) -> Self {
        let atr = risk
            .map(|r| calc_atr(series, r.atr_period).simple_values())
            .unwrap_or_default();
        Simulator {
            series,
            closes: series.close_values(),
            sizing,
            config,
            risk,
            atr,
            realized_equity: initial_capital,
            last_mark: initial_capital,
            position: None,
            levels: None,
            stopped: None,
            trades: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn state(&self) -> PositionState {
        self.position
            .as_ref()
            .map_or(PositionState::Flat, |p| p.direction.into())
    }

    fn record(&mut self, index: usize, kind: DataQualityKind) {
        self.issues.push(DataQualityIssue {
            index,
            timestamp: self.series.bars()[index].timestamp,
            kind,
        });
    }

    /// Closes the open position at bar `i`. Equity at or below zero is a
    /// liquidation: the trade is tagged and the account is floored at zero.
    fn close_position(&mut self, i: usize, price: f64, reason: ExitReason) {
        let Some(position) = self.position.take() else {
            return;
        };
        self.levels = None;
        let timestamp = self.series.bars()[i].timestamp;
        let mut trade = position.close(timestamp, price, self.config.round_trip_cost());
        let equity = position.entry_equity * (1.0 + position.size * trade.return_pct);

        if equity <= 0.0 {
            trade.exit_reason = ExitReason::Liquidation;
            self.realized_equity = 0.0;
            tracing::warn!(
                symbol = self.series.symbol(),
                direction = ?trade.direction,
                at = %timestamp,
                return_pct = trade.return_pct,
                "position liquidated: equity exhausted"
            );
            self.record(i, DataQualityKind::Liquidation);
        } else {
            trade.exit_reason = reason;
            self.realized_equity = equity;
        }
        tracing::debug!(
            symbol = self.series.symbol(),
            direction = ?trade.direction,
            entry = %trade.entry_time,
            exit = %trade.exit_time,
            return_pct = trade.return_pct,
            reason = ?trade.exit_reason,
            "closed position"
        );
        self.trades.push(trade);
    }

    fn open_position(&mut self, direction: Direction, i: usize, price: f64) {
        let timestamp = self.series.bars()[i].timestamp;
        if self.realized_equity <= 0.0 {
            tracing::debug!(
                symbol = self.series.symbol(),
                at = %timestamp,
                "order ignored: no equity left"
            );
            return;
        }
        let size = self.sizing.fraction(&self.trades, &self.closes, i);
        self.levels = self.risk.map(|risk| {
            let atr = self.atr.get(i).copied().flatten();
            risk.levels(atr, price, &self.closes, i)
        });
        tracing::debug!(
            symbol = self.series.symbol(),
            ?direction,
            price,
            size,
            at = %timestamp,
            levels = ?self.levels,
            "opened position"
        );
        self.position = Some(Position {
            direction,
            entry_price: price,
            entry_time: timestamp,
            size,
            entry_equity: self.realized_equity,
        });
    }

    /// Moves to `order.target` at bar `i`'s close: closes any open position,
    /// then opens the new one on the post-close equity.
    fn execute(&mut self, order: Order, i: usize, price: f64) {
        self.close_position(i, price, order.reason);
        match order.target {
            PositionState::Long => self.open_position(Direction::Long, i, price),
            PositionState::Short => self.open_position(Direction::Short, i, price),
            PositionState::Flat => {}
        }
    }

    fn mark(&mut self, i: usize) -> f64 {
        let exhausted = match (&self.position, self.closes[i]) {
            (Some(p), Some(price)) => p.marked_equity(price, self.config.cost_per_side()) <= 0.0,
            _ => false,
        };
        if let (true, Some(price)) = (exhausted, self.closes[i]) {
            self.close_position(i, price, ExitReason::Liquidation);
        }
        let equity = match (&self.position, self.closes[i]) {
            (Some(p), Some(price)) => p.marked_equity(price, self.config.cost_per_side()),
            (Some(_), None) => self.last_mark,
            (None, _) => self.realized_equity,
        };
        self.last_mark = equity;
        equity
    }

    /// Risk exit triggered by bar `i`'s close, if levels are set.
    fn risk_exit(&self, i: usize) -> Option<ExitReason> {
        match (&self.position, &self.levels, self.closes[i]) {
            (Some(position), Some(levels), Some(price)) => levels.check(position, price),
            _ => None,
        }
    }

    /// The signal's target state, held at Flat while it still points the way
    /// a risk exit just closed.
    fn desired(&mut self, signal: Signal) -> PositionState {
        let desired = target_state(signal);
        match self.stopped {
            Some(direction) if desired == PositionState::from(direction) => PositionState::Flat,
            _ => {
                self.stopped = None;
                desired
            }
        }
    }
}

/// Walks `signals` over `series` bar by bar, applying `risk` exits when given.
pub fn simulate(
    series: &PriceSeries,
    signals: &SignalSeries,
    initial_capital: f64,
    sizing: &SizingRule,
    config: &ExecutionConfig,
    risk: Option<&RiskExits>,
) -> SimulationResult {
    let mut sim = Simulator::new(series, initial_capital, sizing, config, risk);
    let mut equity_curve = Vec::with_capacity(series.len());
    let mut position_trace = Vec::with_capacity(series.len());
    let mut pending: Option<Order> = None;

    for (i, bar) in series.bars().iter().enumerate() {
        if let Some(order) = pending {
            match sim.closes[i] {
                Some(price) => {
                    sim.execute(order, i, price);
                    pending = None;
                }
                None => {
                    tracing::debug!(
                        symbol = series.symbol(),
                        at = %bar.timestamp,
                        "execution deferred: no valid close"
                    );
                    sim.record(i, DataQualityKind::DeferredExecution);
                }
            }
        }

        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: sim.mark(i),
        });
        position_trace.push(sim.state());

        if pending.is_some_and(|order| order.reason != ExitReason::Signal) {
            continue;
        }
        if let Some(reason) = sim.risk_exit(i) {
            sim.stopped = sim.position.as_ref().map(|p| p.direction);
            pending = Some(Order {
                target: PositionState::Flat,
                reason,
            });
        } else if let Some(point) = signals.points.get(i) {
            let desired = sim.desired(point.signal);
            pending = (desired != sim.state()).then_some(Order {
                target: desired,
                reason: ExitReason::Signal,
            });
        }
    }

    SimulationResult {
        trades: sim.trades,
        equity_curve,
        position_trace,
        open_position: sim.position,
        issues: sim.issues,
    }
}

/// One long trade from the first to the last valid close at full size.
pub fn simulate_buy_and_hold(
    series: &PriceSeries,
    initial_capital: f64,
    config: &ExecutionConfig,
) -> SimulationResult {
    let sizing = SizingRule::FixedFraction { fraction: 1.0 };
    let mut sim = Simulator::new(series, initial_capital, &sizing, config, None);
    let first = series.first_valid_close();
    let last = series
        .last_valid_close()
        .filter(|(last, _)| first.is_some_and(|(first, _)| *last > first));
    let order = |target| Order {
        target,
        reason: ExitReason::Signal,
    };

    let mut equity_curve = Vec::with_capacity(series.len());
    let mut position_trace = Vec::with_capacity(series.len());
    for (i, bar) in series.bars().iter().enumerate() {
        match (first, last) {
            (Some((f, price)), _) if f == i => sim.execute(order(PositionState::Long), i, price),
            (_, Some((l, price))) if l == i => sim.execute(order(PositionState::Flat), i, price),
            _ => {}
        }
        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: sim.mark(i),
        });
        position_trace.push(sim.state());
    }

    SimulationResult {
        trades: sim.trades,
        equity_curve,
        position_trace,
        open_position: sim.position,
        issues: sim.issues,
    }
}

//! Backtest orchestration: validate, scan, signal, simulate, evaluate.

use serde::Serialize;

use crate::domain::error::SignalbenchError;
use crate::domain::execution::{simulate, simulate_buy_and_hold, ExecutionConfig, SimulationResult};
use crate::domain::metrics::PerformanceReport;
use crate::domain::ohlcv::{PriceSeries, Timeframe};
use crate::domain::position::{EquityPoint, Position, PositionState, Trade};
use crate::domain::quality::{self, AnomalyConfig, DataQualityIssue};
use crate::domain::regime::{classify, stratify, MarketCondition, RegimeConfig, RegimePerformance};
use crate::domain::risk::RiskExits;
use crate::domain::signal::{Signal, SignalSeries};
use crate::domain::sizing::SizingRule;
use crate::domain::strategy::Strategy;

pub const BUY_AND_HOLD: &str = "Buy & Hold";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestConfig {
    pub timeframe: Timeframe,
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    pub sizing: SizingRule,
    /// Annual rate, as a fraction.
    pub risk_free_rate: f64,
    pub regime: Option<RegimeConfig>,
    /// Stop-loss and take-profit exits; strategy runs only.
    pub risk: Option<RiskExits>,
    pub anomaly: Option<AnomalyConfig>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            timeframe: Timeframe::Day1,
            initial_capital: 10_000.0,
            execution: ExecutionConfig::default(),
            sizing: SizingRule::default(),
            risk_free_rate: 0.0,
            regime: None,
            risk: None,
            anomaly: None,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), SignalbenchError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(SignalbenchError::invalid(
                "backtest",
                "initial_capital",
                format!("must be positive, got {}", self.initial_capital),
            ));
        }
        if !self.risk_free_rate.is_finite() || self.risk_free_rate.abs() >= 1.0 {
            return Err(SignalbenchError::invalid(
                "backtest",
                "risk_free_rate",
                "must be an annual fraction in (-1, 1)",
            ));
        }
        self.execution.validate()?;
        self.sizing.validate()?;
        if let Some(regime) = &self.regime {
            regime.validate()?;
        }
        if let Some(risk) = &self.risk {
            risk.validate()?;
        }
        if let Some(anomaly) = &self.anomaly {
            anomaly.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: String,
    pub timeframe: Timeframe,
    pub initial_capital: f64,
    #[serde(skip)]
    pub signals: SignalSeries,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    #[serde(skip)]
    pub position_trace: Vec<PositionState>,
    pub open_position: Option<Position>,
    pub report: PerformanceReport,
    pub market_conditions: Vec<MarketCondition>,
    pub regime_performance: Vec<RegimePerformance>,
    pub data_quality: Vec<DataQualityIssue>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }
}

fn ensure_data(series: &PriceSeries) -> Result<(), SignalbenchError> {
    if series.first_valid_close().is_none() {
        return Err(SignalbenchError::NoData {
            symbol: series.symbol().to_string(),
        });
    }
    Ok(())
}

fn scan_quality(series: &PriceSeries, config: &BacktestConfig) -> Vec<DataQualityIssue> {
    let mut issues = quality::scan(series, config.timeframe);
    if let Some(anomaly) = &config.anomaly {
        issues.extend(quality::detect_anomalies(series, anomaly));
    }
    issues
}

fn assemble(
    series: &PriceSeries,
    strategy: String,
    config: &BacktestConfig,
    signals: SignalSeries,
    sim: SimulationResult,
    mut data_quality: Vec<DataQualityIssue>,
) -> BacktestResult {
    data_quality.extend(sim.issues);
    data_quality.sort_by_key(|issue| issue.index);

    let report = PerformanceReport::compute(
        &sim.equity_curve,
        &sim.trades,
        config.timeframe,
        config.risk_free_rate,
    );

    let (market_conditions, regime_performance) = match &config.regime {
        Some(regime) => {
            let conditions = classify(series, regime);
            let performance = stratify(
                &conditions,
                &sim.equity_curve,
                &sim.trades,
                config.timeframe,
                config.risk_free_rate,
            );
            (conditions, performance)
        }
        None => (Vec::new(), Vec::new()),
    };

    tracing::info!(
        symbol = series.symbol(),
        strategy = %strategy,
        trades = sim.trades.len(),
        total_return = report.total_return,
        issues = data_quality.len(),
        "backtest complete"
    );

    BacktestResult {
        symbol: series.symbol().to_string(),
        strategy,
        timeframe: config.timeframe,
        initial_capital: config.initial_capital,
        signals,
        trades: sim.trades,
        equity_curve: sim.equity_curve,
        position_trace: sim.position_trace,
        open_position: sim.open_position,
        report,
        market_conditions,
        regime_performance,
        data_quality,
    }
}

pub fn run_backtest(
    series: &PriceSeries,
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, SignalbenchError> {
    config.validate()?;
    strategy.validate()?;
    ensure_data(series)?;

    if series.len() <= strategy.warmup() {
        tracing::warn!(
            symbol = series.symbol(),
            bars = series.len(),
            warmup = strategy.warmup(),
            "series is shorter than the strategy warmup; no signals can fire"
        );
    }

    let data_quality = scan_quality(series, config);
    let signals = strategy.generate_signals(series);
    let sim = simulate(
        series,
        &signals,
        config.initial_capital,
        &config.sizing,
        &config.execution,
        config.risk.as_ref(),
    );

    Ok(assemble(series, strategy.name(), config, signals, sim, data_quality))
}

/// Baseline: long from the first valid close to the last, at full size.
pub fn run_buy_and_hold(
    series: &PriceSeries,
    config: &BacktestConfig,
) -> Result<BacktestResult, SignalbenchError> {
    config.validate()?;
    ensure_data(series)?;

    let data_quality = scan_quality(series, config);
    let sim = simulate_buy_and_hold(series, config.initial_capital, &config.execution);
    let signals = sim
        .position_trace
        .iter()
        .map(|state| match state {
            PositionState::Long => Signal::Long,
            PositionState::Short => Signal::Short,
            PositionState::Flat => Signal::Flat,
        })
        .collect();
    let signals = SignalSeries::new(&series.timestamps(), signals);

    Ok(assemble(
        series,
        BUY_AND_HOLD.to_string(),
        config,
        signals,
        sim,
        data_quality,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{MetricValue, UndefinedReason};
    use crate::domain::ohlcv::PriceBar;
    use chrono::{Duration, NaiveDate};

    fn make_series(prices: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar::from_close(start + Duration::days(i as i64), close))
            .collect();
        PriceSeries::new("BTCUSDT", bars).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(BacktestConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_capital() {
        let config = BacktestConfig {
            initial_capital: 0.0,
            ..BacktestConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn invalid_strategy_fails_before_computation() {
        let series = make_series(&[100.0; 10]);
        let err = run_backtest(&series, &Strategy::sma_crossover(20, 5), &BacktestConfig::default())
            .unwrap_err();
        assert!(matches!(err, SignalbenchError::ConfigInvalid { .. }));
    }

    #[test]
    fn empty_series_is_no_data() {
        let series = PriceSeries::new("BTCUSDT", vec![]).unwrap();
        let err = run_buy_and_hold(&series, &BacktestConfig::default()).unwrap_err();
        assert!(matches!(err, SignalbenchError::NoData { .. }));
    }

    #[test]
    fn flat_series_produces_no_trades() {
        let series = make_series(&[100.0; 50]);
        let result =
            run_backtest(&series, &Strategy::sma_crossover(5, 20), &BacktestConfig::default())
                .unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.report.total_return, 0.0);
        assert_eq!(
            result.report.sharpe_ratio,
            MetricValue::Undefined(UndefinedReason::ZeroVariance)
        );
        assert_eq!(result.equity_curve.len(), 50);
        assert_eq!(result.signals.len(), 50);
    }

    #[test]
    fn regime_breakdown_is_attached_when_configured() {
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let config = BacktestConfig {
            regime: Some(RegimeConfig {
                window: 20,
                ..RegimeConfig::default()
            }),
            ..BacktestConfig::default()
        };
        let result = run_buy_and_hold(&make_series(&prices), &config).unwrap();
        assert_eq!(result.market_conditions.len(), 3);
        assert!(!result.regime_performance.is_empty());
        assert_eq!(result.strategy, BUY_AND_HOLD);
    }

    #[test]
    fn deferred_executions_are_reported() {
        let mut prices: Vec<f64> = (0..30).map(|i| 200.0 - i as f64 * 3.0).collect();
        prices.extend((0..30).map(|i| 113.0 + i as f64 * 3.0));
        let baseline = run_backtest(
            &make_series(&prices),
            &Strategy::sma_crossover(3, 10),
            &BacktestConfig::default(),
        )
        .unwrap();
        let entry_index = baseline
            .position_trace
            .iter()
            .position(|s| *s == PositionState::Long)
            .unwrap();

        prices[entry_index] = f64::NAN;
        let result = run_backtest(
            &make_series(&prices),
            &Strategy::sma_crossover(3, 10),
            &BacktestConfig::default(),
        )
        .unwrap();
        assert!(result
            .data_quality
            .iter()
            .any(|i| i.kind == crate::domain::quality::DataQualityKind::DeferredExecution));
        assert!(result
            .data_quality
            .iter()
            .any(|i| i.kind == crate::domain::quality::DataQualityKind::MissingClose));
    }

    #[test]
    fn anomalies_are_reported_when_configured() {
        let mut prices = vec![100.0; 40];
        prices[30] = 150.0;
        let series = make_series(&prices);
        let plain = run_buy_and_hold(&series, &BacktestConfig::default()).unwrap();
        assert!(plain.data_quality.is_empty());

        let config = BacktestConfig {
            anomaly: Some(AnomalyConfig::default()),
            ..BacktestConfig::default()
        };
        let result = run_buy_and_hold(&series, &config).unwrap();
        assert!(!result.data_quality.is_empty());
        assert!(result.data_quality.iter().all(|i| i.index == 30
            && matches!(i.kind, crate::domain::quality::DataQualityKind::Anomaly { .. })));
    }

    #[test]
    fn invalid_risk_exits_fail_validation() {
        let config = BacktestConfig {
            risk: Some(RiskExits {
                take_profit: -0.1,
                ..RiskExits::default()
            }),
            ..BacktestConfig::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            SignalbenchError::ConfigInvalid { ref key, .. } if key == "take_profit"
        ));
    }
}

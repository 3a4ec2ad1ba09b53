//! Configuration loading and validation.
//!
//! Turns INI lookups into typed configs, failing with the offending
//! `[section] key` before any computation runs.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::SignalbenchError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::indicator::{bollinger, macd, stochastic};
use crate::domain::ohlcv::Timeframe;
use crate::domain::quality::AnomalyConfig;
use crate::domain::regime::RegimeConfig;
use crate::domain::risk::RiskExits;
use crate::domain::sizing::{AdaptiveKellyParams, SizingRule};
use crate::domain::strategy::{
    BreakoutParams, CrossoverKind, CrossoverParams, MeanReversionParams, OscillatorParams,
    Strategy,
};
use crate::domain::sweep::ParamGrid;
use crate::ports::config_port::ConfigPort;

fn double(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, SignalbenchError> {
    config
        .get_double(section, key)
        .map_err(|reason| SignalbenchError::invalid(section, key, reason))
        .map(|v| v.unwrap_or(default))
}

fn period(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, SignalbenchError> {
    match config
        .get_int(section, key)
        .map_err(|reason| SignalbenchError::invalid(section, key, reason))?
    {
        None => Ok(default),
        Some(v) => usize::try_from(v)
            .map_err(|_| SignalbenchError::invalid(section, key, format!("must be non-negative, got {}", v))),
    }
}

fn flag(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, SignalbenchError> {
    config
        .get_bool(section, key)
        .map_err(|reason| SignalbenchError::invalid(section, key, reason))
        .map(|v| v.unwrap_or(default))
}

pub fn load_timeframe(config: &dyn ConfigPort) -> Result<Timeframe, SignalbenchError> {
    match config.get_string("backtest", "timeframe") {
        None => Ok(Timeframe::Day1),
        Some(raw) => raw
            .parse()
            .map_err(|reason: String| SignalbenchError::invalid("backtest", "timeframe", reason)),
    }
}

pub fn load_strategy(config: &dyn ConfigPort) -> Result<Strategy, SignalbenchError> {
    const S: &str = "strategy";
    let kind = config
        .get_string(S, "type")
        .ok_or_else(|| SignalbenchError::missing(S, "type"))?;
    let allow_short = flag(config, S, "allow_short", false)?;

    let strategy = match kind.to_lowercase().as_str() {
        "sma_crossover" => Strategy::Crossover(CrossoverParams {
            kind: CrossoverKind::Sma,
            fast: period(config, S, "fast", 20)?,
            slow: period(config, S, "slow", 50)?,
            allow_short,
        }),
        "ema_crossover" => Strategy::Crossover(CrossoverParams {
            kind: CrossoverKind::Ema,
            fast: period(config, S, "fast", 12)?,
            slow: period(config, S, "slow", 26)?,
            allow_short,
        }),
        "macd_crossover" => Strategy::Crossover(CrossoverParams {
            kind: CrossoverKind::Macd {
                signal: period(config, S, "signal", macd::DEFAULT_SIGNAL)?,
            },
            fast: period(config, S, "fast", macd::DEFAULT_FAST)?,
            slow: period(config, S, "slow", macd::DEFAULT_SLOW)?,
            allow_short,
        }),
        "bollinger" => Strategy::MeanReversion(MeanReversionParams {
            window: period(config, S, "window", bollinger::DEFAULT_PERIOD)?,
            num_std: double(config, S, "num_std", bollinger::DEFAULT_NUM_STD)?,
            allow_short,
        }),
        "stochastic" => Strategy::OscillatorThreshold(OscillatorParams {
            k_period: period(config, S, "k_period", stochastic::DEFAULT_K_PERIOD)?,
            d_period: period(config, S, "d_period", stochastic::DEFAULT_D_PERIOD)?,
            oversold: double(config, S, "oversold", stochastic::DEFAULT_OVERSOLD)?,
            overbought: double(config, S, "overbought", stochastic::DEFAULT_OVERBOUGHT)?,
            allow_short,
        }),
        "breakout" => Strategy::Breakout(BreakoutParams {
            lookback: period(config, S, "lookback", 20)?,
            allow_short,
        }),
        other => {
            return Err(SignalbenchError::invalid(
                S,
                "type",
                format!(
                    "unknown strategy '{}', expected one of sma_crossover, ema_crossover, \
                     macd_crossover, bollinger, stochastic, breakout",
                    other
                ),
            ));
        }
    };

    strategy.validate()?;
    Ok(strategy)
}

pub fn load_sizing(config: &dyn ConfigPort) -> Result<SizingRule, SignalbenchError> {
    const S: &str = "sizing";
    let rule = config.get_string(S, "rule").unwrap_or_else(|| "fixed".to_string());
    let sizing = match rule.to_lowercase().as_str() {
        "fixed" | "fixed_fraction" => SizingRule::FixedFraction {
            fraction: double(config, S, "fraction", 1.0)?,
        },
        "adaptive_kelly" | "kelly" => {
            let d = AdaptiveKellyParams::default();
            SizingRule::AdaptiveKelly(AdaptiveKellyParams {
                base_fraction: double(config, S, "base_fraction", d.base_fraction)?,
                kelly_multiplier: double(config, S, "kelly_multiplier", d.kelly_multiplier)?,
                max_fraction: double(config, S, "max_fraction", d.max_fraction)?,
                lookback: period(config, S, "lookback", d.lookback)?,
                min_trades: period(config, S, "min_trades", d.min_trades)?,
            })
        }
        other => {
            return Err(SignalbenchError::invalid(
                S,
                "rule",
                format!("unknown sizing rule '{}', expected fixed or adaptive_kelly", other),
            ));
        }
    };
    sizing.validate()?;
    Ok(sizing)
}

/// `None` unless a `[regime]` section is present and not disabled.
pub fn load_regime(config: &dyn ConfigPort) -> Result<Option<RegimeConfig>, SignalbenchError> {
    const S: &str = "regime";
    if !config.has_section(S) || !flag(config, S, "enabled", true)? {
        return Ok(None);
    }
    let d = RegimeConfig::default();
    let regime = RegimeConfig {
        window: period(config, S, "window", d.window)?,
        trend_threshold: double(config, S, "trend_threshold", d.trend_threshold)?,
        volatility_threshold: double(config, S, "volatility_threshold", d.volatility_threshold)?,
    };
    regime.validate()?;
    Ok(Some(regime))
}

/// `None` unless a `[risk]` section is present and not disabled.
pub fn load_risk(config: &dyn ConfigPort) -> Result<Option<RiskExits>, SignalbenchError> {
    const S: &str = "risk";
    if !config.has_section(S) || !flag(config, S, "enabled", true)? {
        return Ok(None);
    }
    let d = RiskExits::default();
    let risk = RiskExits {
        stop_loss: double(config, S, "stop_loss", d.stop_loss)?,
        take_profit: double(config, S, "take_profit", d.take_profit)?,
        atr_period: period(config, S, "atr_period", d.atr_period)?,
        lookback: period(config, S, "lookback", d.lookback)?,
    };
    risk.validate()?;
    Ok(Some(risk))
}

/// `None` unless an `[anomaly]` section is present and not disabled.
pub fn load_anomaly(config: &dyn ConfigPort) -> Result<Option<AnomalyConfig>, SignalbenchError> {
    const S: &str = "anomaly";
    if !config.has_section(S) || !flag(config, S, "enabled", true)? {
        return Ok(None);
    }
    let d = AnomalyConfig::default();
    let anomaly = AnomalyConfig {
        window: period(config, S, "window", d.window)?,
        threshold: double(config, S, "threshold", d.threshold)?,
    };
    anomaly.validate()?;
    Ok(Some(anomaly))
}

/// Parses a comma-separated list of periods such as `10, 20, 30`.
pub fn parse_periods(section: &str, key: &str, raw: &str) -> Result<Vec<usize>, SignalbenchError> {
    let periods = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| SignalbenchError::invalid(section, key, format!("'{}' is not a period", s)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if periods.is_empty() {
        return Err(SignalbenchError::invalid(section, key, "list is empty"));
    }
    if periods.contains(&0) {
        return Err(SignalbenchError::invalid(section, key, "periods must be at least 1"));
    }
    Ok(periods)
}

/// Reads `[sweep]`; every key is optional.
pub fn load_param_grid(config: &dyn ConfigPort) -> Result<ParamGrid, SignalbenchError> {
    const S: &str = "sweep";
    let d = ParamGrid::default();
    let kind = match config.get_string(S, "kind").map(|k| k.to_lowercase()) {
        None => d.kind,
        Some(k) if k == "sma" => CrossoverKind::Sma,
        Some(k) if k == "ema" => CrossoverKind::Ema,
        Some(other) => {
            return Err(SignalbenchError::invalid(
                S,
                "kind",
                format!("unknown crossover kind '{}', expected sma or ema", other),
            ));
        }
    };
    let list = |key: &str, default: Vec<usize>| match config.get_string(S, key) {
        Some(raw) => parse_periods(S, key, &raw),
        None => Ok(default),
    };
    Ok(ParamGrid {
        kind,
        fast_periods: list("fast_periods", d.fast_periods)?,
        slow_periods: list("slow_periods", d.slow_periods)?,
    })
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SignalbenchError> {
    const S: &str = "backtest";
    let d = BacktestConfig::default();
    let backtest = BacktestConfig {
        timeframe: load_timeframe(config)?,
        initial_capital: double(config, S, "initial_capital", d.initial_capital)?,
        execution: ExecutionConfig {
            commission_pct: double(config, S, "commission_pct", 0.0)?,
            slippage_pct: double(config, S, "slippage_pct", 0.0)?,
        },
        sizing: load_sizing(config)?,
        risk_free_rate: double(config, S, "risk_free_rate", d.risk_free_rate)?,
        regime: load_regime(config)?,
        risk: load_risk(config)?,
        anomaly: load_anomaly(config)?,
    };
    backtest.validate()?;
    Ok(backtest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid(err: SignalbenchError, expected_section: &str, expected_key: &str) {
        match err {
            SignalbenchError::ConfigInvalid { section, key, .. } => {
                assert_eq!(section, expected_section);
                assert_eq!(key, expected_key);
            }
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn full_config_loads() {
        let config = make_config(
            r#"
[backtest]
timeframe = 4h
initial_capital = 5000
commission_pct = 0.1
slippage_pct = 0.05
risk_free_rate = 0.02

[strategy]
type = ema_crossover
fast = 9
slow = 21
allow_short = yes

[sizing]
rule = adaptive_kelly
max_fraction = 0.5

[regime]
window = 14
"#,
        );
        let backtest = load_backtest_config(&config).unwrap();
        assert_eq!(backtest.timeframe, Timeframe::Hour4);
        assert_eq!(backtest.initial_capital, 5000.0);
        assert_eq!(backtest.execution.commission_pct, 0.1);
        assert_eq!(backtest.risk_free_rate, 0.02);
        match &backtest.sizing {
            SizingRule::AdaptiveKelly(p) => assert_eq!(p.max_fraction, 0.5),
            other => panic!("unexpected sizing {other:?}"),
        }
        assert_eq!(backtest.regime.as_ref().unwrap().window, 14);

        let strategy = load_strategy(&config).unwrap();
        assert_eq!(
            strategy,
            Strategy::Crossover(CrossoverParams {
                kind: CrossoverKind::Ema,
                fast: 9,
                slow: 21,
                allow_short: true,
            })
        );
    }

    #[test]
    fn defaults_apply_for_empty_backtest_section() {
        let config = make_config("[backtest]\n");
        let backtest = load_backtest_config(&config).unwrap();
        assert_eq!(backtest, BacktestConfig::default());
    }

    #[test]
    fn strategy_type_is_required() {
        let err = load_strategy(&make_config("[strategy]\nfast = 5\n")).unwrap_err();
        assert!(matches!(err, SignalbenchError::ConfigMissing { key, .. } if key == "type"));
    }

    #[test]
    fn unknown_strategy_type_fails() {
        let err = load_strategy(&make_config("[strategy]\ntype = rsi\n")).unwrap_err();
        assert_invalid(err, "strategy", "type");
    }

    #[test]
    fn fast_not_less_than_slow_fails() {
        let err = load_strategy(&make_config("[strategy]\ntype = sma_crossover\nfast = 50\nslow = 20\n"))
            .unwrap_err();
        assert_invalid(err, "strategy", "fast");
    }

    #[test]
    fn negative_period_fails() {
        let err = load_strategy(&make_config("[strategy]\ntype = breakout\nlookback = -3\n")).unwrap_err();
        assert_invalid(err, "strategy", "lookback");
    }

    #[test]
    fn non_numeric_value_fails() {
        let err = load_strategy(&make_config("[strategy]\ntype = bollinger\nnum_std = wide\n"))
            .unwrap_err();
        assert_invalid(err, "strategy", "num_std");
    }

    #[test]
    fn strategy_defaults() {
        let strategy = load_strategy(&make_config("[strategy]\ntype = stochastic\n")).unwrap();
        assert_eq!(
            strategy,
            Strategy::OscillatorThreshold(OscillatorParams {
                k_period: 14,
                d_period: 3,
                oversold: 20.0,
                overbought: 80.0,
                allow_short: false,
            })
        );
    }

    #[test]
    fn indicator_defaults_follow_indicator_modules() {
        let strategy = load_strategy(&make_config("[strategy]\ntype = macd_crossover\n")).unwrap();
        assert_eq!(
            strategy,
            Strategy::Crossover(CrossoverParams {
                kind: CrossoverKind::Macd {
                    signal: macd::DEFAULT_SIGNAL,
                },
                fast: macd::DEFAULT_FAST,
                slow: macd::DEFAULT_SLOW,
                allow_short: false,
            })
        );
        let strategy = load_strategy(&make_config("[strategy]\ntype = bollinger\n")).unwrap();
        assert_eq!(
            strategy,
            Strategy::MeanReversion(MeanReversionParams {
                window: bollinger::DEFAULT_PERIOD,
                num_std: bollinger::DEFAULT_NUM_STD,
                allow_short: false,
            })
        );
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let err = load_backtest_config(&make_config("[backtest]\ninitial_capital = -100\n")).unwrap_err();
        assert_invalid(err, "backtest", "initial_capital");
    }

    #[test]
    fn negative_commission_fails() {
        let err = load_backtest_config(&make_config("[backtest]\ncommission_pct = -0.1\n")).unwrap_err();
        assert_invalid(err, "backtest", "commission_pct");
    }

    #[test]
    fn bad_timeframe_fails() {
        let err = load_backtest_config(&make_config("[backtest]\ntimeframe = 3d\n")).unwrap_err();
        assert_invalid(err, "backtest", "timeframe");
    }

    #[test]
    fn fixed_fraction_out_of_range_fails() {
        let err = load_sizing(&make_config("[sizing]\nfraction = 1.5\n")).unwrap_err();
        assert_invalid(err, "sizing", "fraction");
    }

    #[test]
    fn regime_absent_or_disabled() {
        assert_eq!(load_regime(&make_config("[backtest]\n")).unwrap(), None);
        assert_eq!(
            load_regime(&make_config("[regime]\nenabled = false\n")).unwrap(),
            None
        );
    }

    #[test]
    fn param_grid_from_sweep_section() {
        let grid = load_param_grid(&make_config(
            "[sweep]\nkind = ema\nfast_periods = 5, 10\nslow_periods = 30\n",
        ))
        .unwrap();
        assert_eq!(grid.kind, CrossoverKind::Ema);
        assert_eq!(grid.fast_periods, vec![5, 10]);
        assert_eq!(grid.slow_periods, vec![30]);

        assert_eq!(load_param_grid(&make_config("[backtest]\n")).unwrap(), ParamGrid::default());
    }

    #[test]
    fn period_list_rejects_garbage() {
        assert_invalid(parse_periods("sweep", "fast_periods", "5,x").unwrap_err(), "sweep", "fast_periods");
        assert_invalid(parse_periods("sweep", "fast_periods", " , ").unwrap_err(), "sweep", "fast_periods");
        assert_invalid(parse_periods("sweep", "slow_periods", "0,10").unwrap_err(), "sweep", "slow_periods");
    }

    #[test]
    fn risk_and_anomaly_sections() {
        let backtest = load_backtest_config(&make_config(
            "[risk]\nstop_loss = 0.03\n\n[anomaly]\nthreshold = 2.5\n",
        ))
        .unwrap();
        let risk = backtest.risk.unwrap();
        assert_eq!(risk.stop_loss, 0.03);
        assert_eq!(risk.take_profit, RiskExits::default().take_profit);
        let anomaly = backtest.anomaly.unwrap();
        assert_eq!(anomaly.threshold, 2.5);
        assert_eq!(anomaly.window, 20);

        assert_eq!(load_risk(&make_config("[risk]\nenabled = false\n")).unwrap(), None);
        assert_eq!(load_anomaly(&make_config("[backtest]\n")).unwrap(), None);
    }

    #[test]
    fn risk_stop_loss_out_of_range_fails() {
        let err = load_risk(&make_config("[risk]\nstop_loss = 1.2\n")).unwrap_err();
        assert_invalid(err, "risk", "stop_loss");
    }

    #[test]
    fn anomaly_window_too_small_fails() {
        let err = load_anomaly(&make_config("[anomaly]\nwindow = 2\n")).unwrap_err();
        assert_invalid(err, "anomaly", "window");
    }

    #[test]
    fn regime_threshold_must_be_positive() {
        let err = load_regime(&make_config("[regime]\ntrend_threshold = 0\n")).unwrap_err();
        assert_invalid(err, "regime", "trend_threshold");
    }
}

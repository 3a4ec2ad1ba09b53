//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report::JsonReportAdapter;
use crate::adapters::text_report::TextReportAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig};
use crate::domain::config_validation::{
    load_backtest_config, load_param_grid, load_strategy, parse_periods,
};
use crate::domain::error::SignalbenchError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::strategy::Strategy;
use crate::domain::sweep::{self, ParamGrid};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "signalbench",
    about = "Indicator signal backtester with regime-aware performance metrics"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one strategy on one symbol against buy-and-hold
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <SYMBOL>_<timeframe>.csv files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        symbol: Option<String>,
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the closed trades as CSV
        #[arg(long)]
        trades: Option<PathBuf>,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run a crossover parameter grid over several symbols
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Comma-separated symbols; defaults to [sweep] symbols, then every file in the data dir
        #[arg(long)]
        symbols: Option<String>,
        /// Comma-separated fast periods
        #[arg(long)]
        fast: Option<String>,
        /// Comma-separated slow periods
        #[arg(long)]
        slow: Option<String>,
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List symbols with data for the configured timeframe
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A subscriber may already be installed when run() is called more than once.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(cli: Cli) -> Result<(), SignalbenchError> {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbol,
            format,
            output,
            trades,
        } => run_backtest(
            &config,
            data_dir.as_deref(),
            symbol.as_deref(),
            format,
            output.as_deref(),
            trades.as_deref(),
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Sweep {
            config,
            data_dir,
            symbols,
            fast,
            slow,
            format,
            output,
        } => run_sweep(
            &config,
            data_dir.as_deref(),
            SweepOverrides {
                symbols: symbols.as_deref(),
                fast: fast.as_deref(),
                slow: slow.as_deref(),
            },
            format,
            output.as_deref(),
        ),
        Command::ListSymbols { config, data_dir } => run_list_symbols(&config, data_dir.as_deref()),
    }
}

pub fn report_adapter(format: ReportFormat) -> Box<dyn ReportPort> {
    match format {
        ReportFormat::Text => Box::new(TextReportAdapter::new()),
        ReportFormat::Json => Box::new(JsonReportAdapter::new()),
    }
}

/// `--data-dir` wins over `[backtest] data_dir`.
pub fn resolve_data_dir(
    cli_value: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, SignalbenchError> {
    cli_value
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("backtest", "data_dir").map(PathBuf::from))
        .ok_or_else(|| SignalbenchError::missing("backtest", "data_dir"))
}

pub fn resolve_symbol(
    cli_value: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, SignalbenchError> {
    cli_value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| config.get_string("backtest", "symbol"))
        .ok_or_else(|| SignalbenchError::missing("backtest", "symbol"))
}

/// Explicit list first, then `[sweep] symbols`, then everything the data port offers.
pub fn resolve_symbols(
    cli_value: Option<&str>,
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
    backtest: &BacktestConfig,
) -> Result<Vec<String>, SignalbenchError> {
    let listed = cli_value
        .map(str::to_string)
        .or_else(|| config.get_string("sweep", "symbols"));
    let symbols: Vec<String> = match listed {
        Some(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => data_port.list_symbols(backtest.timeframe)?,
    };
    if symbols.is_empty() {
        return Err(SignalbenchError::invalid("sweep", "symbols", "no symbols to sweep"));
    }
    Ok(symbols)
}

fn emit(content: &str, output: Option<&Path>) -> Result<(), SignalbenchError> {
    match output {
        Some(path) => {
            std::fs::write(path, content).map_err(|e| SignalbenchError::Report {
                reason: format!("failed to write {}: {}", path.display(), e),
            })?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => print!("{content}"),
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), SignalbenchError> {
    tracing::info!(path = %config_path.display(), "validating config");
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let backtest = load_backtest_config(&adapter)?;
    let strategy = load_strategy(&adapter)?;

    println!("Config OK");
    println!("  strategy:        {}", strategy);
    println!("  timeframe:       {}", backtest.timeframe);
    println!("  initial capital: {:.2}", backtest.initial_capital);
    println!(
        "  costs per side:  {:.4}%",
        backtest.execution.cost_per_side() * 100.0
    );
    match &backtest.regime {
        Some(regime) => println!("  regime window:   {} bars", regime.window),
        None => println!("  regime window:   disabled"),
    }
    if adapter.has_section("sweep") {
        let grid = load_param_grid(&adapter)?;
        println!("  sweep grid:      {} strategies", grid.strategies().len());
    }
    Ok(())
}

fn run_backtest(
    config_path: &Path,
    data_dir: Option<&Path>,
    symbol: Option<&str>,
    format: ReportFormat,
    output: Option<&Path>,
    trades_path: Option<&Path>,
) -> Result<(), SignalbenchError> {
    tracing::info!(path = %config_path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let backtest = load_backtest_config(&adapter)?;
    let strategy = load_strategy(&adapter)?;
    let symbol = resolve_symbol(symbol, &adapter)?;
    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, &adapter)?);

    let content = run_backtest_pipeline(
        &data_port,
        &strategy,
        &backtest,
        &symbol,
        report_adapter(format).as_ref(),
        trades_path,
    )?;
    emit(&content, output)
}

/// Fetch, backtest, baseline, render. Returns the rendered report.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    strategy: &Strategy,
    config: &BacktestConfig,
    symbol: &str,
    report: &dyn ReportPort,
    trades_path: Option<&Path>,
) -> Result<String, SignalbenchError> {
    let series = data_port.fetch_series(symbol, config.timeframe)?;
    tracing::info!(symbol, bars = series.len(), strategy = %strategy, "running backtest");

    let result = backtest_engine::run_backtest(&series, strategy, config)?;
    let baseline = backtest_engine::run_buy_and_hold(&series, config)?;

    if let Some(path) = trades_path {
        CsvAdapter::write_trades(path, &result.trades)?;
        tracing::info!(path = %path.display(), trades = result.trades.len(), "trades written");
    }

    report.render(&result, Some(&baseline))
}

pub struct SweepOverrides<'a> {
    pub symbols: Option<&'a str>,
    pub fast: Option<&'a str>,
    pub slow: Option<&'a str>,
}

/// Applies `--fast`/`--slow` on top of the configured grid.
pub fn build_param_grid(
    config: &dyn ConfigPort,
    overrides: &SweepOverrides<'_>,
) -> Result<ParamGrid, SignalbenchError> {
    let mut grid = load_param_grid(config)?;
    if let Some(raw) = overrides.fast {
        grid.fast_periods = parse_periods("sweep", "fast_periods", raw)?;
    }
    if let Some(raw) = overrides.slow {
        grid.slow_periods = parse_periods("sweep", "slow_periods", raw)?;
    }
    Ok(grid)
}

fn run_sweep(
    config_path: &Path,
    data_dir: Option<&Path>,
    overrides: SweepOverrides<'_>,
    format: ReportFormat,
    output: Option<&Path>,
) -> Result<(), SignalbenchError> {
    tracing::info!(path = %config_path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let backtest = load_backtest_config(&adapter)?;
    let grid = build_param_grid(&adapter, &overrides)?;
    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, &adapter)?);
    let symbols = resolve_symbols(overrides.symbols, &adapter, &data_port, &backtest)?;

    let content = run_sweep_pipeline(
        &data_port,
        &symbols,
        &grid.strategies(),
        &backtest,
        report_adapter(format).as_ref(),
    )?;
    emit(&content, output)
}

/// Symbols that fail to load are skipped with a warning; the sweep fails
/// only when none load.
pub fn run_sweep_pipeline(
    data_port: &dyn DataPort,
    symbols: &[String],
    strategies: &[Strategy],
    config: &BacktestConfig,
    report: &dyn ReportPort,
) -> Result<String, SignalbenchError> {
    config.validate()?;
    let mut loaded: Vec<PriceSeries> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match data_port.fetch_series(symbol, config.timeframe) {
            Ok(series) => loaded.push(series),
            Err(e) => tracing::warn!(symbol = %symbol, error = %e, "skipping symbol"),
        }
    }
    if loaded.is_empty() {
        return Err(SignalbenchError::NoData {
            symbol: symbols.join(","),
        });
    }

    let entries = sweep::run_sweep(&loaded, strategies, config);
    report.render_sweep(&entries)
}

fn run_list_symbols(config_path: &Path, data_dir: Option<&Path>) -> Result<(), SignalbenchError> {
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let backtest = load_backtest_config(&adapter)?;
    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, &adapter)?);
    let symbols = data_port.list_symbols(backtest.timeframe)?;
    if symbols.is_empty() {
        eprintln!("No symbols found for timeframe {}", backtest.timeframe);
    }
    for symbol in &symbols {
        println!("{}", symbol);
    }
    Ok(())
}

//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod execution;
pub mod indicator;
pub mod indicator_helpers;
pub mod signal;
pub mod sizing;
pub mod risk;
pub mod quality;
pub mod backtest;
pub mod metrics;
pub mod regime;
pub mod strategy;
pub mod sweep;
pub mod config_validation;
pub mod error;

//! Deterministic replay of historical ticks through the engine, with
//! ranking and per-coin suggestions over the results.

pub mod result;
pub mod runner;

pub use result::{max_drawdown, profit_factor, BacktestResult, RankMetric};
pub use runner::{BacktestReport, BacktestRunner, BestCombo, Rankings, ReportEntry};

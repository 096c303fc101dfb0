use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use common::{BackpressurePolicy, EngineConfig, Error, Result, Tick};
use engine::Engine;
use strategy::StrategyConfig;

use crate::result::{BacktestResult, RankMetric};

/// The strategy with the highest net P&L of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestCombo {
    pub strategy_id: String,
    pub coin: String,
    pub net_pnl: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    #[serde(flatten)]
    pub result: BacktestResult,
    pub trade_count: usize,
    pub history_len: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rankings {
    pub by_pnl: Vec<(String, f64)>,
    pub by_win_rate: Vec<(String, f64)>,
    pub by_profit_factor: Vec<(String, f64)>,
}

/// Serialisable summary of the most recent run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub generated_at: DateTime<Utc>,
    pub strategies_tested: usize,
    pub results: Vec<ReportEntry>,
    pub rankings: Rankings,
    pub best_combo: Option<BestCombo>,
    pub suggestions: BTreeMap<String, String>,
}

/// Replays a finite tick set through a fresh engine and scores the
/// strategies. Ticks are fed in the order given; the runner never sorts.
pub struct BacktestRunner {
    config: EngineConfig,
    coins: Option<BTreeSet<String>>,
    /// Results of the most recent run, in registration order.
    results: Vec<BacktestResult>,
}

impl BacktestRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            // A replay never drops ticks.
            config: config.with_backpressure(BackpressurePolicy::Block),
            coins: None,
            results: Vec::new(),
        }
    }

    /// Only replay ticks for these coins.
    pub fn with_coins<I, S>(mut self, coins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.coins = Some(coins.into_iter().map(Into::into).collect());
        self
    }

    pub async fn run(
        &mut self,
        ticks: impl IntoIterator<Item = Tick>,
        configs: &[StrategyConfig],
    ) -> Result<BTreeMap<String, BacktestResult>> {
        let ticks: Vec<Tick> = ticks
            .into_iter()
            .filter(|t| match t.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Skipping unusable tick");
                    false
                }
            })
            .filter(|t| self.coins.as_ref().map_or(true, |c| c.contains(&t.coin)))
            .collect();

        if ticks.is_empty() {
            return Err(Error::EmptyDataset);
        }

        info!(
            ticks = ticks.len(),
            strategies = configs.len(),
            workers = self.config.workers,
            "Backtest starting"
        );

        let handle = Engine::start(self.config.clone());

        let mut ids = Vec::with_capacity(configs.len());
        for cfg in configs {
            match handle.register(cfg).await {
                Ok(id) => ids.push(id),
                Err(e) => {
                    handle.shutdown().await;
                    return Err(e);
                }
            }
        }

        for tick in ticks {
            if let Err(e) = handle.submit_tick(tick).await {
                handle.shutdown().await;
                return Err(e);
            }
        }
        handle.shutdown().await;

        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            let Some(metrics) = handle
                .strategy_metrics(Some(id.as_str()))
                .await
                .into_iter()
                .next()
            else {
                continue;
            };
            let trades = handle.trades(Some(id.as_str()), usize::MAX).await;
            let history = handle.pnl_history(Some(id.as_str())).await;
            results.push(BacktestResult::new(metrics, trades, history));
        }

        let metrics = handle.metrics().await;
        info!(
            strategies = results.len(),
            total_trades = metrics.total_trades,
            net_pnl = metrics.net_pnl,
            "Backtest finished"
        );

        self.results = results;
        Ok(self
            .results
            .iter()
            .map(|r| (r.strategy_id().to_string(), r.clone()))
            .collect())
    }

    /// Results of the most recent run, in registration order.
    pub fn results(&self) -> &[BacktestResult] {
        &self.results
    }

    /// `(strategy_id, value)` pairs, highest first. Ties keep registration
    /// order.
    pub fn rank(&self, metric: RankMetric) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .results
            .iter()
            .map(|r| (r.strategy_id().to_string(), r.metric(metric)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn best_combo(&self) -> Option<BestCombo> {
        let mut best: Option<&BacktestResult> = None;
        for result in &self.results {
            if best.map_or(true, |b| result.net_pnl() > b.net_pnl()) {
                best = Some(result);
            }
        }
        best.map(|r| BestCombo {
            strategy_id: r.strategy_id().to_string(),
            coin: r.coin().to_string(),
            net_pnl: r.net_pnl(),
        })
    }

    /// Best strategy id per coin by net P&L. On equal P&L the earlier
    /// registration wins.
    pub fn suggestions_by_coin(&self) -> BTreeMap<String, String> {
        let mut best: BTreeMap<&str, &BacktestResult> = BTreeMap::new();
        for result in &self.results {
            let current = best.entry(result.coin()).or_insert(result);
            if result.net_pnl() > current.net_pnl() {
                *current = result;
            }
        }
        best.into_iter()
            .map(|(coin, r)| (coin.to_string(), r.strategy_id().to_string()))
            .collect()
    }

    pub fn report(&self) -> BacktestReport {
        BacktestReport {
            generated_at: Utc::now(),
            strategies_tested: self.results.len(),
            results: self
                .results
                .iter()
                .map(|r| ReportEntry {
                    trade_count: r.trades.len(),
                    history_len: r.pnl_history.len(),
                    result: r.clone(),
                })
                .collect(),
            rankings: Rankings {
                by_pnl: self.rank(RankMetric::NetPnl),
                by_win_rate: self.rank(RankMetric::WinRate),
                by_profit_factor: self.rank(RankMetric::ProfitFactor),
            },
            best_combo: self.best_combo(),
            suggestions: self.suggestions_by_coin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::StrategyMetrics;

    fn result(id: &str, net_pnl: f64, win_rate: f64) -> BacktestResult {
        let (coin, name) = id.split_once('_').unwrap();
        let mut metrics = StrategyMetrics::new(id, coin, name);
        metrics.net_pnl = net_pnl;
        metrics.total_profit = net_pnl.max(0.0);
        metrics.total_loss = (-net_pnl).max(0.0);
        metrics.win_rate = win_rate;
        BacktestResult::new(metrics, Vec::new(), Vec::new())
    }

    fn runner_with(results: Vec<BacktestResult>) -> BacktestRunner {
        let mut runner = BacktestRunner::new(EngineConfig::default());
        runner.results = results;
        runner
    }

    #[test]
    fn best_combo_and_suggestion_pick_highest_pnl() {
        let runner = runner_with(vec![
            result("BTC_RSI", -10.0, 0.0),
            result("BTC_MACD", 50.0, 100.0),
        ]);
        assert_eq!(
            runner.best_combo(),
            Some(BestCombo {
                strategy_id: "BTC_MACD".into(),
                coin: "BTC".into(),
                net_pnl: 50.0,
            })
        );
        assert_eq!(runner.suggestions_by_coin()["BTC"], "BTC_MACD");
    }

    #[test]
    fn empty_run_has_no_best_combo() {
        let runner = runner_with(Vec::new());
        assert_eq!(runner.best_combo(), None);
        assert!(runner.suggestions_by_coin().is_empty());
        assert!(runner.rank(RankMetric::NetPnl).is_empty());
    }

    #[test]
    fn rank_is_stable_descending() {
        let runner = runner_with(vec![
            result("BTC_RSI", 5.0, 50.0),
            result("ETH_RSI", 20.0, 50.0),
            result("SOL_RSI", 5.0, 75.0),
            result("ADA_RSI", -3.0, 50.0),
        ]);
        let ids = |ranked: Vec<(String, f64)>| ranked.into_iter().map(|(id, _)| id).collect::<Vec<_>>();

        assert_eq!(
            ids(runner.rank(RankMetric::NetPnl)),
            vec!["ETH_RSI", "BTC_RSI", "SOL_RSI", "ADA_RSI"]
        );
        assert_eq!(
            ids(runner.rank(RankMetric::WinRate)),
            vec!["SOL_RSI", "BTC_RSI", "ETH_RSI", "ADA_RSI"]
        );
    }

    #[test]
    fn infinite_profit_factor_ranks_first() {
        let runner = runner_with(vec![result("BTC_RSI", -1.0, 0.0), result("ETH_RSI", 3.0, 100.0)]);
        let ranked = runner.rank(RankMetric::ProfitFactor);
        assert_eq!(ranked[0], ("ETH_RSI".to_string(), f64::INFINITY));
    }

    #[test]
    fn ties_keep_first_registration() {
        let runner = runner_with(vec![
            result("BTC_RSI", 7.0, 0.0),
            result("BTC_MACD", 7.0, 0.0),
            result("ETH_RSI", 1.0, 0.0),
        ]);
        assert_eq!(runner.best_combo().unwrap().strategy_id, "BTC_RSI");
        let suggestions = runner.suggestions_by_coin();
        assert_eq!(suggestions["BTC"], "BTC_RSI");
        assert_eq!(suggestions["ETH"], "ETH_RSI");
    }

    #[test]
    fn report_collects_rankings_and_suggestions() {
        let runner = runner_with(vec![result("BTC_RSI", -10.0, 0.0), result("BTC_MACD", 50.0, 100.0)]);
        let report = runner.report();
        assert_eq!(report.strategies_tested, 2);
        assert_eq!(report.rankings.by_pnl[0].0, "BTC_MACD");
        assert_eq!(report.best_combo.unwrap().net_pnl, 50.0);
        assert_eq!(report.suggestions["BTC"], "BTC_MACD");
        assert_eq!(report.results[0].trade_count, 0);
    }
}

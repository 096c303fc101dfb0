use serde::Serialize;

use common::{Error, PnlEntry, Result, StrategyMetrics, Trade};

/// Final metrics of one strategy after a replay, plus derived scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    #[serde(flatten)]
    pub metrics: StrategyMetrics,
    /// `|profit / loss|`; infinite when only profits were realised.
    pub profit_factor: f64,
    #[serde(skip)]
    pub trades: Vec<Trade>,
    #[serde(skip)]
    pub pnl_history: Vec<PnlEntry>,
}

impl BacktestResult {
    pub fn new(mut metrics: StrategyMetrics, trades: Vec<Trade>, pnl_history: Vec<PnlEntry>) -> Self {
        metrics.max_drawdown = max_drawdown(pnl_history.iter().map(|e| e.pnl));
        let profit_factor = profit_factor(metrics.total_profit, metrics.total_loss);
        Self {
            metrics,
            profit_factor,
            trades,
            pnl_history,
        }
    }

    pub fn strategy_id(&self) -> &str {
        &self.metrics.strategy_id
    }

    pub fn coin(&self) -> &str {
        &self.metrics.coin
    }

    pub fn net_pnl(&self) -> f64 {
        self.metrics.net_pnl
    }

    pub fn metric(&self, metric: RankMetric) -> f64 {
        let m = &self.metrics;
        match metric {
            RankMetric::NetPnl => m.net_pnl,
            RankMetric::WinRate => m.win_rate,
            RankMetric::ProfitFactor => self.profit_factor,
            RankMetric::TotalTrades => m.total_trades as f64,
            RankMetric::WinningTrades => m.winning_trades as f64,
            RankMetric::LosingTrades => m.losing_trades as f64,
            RankMetric::TotalProfit => m.total_profit,
            RankMetric::TotalLoss => m.total_loss,
            RankMetric::MaxDrawdown => m.max_drawdown,
        }
    }
}

/// Largest drop from a running peak of the cumulative P&L curve. Both the
/// curve and the peak start at zero.
pub fn max_drawdown(pnls: impl IntoIterator<Item = f64>) -> f64 {
    let mut cumulative = 0.0;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for pnl in pnls {
        cumulative += pnl;
        peak = peak.max(cumulative);
        max_dd = max_dd.max(peak - cumulative);
    }
    max_dd
}

pub fn profit_factor(total_profit: f64, total_loss: f64) -> f64 {
    if total_loss != 0.0 {
        (total_profit / total_loss).abs()
    } else if total_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Numeric result field used for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    NetPnl,
    WinRate,
    ProfitFactor,
    TotalTrades,
    WinningTrades,
    LosingTrades,
    TotalProfit,
    TotalLoss,
    MaxDrawdown,
}

impl RankMetric {
    pub const ALL: [RankMetric; 9] = [
        RankMetric::NetPnl,
        RankMetric::WinRate,
        RankMetric::ProfitFactor,
        RankMetric::TotalTrades,
        RankMetric::WinningTrades,
        RankMetric::LosingTrades,
        RankMetric::TotalProfit,
        RankMetric::TotalLoss,
        RankMetric::MaxDrawdown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RankMetric::NetPnl => "net_pnl",
            RankMetric::WinRate => "win_rate",
            RankMetric::ProfitFactor => "profit_factor",
            RankMetric::TotalTrades => "total_trades",
            RankMetric::WinningTrades => "winning_trades",
            RankMetric::LosingTrades => "losing_trades",
            RankMetric::TotalProfit => "total_profit",
            RankMetric::TotalLoss => "total_loss",
            RankMetric::MaxDrawdown => "max_drawdown",
        }
    }
}

impl std::fmt::Display for RankMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RankMetric {
    type Err = Error;

    /// Accepts `net_pnl` as well as `netPnl`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        RankMetric::ALL
            .into_iter()
            .find(|m| m.name().replace('_', "") == normalized)
            .ok_or_else(|| Error::UnknownMetric(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_on_cumulative_curve() {
        // cumulative [10, 5, 15, 2], peaks [10, 10, 15, 15]
        assert_eq!(max_drawdown([10.0, -5.0, 10.0, -13.0]), 13.0);
    }

    #[test]
    fn drawdown_counts_losses_from_zero() {
        assert_eq!(max_drawdown([-4.0, -1.0]), 5.0);
        assert_eq!(max_drawdown(std::iter::empty()), 0.0);
    }

    #[test]
    fn profit_factor_edges() {
        assert_eq!(profit_factor(30.0, 10.0), 3.0);
        assert_eq!(profit_factor(5.0, 0.0), f64::INFINITY);
        assert_eq!(profit_factor(0.0, 0.0), 0.0);
        assert_eq!(profit_factor(0.0, 7.0), 0.0);
    }

    #[test]
    fn rank_metric_parses_both_spellings() {
        assert_eq!("net_pnl".parse::<RankMetric>().unwrap(), RankMetric::NetPnl);
        assert_eq!("winRate".parse::<RankMetric>().unwrap(), RankMetric::WinRate);
        assert_eq!("ProfitFactor".parse::<RankMetric>().unwrap(), RankMetric::ProfitFactor);
        assert!(matches!(
            "sharpe".parse::<RankMetric>(),
            Err(Error::UnknownMetric(ref m)) if m == "sharpe"
        ));
    }

    #[test]
    fn result_recomputes_drawdown_from_history() {
        let history = [10.0, -5.0, 10.0, -13.0]
            .iter()
            .enumerate()
            .map(|(i, pnl)| PnlEntry {
                timestamp: i as f64,
                strategy_id: "BTC_RSI".into(),
                pnl: *pnl,
                position_after: 0.0,
            })
            .collect();
        let mut metrics = StrategyMetrics::new("BTC_RSI", "BTC", "RSI");
        metrics.total_profit = 20.0;
        metrics.total_loss = 18.0;
        let result = BacktestResult::new(metrics, Vec::new(), history);
        assert_eq!(result.metrics.max_drawdown, 13.0);
        assert!((result.profit_factor - 20.0 / 18.0).abs() < 1e-12);
    }
}

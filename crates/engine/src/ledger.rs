//! The authoritative P&L ledger for one engine run.
//!
//! Every mutation goes through `&mut self`; the engine keeps the ledger
//! behind a single `tokio::sync::Mutex`, so `record_trade` is the unit of
//! atomicity visible to readers. Readers get owned copies.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info};

use common::{Fill, GlobalMetrics, PnlEntry, Side, StrategyMetrics, Trade};

/// Running drawdown on the cumulative per-trade P&L curve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DrawdownTracker {
    cumulative: f64,
    peak: f64,
    max_drawdown: f64,
}

impl DrawdownTracker {
    /// Fold one realized P&L into the curve; returns the max drawdown so far.
    pub fn observe(&mut self, pnl: f64) -> f64 {
        self.cumulative += pnl;
        self.peak = self.peak.max(self.cumulative);
        self.max_drawdown = self.max_drawdown.max(self.peak - self.cumulative);
        self.max_drawdown
    }
}

#[derive(Debug, Default)]
pub struct Ledger {
    rows: BTreeMap<String, StrategyMetrics>,
    drawdowns: HashMap<String, DrawdownTracker>,
    global: GlobalMetrics,
    trades: Vec<Trade>,
    pnl_history: Vec<PnlEntry>,
    next_seq: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a zeroed metrics row. Existing rows are left untouched.
    pub fn open(&mut self, strategy_id: &str, coin: &str, strategy_name: &str) {
        if !self.rows.contains_key(strategy_id) {
            self.rows.insert(
                strategy_id.to_string(),
                StrategyMetrics::new(strategy_id, coin, strategy_name),
            );
            self.drawdowns.insert(strategy_id.to_string(), DrawdownTracker::default());
            self.recompute_global();
        }
    }

    /// Drop a metrics row and its drawdown tracker. Trade log and P&L history
    /// entries are kept, so after a re-registration the new row's
    /// `max_drawdown` covers only trades made since then while
    /// `pnl_history` still holds the earlier ones.
    pub fn close(&mut self, strategy_id: &str) -> Option<StrategyMetrics> {
        let removed = self.rows.remove(strategy_id);
        if removed.is_some() {
            self.drawdowns.remove(strategy_id);
            self.recompute_global();
        }
        removed
    }

    /// Apply one executed action to its strategy row and the global totals.
    pub fn record_trade(&mut self, fill: &Fill) -> Trade {
        let row = self
            .rows
            .entry(fill.strategy_id.clone())
            .or_insert_with(|| StrategyMetrics::new(&fill.strategy_id, &fill.coin, &fill.strategy_name));

        row.total_trades += 1;
        let mut pnl = 0.0;

        match fill.side {
            Side::Buy => {
                row.current_position += fill.quantity;
                // Single-lot model: a repeated BUY rebases the entry price.
                row.entry_price = fill.price;
            }
            Side::Sell if row.current_position > 0.0 => {
                pnl = (fill.price - row.entry_price) * row.current_position;
                row.total_profit += pnl.max(0.0);
                row.total_loss += pnl.min(0.0).abs();
                if pnl > 0.0 {
                    row.winning_trades += 1;
                } else if pnl < 0.0 {
                    row.losing_trades += 1;
                }
                row.current_position = (row.current_position - fill.quantity).max(0.0);
            }
            Side::Sell => {}
        }

        row.net_pnl = row.total_profit - row.total_loss;
        row.win_rate = row.winning_trades as f64 / row.total_trades as f64 * 100.0;
        row.max_drawdown = self
            .drawdowns
            .entry(fill.strategy_id.clone())
            .or_default()
            .observe(pnl);
        let position_after = row.current_position;

        self.recompute_global();
        self.global.last_update = Some(fill.timestamp);

        self.pnl_history.push(PnlEntry {
            timestamp: fill.timestamp,
            strategy_id: fill.strategy_id.clone(),
            pnl,
            position_after,
        });

        let trade = Trade {
            seq: self.next_seq,
            strategy_id: fill.strategy_id.clone(),
            coin: fill.coin.clone(),
            strategy_name: fill.strategy_name.clone(),
            side: fill.side,
            price: fill.price,
            quantity: fill.quantity,
            timestamp: fill.timestamp,
            profit_loss: pnl,
            position_after,
        };
        self.next_seq += 1;
        self.trades.push(trade.clone());

        match fill.side {
            Side::Buy => debug!(
                strategy_id = %fill.strategy_id,
                price = fill.price,
                qty = fill.quantity,
                "BUY recorded"
            ),
            Side::Sell => info!(
                strategy_id = %fill.strategy_id,
                price = fill.price,
                qty = fill.quantity,
                pnl,
                "SELL recorded"
            ),
        }

        trade
    }

    /// Count an evaluation that failed and produced no action.
    pub fn record_failure(&mut self, strategy_id: &str) {
        self.global.failed_evaluations += 1;
        debug!(
            strategy_id,
            failed = self.global.failed_evaluations,
            "Evaluation failure recorded"
        );
    }

    pub fn global(&self) -> GlobalMetrics {
        self.global.clone()
    }

    /// One row, or every row ordered by strategy id.
    pub fn strategy_metrics(&self, strategy_id: Option<&str>) -> Vec<StrategyMetrics> {
        match strategy_id {
            Some(id) => self.rows.get(id).cloned().into_iter().collect(),
            None => self.rows.values().cloned().collect(),
        }
    }

    /// The last `limit` trades (optionally for one strategy), newest last.
    pub fn trades(&self, strategy_id: Option<&str>, limit: usize) -> Vec<Trade> {
        let mut out: Vec<Trade> = self
            .trades
            .iter()
            .rev()
            .filter(|t| strategy_id.map_or(true, |id| t.strategy_id == id))
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    pub fn pnl_history(&self, strategy_id: Option<&str>) -> Vec<PnlEntry> {
        self.pnl_history
            .iter()
            .filter(|e| strategy_id.map_or(true, |id| e.strategy_id == id))
            .cloned()
            .collect()
    }

    fn recompute_global(&mut self) {
        let mut coins = BTreeSet::new();
        let mut global = GlobalMetrics {
            last_update: self.global.last_update,
            failed_evaluations: self.global.failed_evaluations,
            active_strategies: self.rows.len(),
            ..GlobalMetrics::default()
        };
        let mut winning = 0;

        for row in self.rows.values() {
            global.total_trades += row.total_trades;
            global.total_profit += row.total_profit;
            global.total_loss += row.total_loss;
            winning += row.winning_trades;
            coins.insert(row.coin.as_str());
        }

        global.net_pnl = global.total_profit - global.total_loss;
        global.win_rate = if global.total_trades > 0 {
            winning as f64 / global.total_trades as f64 * 100.0
        } else {
            0.0
        };
        global.active_coins = coins.len();
        self.global = global;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(id: &str, side: Side, price: f64, quantity: f64, ts: f64) -> Fill {
        let (coin, name) = id.split_once('_').unwrap();
        Fill {
            strategy_id: id.to_string(),
            coin: coin.to_string(),
            strategy_name: name.to_string(),
            side,
            price,
            quantity,
            timestamp: ts,
        }
    }

    #[test]
    fn open_creates_zeroed_row_and_counts_coins() {
        let mut ledger = Ledger::new();
        ledger.open("BTC_RSI", "BTC", "RSI");
        ledger.open("BTC_MACD", "BTC", "MACD");
        ledger.open("ETH_RSI", "ETH", "RSI");

        let global = ledger.global();
        assert_eq!(global.active_strategies, 3);
        assert_eq!(global.active_coins, 2);
        assert_eq!(ledger.strategy_metrics(Some("BTC_RSI"))[0].total_trades, 0);
    }

    #[test]
    fn buy_then_profitable_sell() {
        let mut ledger = Ledger::new();
        ledger.open("BTC_RSI", "BTC", "RSI");

        let buy = ledger.record_trade(&fill("BTC_RSI", Side::Buy, 100.0, 2.0, 1.0));
        assert_eq!(buy.profit_loss, 0.0);
        assert_eq!(buy.position_after, 2.0);

        let sell = ledger.record_trade(&fill("BTC_RSI", Side::Sell, 110.0, 2.0, 2.0));
        assert_eq!(sell.profit_loss, 20.0);
        assert_eq!(sell.position_after, 0.0);

        let row = &ledger.strategy_metrics(Some("BTC_RSI"))[0];
        assert_eq!(row.total_trades, 2);
        assert_eq!(row.winning_trades, 1);
        assert_eq!(row.total_profit, 20.0);
        assert_eq!(row.net_pnl, 20.0);
        assert_eq!(row.win_rate, 50.0);

        let global = ledger.global();
        assert_eq!(global.net_pnl, 20.0);
        assert_eq!(global.win_rate, 50.0);
        assert_eq!(global.last_update, Some(2.0));
    }

    #[test]
    fn losing_and_flat_sells() {
        let mut ledger = Ledger::new();
        ledger.record_trade(&fill("ETH_MACD", Side::Buy, 50.0, 1.0, 1.0));
        ledger.record_trade(&fill("ETH_MACD", Side::Sell, 40.0, 1.0, 2.0));
        ledger.record_trade(&fill("ETH_MACD", Side::Buy, 40.0, 1.0, 3.0));
        ledger.record_trade(&fill("ETH_MACD", Side::Sell, 40.0, 1.0, 4.0));

        let row = &ledger.strategy_metrics(Some("ETH_MACD"))[0];
        assert_eq!(row.losing_trades, 1);
        assert_eq!(row.winning_trades, 0);
        assert_eq!(row.total_loss, 10.0);
        assert_eq!(row.net_pnl, -10.0);
        assert_eq!(row.total_trades, 4);
    }

    #[test]
    fn sell_without_position_only_counts_the_trade() {
        let mut ledger = Ledger::new();
        let trade = ledger.record_trade(&fill("SOL_RSI", Side::Sell, 10.0, 1.0, 1.0));
        assert_eq!(trade.profit_loss, 0.0);
        let row = &ledger.strategy_metrics(Some("SOL_RSI"))[0];
        assert_eq!(row.total_trades, 1);
        assert_eq!(row.current_position, 0.0);
    }

    #[test]
    fn reopen_starts_fresh_drawdown_but_keeps_history() {
        let mut ledger = Ledger::new();
        ledger.open("BTC_RSI", "BTC", "RSI");
        ledger.record_trade(&fill("BTC_RSI", Side::Buy, 100.0, 1.0, 1.0));
        ledger.record_trade(&fill("BTC_RSI", Side::Sell, 80.0, 1.0, 2.0));
        assert_eq!(ledger.strategy_metrics(Some("BTC_RSI"))[0].max_drawdown, 20.0);

        ledger.close("BTC_RSI");
        ledger.open("BTC_RSI", "BTC", "RSI");
        ledger.record_trade(&fill("BTC_RSI", Side::Buy, 100.0, 1.0, 3.0));
        ledger.record_trade(&fill("BTC_RSI", Side::Sell, 110.0, 1.0, 4.0));

        let row = &ledger.strategy_metrics(Some("BTC_RSI"))[0];
        assert_eq!(row.max_drawdown, 0.0);
        assert_eq!(row.net_pnl, 10.0);
        assert_eq!(ledger.pnl_history(Some("BTC_RSI")).len(), 4);
    }

    #[test]
    fn oversized_sell_clamps_position_at_zero() {
        let mut ledger = Ledger::new();
        ledger.record_trade(&fill("BTC_RSI", Side::Buy, 100.0, 1.0, 1.0));
        ledger.record_trade(&fill("BTC_RSI", Side::Sell, 101.0, 5.0, 2.0));
        assert_eq!(ledger.strategy_metrics(Some("BTC_RSI"))[0].current_position, 0.0);
    }

    #[test]
    fn repeated_buy_rebases_entry_price() {
        let mut ledger = Ledger::new();
        ledger.record_trade(&fill("BTC_RSI", Side::Buy, 100.0, 1.0, 1.0));
        ledger.record_trade(&fill("BTC_RSI", Side::Buy, 200.0, 1.0, 2.0));
        let sell = ledger.record_trade(&fill("BTC_RSI", Side::Sell, 210.0, 2.0, 3.0));
        // (210 - 200) × 2, the first lot's cost basis is gone.
        assert_eq!(sell.profit_loss, 20.0);
    }

    #[test]
    fn drawdown_follows_cumulative_pnl_curve() {
        let mut tracker = DrawdownTracker::default();
        let steps: Vec<f64> = [10.0, -5.0, 10.0, -13.0].iter().map(|p| tracker.observe(*p)).collect();
        assert_eq!(steps, vec![0.0, 5.0, 5.0, 13.0]);
    }

    #[test]
    fn close_removes_row_but_keeps_history() {
        let mut ledger = Ledger::new();
        ledger.open("BTC_RSI", "BTC", "RSI");
        ledger.record_trade(&fill("BTC_RSI", Side::Buy, 100.0, 1.0, 1.0));

        assert!(ledger.close("BTC_RSI").is_some());
        assert!(ledger.close("BTC_RSI").is_none());
        assert_eq!(ledger.global().active_strategies, 0);
        assert_eq!(ledger.global().total_trades, 0);
        assert_eq!(ledger.trades(None, 10).len(), 1);
        assert_eq!(ledger.pnl_history(Some("BTC_RSI")).len(), 1);
    }

    #[test]
    fn trades_are_limited_newest_last() {
        let mut ledger = Ledger::new();
        for i in 0..5 {
            let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
            ledger.record_trade(&fill("BTC_RSI", side, 100.0 + i as f64, 1.0, i as f64));
        }
        ledger.record_trade(&fill("ETH_RSI", Side::Buy, 1.0, 1.0, 9.0));

        let last_two = ledger.trades(Some("BTC_RSI"), 2);
        assert_eq!(last_two.iter().map(|t| t.seq).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(ledger.trades(None, 100).len(), 6);
        assert!(ledger.trades(None, 0).is_empty());
    }

    #[test]
    fn failures_are_counted_globally() {
        let mut ledger = Ledger::new();
        ledger.open("BTC_RSI", "BTC", "RSI");
        ledger.record_failure("BTC_RSI");
        ledger.record_failure("BTC_RSI");
        assert_eq!(ledger.global().failed_evaluations, 2);
    }
}

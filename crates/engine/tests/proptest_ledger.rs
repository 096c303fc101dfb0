use proptest::prelude::*;
use common::{Fill, Side};
use engine::Ledger;

fn arb_fill() -> impl Strategy<Value = Fill> {
    (
        prop::sample::select(vec!["BTC_RSI", "BTC_MACD", "ETH_RSI", "SOL_Momentum"]),
        any::<bool>(),
        0.01f64..100_000.0f64,
        0.0001f64..50.0f64,
    )
        .prop_map(|(id, buy, price, quantity)| {
            let (coin, name) = id.split_once('_').unwrap();
            Fill {
                strategy_id: id.to_string(),
                coin: coin.to_string(),
                strategy_name: name.to_string(),
                side: if buy { Side::Buy } else { Side::Sell },
                price,
                quantity,
                timestamp: 0.0,
            }
        })
}

proptest! {
    /// After any sequence of fills, every row and the global totals keep
    /// net = profit - loss, positions stay non-negative, and the global row
    /// is the sum of the strategy rows.
    #[test]
    fn ledger_invariants_hold_after_every_update(
        fills in prop::collection::vec(arb_fill(), 1..200),
    ) {
        let mut ledger = Ledger::new();
        for (i, mut fill) in fills.into_iter().enumerate() {
            fill.timestamp = i as f64;
            let trade = ledger.record_trade(&fill);
            prop_assert!(trade.position_after >= 0.0);

            let rows = ledger.strategy_metrics(None);
            for row in &rows {
                prop_assert_eq!(row.net_pnl, row.total_profit - row.total_loss);
                prop_assert!(row.current_position >= 0.0);
                prop_assert!(row.total_profit >= 0.0 && row.total_loss >= 0.0);
                prop_assert!(row.winning_trades + row.losing_trades <= row.total_trades);
                prop_assert!(row.max_drawdown >= 0.0);
                if row.total_trades > 0 {
                    let expected = row.winning_trades as f64 / row.total_trades as f64 * 100.0;
                    prop_assert!((row.win_rate - expected).abs() < 1e-9);
                }
            }

            let global = ledger.global();
            let total: u64 = rows.iter().map(|r| r.total_trades).sum();
            let profit: f64 = rows.iter().map(|r| r.total_profit).sum();
            let loss: f64 = rows.iter().map(|r| r.total_loss).sum();
            prop_assert_eq!(global.total_trades, total);
            prop_assert_eq!(global.total_profit, profit);
            prop_assert_eq!(global.total_loss, loss);
            prop_assert_eq!(global.net_pnl, global.total_profit - global.total_loss);
            prop_assert_eq!(global.active_strategies, rows.len());
            prop_assert_eq!(global.last_update, Some(i as f64));
        }
    }

    /// Trade log and P&L history grow by exactly one entry per fill.
    #[test]
    fn every_fill_is_logged_once(fills in prop::collection::vec(arb_fill(), 0..100)) {
        let mut ledger = Ledger::new();
        for fill in &fills {
            ledger.record_trade(fill);
        }
        let trades = ledger.trades(None, usize::MAX);
        prop_assert_eq!(trades.len(), fills.len());
        prop_assert_eq!(ledger.pnl_history(None).len(), fills.len());
        for (i, trade) in trades.iter().enumerate() {
            prop_assert_eq!(trade.seq, i as u64);
        }
    }
}

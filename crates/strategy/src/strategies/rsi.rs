use std::collections::BTreeMap;

use common::{Signal, Tick};

use super::{PositionState, PriceWindow};
use crate::catalog::{RsiParams, StrategyKind, StrategyParams};
use crate::indicators::RsiIndicator;
use crate::Strategy;

/// Buys oversold (RSI below `lower_bound`), sells overbought (above `upper_bound`).
pub struct RsiStrategy {
    coin: String,
    params: RsiParams,
    indicator: RsiIndicator,
    window: PriceWindow,
    position: PositionState,
}

impl RsiStrategy {
    pub fn new(coin: impl Into<String>, params: RsiParams) -> Self {
        let capacity = params.period + 1;
        Self {
            coin: coin.into(),
            indicator: RsiIndicator::new(params.period),
            window: PriceWindow::new(capacity, capacity),
            params,
            position: PositionState::Flat,
        }
    }
}

impl Strategy for RsiStrategy {
    fn name(&self) -> &str {
        StrategyKind::Rsi.name()
    }

    fn coin(&self) -> &str {
        &self.coin
    }

    fn config(&self) -> BTreeMap<String, f64> {
        StrategyParams::Rsi(self.params.clone()).to_map()
    }

    fn warmup(&self) -> usize {
        self.window.warmup()
    }

    fn evaluate(&mut self, tick: &Tick) -> Option<Signal> {
        let rsi = self.indicator.compute(self.window.observe(tick.price)?)?;

        if self.position.is_flat() && rsi < self.params.lower_bound {
            self.position.enter(self.params.position_size)
        } else if !self.position.is_flat() && rsi > self.params.upper_bound {
            self.position.exit(self.params.position_size)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::run;
    use common::Side;

    fn strategy(period: usize) -> RsiStrategy {
        RsiStrategy::new(
            "BTC",
            RsiParams { period, lower_bound: 30.0, upper_bound: 70.0, position_size: 1.0 },
        )
    }

    #[test]
    fn constant_prices_never_trade() {
        let mut s = strategy(14);
        assert!(run(&mut s, &[42_000.0; 40]).is_empty());
    }

    #[test]
    fn buys_after_sell_off_and_sells_after_rally() {
        let mut s = strategy(3);
        // idx3: three losses → RSI 0 → BUY
        // then three gains push RSI to 100 → SELL at idx6
        let prices = [10.0, 9.0, 8.0, 7.0, 8.0, 9.0, 10.0];
        let signals: Vec<(usize, Side)> =
            run(&mut s, &prices).into_iter().map(|(i, s)| (i, s.side)).collect();
        assert_eq!(signals, vec![(3, Side::Buy), (6, Side::Sell)]);
    }

    #[test]
    fn warmup_is_period_plus_one() {
        let mut s = strategy(3);
        assert_eq!(s.warmup(), 4);
        assert!(run(&mut s, &[10.0, 9.0, 8.0]).is_empty());
    }
}

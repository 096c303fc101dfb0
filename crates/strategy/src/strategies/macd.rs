use std::collections::BTreeMap;

use common::{Signal, Tick};

use super::{PositionState, PriceWindow};
use crate::catalog::{MacdParams, StrategyKind, StrategyParams};
use crate::indicators::MacdIndicator;
use crate::Strategy;

/// Trades zero-line crossings of the MACD line.
///
/// BUY when the line moves from ≤ 0 to > 0, SELL when it moves from ≥ 0 to
/// < 0. The first post-warm-up value is only a baseline.
pub struct MacdStrategy {
    coin: String,
    params: MacdParams,
    indicator: MacdIndicator,
    window: PriceWindow,
    prev_macd: Option<f64>,
    position: PositionState,
}

impl MacdStrategy {
    pub fn new(coin: impl Into<String>, params: MacdParams) -> Self {
        let indicator = MacdIndicator::new(params.fast, params.slow, params.signal);
        Self {
            coin: coin.into(),
            window: PriceWindow::new(indicator.window_capacity(), params.slow),
            indicator,
            params,
            prev_macd: None,
            position: PositionState::Flat,
        }
    }
}

impl Strategy for MacdStrategy {
    fn name(&self) -> &str {
        StrategyKind::Macd.name()
    }

    fn coin(&self) -> &str {
        &self.coin
    }

    fn config(&self) -> BTreeMap<String, f64> {
        StrategyParams::Macd(self.params.clone()).to_map()
    }

    fn warmup(&self) -> usize {
        self.window.warmup()
    }

    fn evaluate(&mut self, tick: &Tick) -> Option<Signal> {
        let macd = self.indicator.compute(self.window.observe(tick.price)?)?;
        let prev = self.prev_macd.replace(macd)?;

        if prev <= 0.0 && macd > 0.0 {
            self.position.enter(self.params.position_size)
        } else if prev >= 0.0 && macd < 0.0 {
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

    fn strategy() -> MacdStrategy {
        MacdStrategy::new("BTC", MacdParams { fast: 3, slow: 6, signal: 3, position_size: 1.0 })
    }

    #[test]
    fn window_keeps_slow_plus_signal_prices() {
        let s = strategy();
        assert_eq!(s.window.capacity(), 9);
        assert_eq!(s.warmup(), 6);
    }

    #[test]
    fn flat_then_rally_buys_once() {
        let mut s = strategy();
        let mut prices = vec![100.0; 8];
        prices.extend((1..=10).map(|i| 100.0 + i as f64));
        let signals = run(&mut s, &prices);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].0, 8);
        assert_eq!(signals[0].1.side, Side::Buy);
    }

    #[test]
    fn rally_then_sell_off_round_trips() {
        let mut s = strategy();
        let mut prices = vec![100.0; 8];
        prices.extend((1..=10).map(|i| 100.0 + i as f64));
        prices.extend((1..=15).map(|i| 110.0 - 2.0 * i as f64));
        let sides: Vec<Side> = run(&mut s, &prices).into_iter().map(|(_, s)| s.side).collect();
        assert_eq!(sides, vec![Side::Buy, Side::Sell]);
    }

    #[test]
    fn no_signal_on_first_value_after_warmup() {
        let mut s = strategy();
        // Already trending at warm-up: the first MACD is only a baseline.
        let prices: Vec<f64> = (0..7).map(|i| 100.0 + i as f64).collect();
        assert!(run(&mut s, &prices).is_empty());
    }
}

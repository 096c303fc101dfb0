use std::collections::BTreeMap;

use common::{Signal, Tick};

use super::{PositionState, PriceWindow};
use crate::catalog::{MeanReversionParams, StrategyKind, StrategyParams};
use crate::indicators::sma;
use crate::Strategy;

/// Buys when price sits far enough below its window mean, sells far above it.
pub struct MeanReversionStrategy {
    coin: String,
    params: MeanReversionParams,
    window: PriceWindow,
    position: PositionState,
}

impl MeanReversionStrategy {
    pub fn new(coin: impl Into<String>, params: MeanReversionParams) -> Self {
        Self {
            coin: coin.into(),
            window: PriceWindow::new(params.period, params.period),
            params,
            position: PositionState::Flat,
        }
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        StrategyKind::MeanReversion.name()
    }

    fn coin(&self) -> &str {
        &self.coin
    }

    fn config(&self) -> BTreeMap<String, f64> {
        StrategyParams::MeanReversion(self.params.clone()).to_map()
    }

    fn warmup(&self) -> usize {
        self.window.warmup()
    }

    fn evaluate(&mut self, tick: &Tick) -> Option<Signal> {
        let mean = {
            let prices = self.window.observe(tick.price)?;
            sma(prices, prices.len())?
        };
        let deviation = if mean != 0.0 { (tick.price - mean) / mean } else { 0.0 };

        let threshold = self.params.deviation_threshold;
        if self.position.is_flat() && deviation < -threshold {
            self.position.enter(self.params.position_size)
        } else if !self.position.is_flat() && deviation > threshold {
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

    fn strategy(period: usize, threshold: f64) -> MeanReversionStrategy {
        MeanReversionStrategy::new(
            "SOL",
            MeanReversionParams { period, deviation_threshold: threshold, position_size: 2.0 },
        )
    }

    #[test]
    fn buys_below_mean_and_sells_above() {
        let mut s = strategy(4, 0.05);
        // idx3: mean 92.5, price 70 → -24% BUY
        // idx4: [100,100,70,130] mean 100, +30% SELL
        let prices = [100.0, 100.0, 100.0, 70.0, 130.0];
        let signals = run(&mut s, &prices);
        let sides: Vec<(usize, Side)> = signals.iter().map(|(i, s)| (*i, s.side)).collect();
        assert_eq!(sides, vec![(3, Side::Buy), (4, Side::Sell)]);
        assert_eq!(signals[0].1.quantity, 2.0);
    }

    #[test]
    fn no_reentry_while_long() {
        let mut s = strategy(3, 0.05);
        let prices = [100.0, 100.0, 80.0, 60.0, 40.0];
        assert_eq!(run(&mut s, &prices).len(), 1);
    }

    #[test]
    fn silent_until_period_filled() {
        let mut s = strategy(5, 0.0);
        assert!(run(&mut s, &[100.0, 50.0, 25.0, 10.0]).is_empty());
    }
}

use std::collections::BTreeMap;

use common::{Signal, Tick};

use super::{PositionState, PriceWindow};
use crate::catalog::{BollingerParams, StrategyKind, StrategyParams};
use crate::indicators::BollingerIndicator;
use crate::Strategy;

/// Buys below the lower band, sells above the upper band.
pub struct BollingerBandsStrategy {
    coin: String,
    params: BollingerParams,
    indicator: BollingerIndicator,
    window: PriceWindow,
    position: PositionState,
}

impl BollingerBandsStrategy {
    pub fn new(coin: impl Into<String>, params: BollingerParams) -> Self {
        Self {
            coin: coin.into(),
            indicator: BollingerIndicator::new(params.period, params.std_dev),
            window: PriceWindow::new(params.period, params.period),
            params,
            position: PositionState::Flat,
        }
    }
}

impl Strategy for BollingerBandsStrategy {
    fn name(&self) -> &str {
        StrategyKind::BollingerBands.name()
    }

    fn coin(&self) -> &str {
        &self.coin
    }

    fn config(&self) -> BTreeMap<String, f64> {
        StrategyParams::BollingerBands(self.params.clone()).to_map()
    }

    fn warmup(&self) -> usize {
        self.window.warmup()
    }

    fn evaluate(&mut self, tick: &Tick) -> Option<Signal> {
        let bands = self.indicator.compute(self.window.observe(tick.price)?)?;

        if self.position.is_flat() && tick.price < bands.lower {
            self.position.enter(self.params.position_size)
        } else if !self.position.is_flat() && tick.price > bands.upper {
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

    fn strategy(period: usize, std_dev: f64) -> BollingerBandsStrategy {
        BollingerBandsStrategy::new(
            "ADA",
            BollingerParams { period, std_dev, position_size: 1.0 },
        )
    }

    #[test]
    fn flat_prices_sit_on_the_bands() {
        let mut s = strategy(5, 2.0);
        assert!(run(&mut s, &[1.0; 30]).is_empty());
    }

    #[test]
    fn band_breaks_drive_entries_and_exits() {
        // Narrow bands (0.5 std) so a single outlier closes outside them.
        let mut s = strategy(4, 0.5);
        // idx3: [10,10,10,6] mean 9, std √3 → lower ≈ 8.13, 6 < lower → BUY
        // idx8: [6,6,6,10] mean 7, std √3 → upper ≈ 7.87, 10 > upper → SELL
        let prices = [10.0, 10.0, 10.0, 6.0, 6.0, 6.0, 6.0, 6.0, 10.0];
        let signals: Vec<(usize, Side)> =
            run(&mut s, &prices).into_iter().map(|(i, s)| (i, s.side)).collect();
        assert_eq!(signals, vec![(3, Side::Buy), (8, Side::Sell)]);
    }

    #[test]
    fn upper_break_while_flat_is_ignored() {
        let mut s = strategy(4, 0.5);
        assert!(run(&mut s, &[10.0, 10.0, 10.0, 14.0]).is_empty());
    }
}

use std::collections::BTreeMap;

use common::{Signal, Tick};

use super::{PositionState, PriceWindow};
use crate::catalog::{SmaCrossoverParams, StrategyKind, StrategyParams};
use crate::indicators::sma;
use crate::Strategy;

/// Buys when the fast SMA crosses above the slow SMA, sells on the cross back.
///
/// The first comparison after warm-up only records a baseline, so a series
/// that starts with fast already above slow never emits a phantom BUY.
pub struct SmaCrossoverStrategy {
    coin: String,
    params: SmaCrossoverParams,
    window: PriceWindow,
    fast_above: Option<bool>,
    position: PositionState,
}

impl SmaCrossoverStrategy {
    pub fn new(coin: impl Into<String>, params: SmaCrossoverParams) -> Self {
        let capacity = params.fast_period.max(params.slow_period);
        Self {
            coin: coin.into(),
            window: PriceWindow::new(capacity, capacity),
            params,
            fast_above: None,
            position: PositionState::Flat,
        }
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn name(&self) -> &str {
        StrategyKind::SmaCrossover.name()
    }

    fn coin(&self) -> &str {
        &self.coin
    }

    fn config(&self) -> BTreeMap<String, f64> {
        StrategyParams::SmaCrossover(self.params.clone()).to_map()
    }

    fn warmup(&self) -> usize {
        self.window.warmup()
    }

    fn evaluate(&mut self, tick: &Tick) -> Option<Signal> {
        let (fast, slow) = {
            let prices = self.window.observe(tick.price)?;
            (sma(prices, self.params.fast_period)?, sma(prices, self.params.slow_period)?)
        };

        let above = fast > slow;
        let was_above = self.fast_above.replace(above)?;

        match (was_above, above) {
            (false, true) => self.position.enter(self.params.position_size),
            (true, false) => self.position.exit(self.params.position_size),
            _ => None,
        }
    }
}

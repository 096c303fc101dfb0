use std::collections::BTreeMap;

use common::{Signal, Tick};

use super::{PositionState, PriceWindow};
use crate::catalog::{MomentumParams, StrategyKind, StrategyParams};
use crate::Strategy;

/// Rate-of-change momentum over `lookback` ticks.
pub struct MomentumStrategy {
    coin: String,
    params: MomentumParams,
    window: PriceWindow,
    position: PositionState,
}

impl MomentumStrategy {
    pub fn new(coin: impl Into<String>, params: MomentumParams) -> Self {
        let capacity = params.lookback + 1;
        Self {
            coin: coin.into(),
            window: PriceWindow::new(capacity, capacity),
            params,
            position: PositionState::Flat,
        }
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &str {
        StrategyKind::Momentum.name()
    }

    fn coin(&self) -> &str {
        &self.coin
    }

    fn config(&self) -> BTreeMap<String, f64> {
        StrategyParams::Momentum(self.params.clone()).to_map()
    }

    fn warmup(&self) -> usize {
        self.window.warmup()
    }

    fn evaluate(&mut self, tick: &Tick) -> Option<Signal> {
        let past = *self.window.observe(tick.price)?.first()?;
        let momentum = if past != 0.0 { (tick.price - past) / past } else { 0.0 };

        let threshold = self.params.momentum_threshold;
        if self.position.is_flat() && momentum > threshold {
            self.position.enter(self.params.position_size)
        } else if !self.position.is_flat() && momentum < -threshold {
            self.position.exit(self.params.position_size)
        } else {
            None
        }
    }
}

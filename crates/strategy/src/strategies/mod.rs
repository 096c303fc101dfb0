//! Concrete strategy types.
//!
//! Every variant follows the same shape: push the tick's price into a
//! [`PriceWindow`], stay silent until the window is warm, compute one
//! indicator, then move the [`PositionState`] (which refuses to re-enter the
//! state it is already in).

mod bollinger;
mod macd;
mod mean_reversion;
mod momentum;
mod rsi;
mod sma_crossover;

pub use bollinger::BollingerBandsStrategy;
pub use macd::MacdStrategy;
pub use mean_reversion::MeanReversionStrategy;
pub use momentum::MomentumStrategy;
pub use rsi::RsiStrategy;
pub use sma_crossover::SmaCrossoverStrategy;

use std::collections::VecDeque;

use common::Signal;

/// Fixed-capacity window of recent prices, oldest first.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    capacity: usize,
    warmup: usize,
    prices: VecDeque<f64>,
}

impl PriceWindow {
    pub fn new(capacity: usize, warmup: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            warmup: warmup.min(capacity),
            prices: VecDeque::new(),
        }
    }

    /// Append a price, evicting the oldest once full. Returns the window
    /// contents only once at least `warmup` prices have been seen.
    pub fn observe(&mut self, price: f64) -> Option<&[f64]> {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
        if self.prices.len() < self.warmup {
            return None;
        }
        Some(self.prices.make_contiguous())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn warmup(&self) -> usize {
        self.warmup
    }
}

/// Binary position flag. No shorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long,
}

impl PositionState {
    /// FLAT → LONG, emitting a BUY. No-op when already long.
    pub fn enter(&mut self, quantity: f64) -> Option<Signal> {
        match self {
            PositionState::Flat => {
                *self = PositionState::Long;
                Some(Signal::buy(quantity))
            }
            PositionState::Long => None,
        }
    }

    /// LONG → FLAT, emitting a SELL. No-op when already flat.
    pub fn exit(&mut self, quantity: f64) -> Option<Signal> {
        match self {
            PositionState::Long => {
                *self = PositionState::Flat;
                Some(Signal::sell(quantity))
            }
            PositionState::Flat => None,
        }
    }

    pub fn is_flat(&self) -> bool {
        *self == PositionState::Flat
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use common::{Signal, Tick};

    use crate::Strategy;

    pub fn tick(coin: &str, price: f64, i: usize) -> Tick {
        Tick::new(coin, price, 1.0, i as f64).unwrap()
    }

    /// Feed prices in order and collect `(tick index, signal)` pairs.
    pub fn run(strategy: &mut dyn Strategy, prices: &[f64]) -> Vec<(usize, Signal)> {
        let coin = strategy.coin().to_string();
        prices
            .iter()
            .enumerate()
            .filter_map(|(i, &p)| strategy.evaluate(&tick(&coin, p, i)).map(|s| (i, s)))
            .collect()
    }
}

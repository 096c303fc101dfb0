//! Seeded geometric-Brownian-motion tick generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::Tick;

const DRIFT: f64 = 0.0001;
/// A single step never drops a price below this fraction of the previous one.
const FLOOR_RATIO: f64 = 0.5;
const MIN_VOLUME: f64 = 100.0;
const MAX_VOLUME: f64 = 10_000.0;

/// Infinite iterator of ticks. Each step emits one tick per coin, in the
/// order the coins were given; timestamps advance by `step_secs` per step.
pub struct SyntheticFeed {
    rng: StdRng,
    prices: Vec<(String, f64)>,
    volatility: f64,
    start: f64,
    step_secs: f64,
    step: u64,
    next_coin: usize,
}

impl SyntheticFeed {
    pub const DEFAULT_VOLATILITY: f64 = 0.02;

    pub fn new(seed: u64, coins: Vec<(String, f64)>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            prices: coins,
            volatility: Self::DEFAULT_VOLATILITY,
            start: 0.0,
            step_secs: 1.0,
            step: 0,
            next_coin: 0,
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility.abs();
        self
    }

    /// Timestamp of the first step and the spacing between steps.
    pub fn with_clock(mut self, start: f64, step_secs: f64) -> Self {
        self.start = start;
        self.step_secs = step_secs;
        self
    }

    /// Standard normal sample via Box-Muller.
    fn gaussian(&mut self) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

impl Iterator for SyntheticFeed {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        if self.prices.is_empty() {
            return None;
        }

        let shock = self.gaussian() * self.volatility;
        let volume = self.rng.gen_range(MIN_VOLUME..MAX_VOLUME);
        let timestamp = self.start + self.step as f64 * self.step_secs;

        let (coin, price) = &mut self.prices[self.next_coin];
        let previous = *price;
        *price = (previous * (1.0 + DRIFT + shock)).max(previous * FLOOR_RATIO);

        let tick = Tick {
            coin: coin.clone(),
            price: *price,
            volume,
            timestamp,
            bid: None,
            ask: None,
        };

        self.next_coin += 1;
        if self.next_coin == self.prices.len() {
            self.next_coin = 0;
            self.step += 1;
        }
        Some(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins() -> Vec<(String, f64)> {
        vec![("BTC".to_string(), 45_000.0), ("ETH".to_string(), 2_500.0)]
    }

    #[test]
    fn same_seed_same_path() {
        let a: Vec<Tick> = SyntheticFeed::new(7, coins()).take(200).collect();
        let b: Vec<Tick> = SyntheticFeed::new(7, coins()).take(200).collect();
        assert_eq!(a, b);

        let c: Vec<Tick> = SyntheticFeed::new(8, coins()).take(200).collect();
        assert_ne!(a, c);
    }

    #[test]
    fn coins_interleave_and_clock_advances_per_step() {
        let ticks: Vec<Tick> = SyntheticFeed::new(1, coins())
            .with_clock(1_000.0, 60.0)
            .take(4)
            .collect();
        let order: Vec<(&str, f64)> = ticks.iter().map(|t| (t.coin.as_str(), t.timestamp)).collect();
        assert_eq!(
            order,
            vec![("BTC", 1_000.0), ("ETH", 1_000.0), ("BTC", 1_060.0), ("ETH", 1_060.0)]
        );
    }

    #[test]
    fn ticks_are_always_valid() {
        let feed = SyntheticFeed::new(42, coins()).with_volatility(0.3);
        let mut last_btc = 45_000.0;
        for tick in feed.take(1_000) {
            assert!(tick.validate().is_ok());
            assert!((MIN_VOLUME..MAX_VOLUME).contains(&tick.volume));
            if tick.coin == "BTC" {
                assert!(tick.price >= last_btc * FLOOR_RATIO);
                last_btc = tick.price;
            }
        }
    }

    #[test]
    fn no_coins_no_ticks() {
        assert_eq!(SyntheticFeed::new(0, Vec::new()).next(), None);
    }
}

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One price observation for one coin.
///
/// Produced by the tick sources (CSV history, synthetic generator, live
/// adapters) and consumed read-only by the engine and every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub coin: String,
    pub price: f64,
    pub volume: f64,
    /// Unix seconds.
    pub timestamp: f64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
}

impl Tick {
    /// Build a validated tick without quote data.
    pub fn new(coin: impl Into<String>, price: f64, volume: f64, timestamp: f64) -> Result<Self> {
        let tick = Self {
            coin: coin.into(),
            price,
            volume,
            timestamp,
            bid: None,
            ask: None,
        };
        tick.validate()?;
        Ok(tick)
    }

    pub fn with_quote(mut self, bid: f64, ask: f64) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    /// Ticks must carry a non-empty coin, a finite positive price and a
    /// finite non-negative volume.
    pub fn validate(&self) -> Result<()> {
        if self.coin.is_empty() {
            return Err(Error::InvalidTick("empty coin".into()));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(Error::InvalidTick(format!(
                "{}: price must be > 0, got {}",
                self.coin, self.price
            )));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(Error::InvalidTick(format!(
                "{}: volume must be >= 0, got {}",
                self.coin, self.volume
            )));
        }
        if !self.timestamp.is_finite() {
            return Err(Error::InvalidTick(format!("{}: non-finite timestamp", self.coin)));
        }
        Ok(())
    }
}

/// Side of an executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Action emitted by a strategy for the tick it just evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub side: Side,
    pub quantity: f64,
}

impl Signal {
    pub fn buy(quantity: f64) -> Self {
        Self { side: Side::Buy, quantity }
    }

    pub fn sell(quantity: f64) -> Self {
        Self { side: Side::Sell, quantity }
    }
}

/// A strategy signal bound to the tick that produced it, ready for the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub strategy_id: String,
    pub coin: String,
    pub strategy_name: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: f64,
}

/// Executed action, appended once to the trade log and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Position in the engine's trade log, starting at 0.
    pub seq: u64,
    pub strategy_id: String,
    pub coin: String,
    pub strategy_name: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: f64,
    /// Realized P&L, non-zero only for a SELL that closed an open position.
    pub profit_loss: f64,
    pub position_after: f64,
}

/// Running counters for one `coin_kind` strategy id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub strategy_id: String,
    pub coin: String,
    pub strategy_name: String,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub total_profit: f64,
    pub total_loss: f64,
    pub net_pnl: f64,
    pub current_position: f64,
    pub entry_price: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
}

impl StrategyMetrics {
    pub fn new(
        strategy_id: impl Into<String>,
        coin: impl Into<String>,
        strategy_name: impl Into<String>,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            coin: coin.into(),
            strategy_name: strategy_name.into(),
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            total_profit: 0.0,
            total_loss: 0.0,
            net_pnl: 0.0,
            current_position: 0.0,
            entry_price: 0.0,
            max_drawdown: 0.0,
            win_rate: 0.0,
        }
    }
}

/// Aggregate over every strategy row. Always derived, never edited directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub total_trades: u64,
    pub total_profit: f64,
    pub total_loss: f64,
    pub net_pnl: f64,
    pub win_rate: f64,
    pub active_strategies: usize,
    pub active_coins: usize,
    /// Timestamp of the tick behind the most recent trade.
    pub last_update: Option<f64>,
    /// Evaluations that panicked and were treated as "no action".
    pub failed_evaluations: u64,
}

/// One point of the per-trade P&L series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlEntry {
    pub timestamp: f64,
    pub strategy_id: String,
    pub pnl: f64,
    pub position_after: f64,
}

/// Lifecycle of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// Constructed, dispatch loop not yet running. Work is queued.
    #[default]
    Idle,
    Running,
    /// Shutdown requested: no new work, queued work still applied.
    Draining,
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Running => write!(f, "running"),
            EngineState::Draining => write!(f, "draining"),
            EngineState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_rejects_non_positive_price() {
        assert!(Tick::new("BTC", 0.0, 1.0, 0.0).is_err());
        assert!(Tick::new("BTC", -5.0, 1.0, 0.0).is_err());
        assert!(Tick::new("BTC", f64::NAN, 1.0, 0.0).is_err());
    }

    #[test]
    fn tick_rejects_negative_volume_and_empty_coin() {
        assert!(Tick::new("BTC", 10.0, -1.0, 0.0).is_err());
        assert!(Tick::new("", 10.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn tick_accepts_zero_volume() {
        let tick = Tick::new("ETH", 2500.0, 0.0, 1.0).unwrap().with_quote(2499.5, 2500.5);
        assert_eq!(tick.bid, Some(2499.5));
        assert_eq!(tick.ask, Some(2500.5));
    }

    #[test]
    fn side_displays_uppercase() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!(Side::Sell.to_string(), "SELL");
    }
}

pub mod catalog;
pub mod config;
pub mod indicators;
pub mod strategies;

use std::collections::BTreeMap;

pub use catalog::{CatalogEntry, StrategyKind, StrategyParams};
pub use config::{StrategyConfig, StrategyFileConfig};

use common::{Signal, Tick};

/// All strategy implementations must satisfy this trait.
///
/// A strategy owns its rolling price window and its FLAT/LONG position flag.
/// The engine guarantees a single instance is never evaluated concurrently
/// and sees its coin's ticks in submission order.
pub trait Strategy: Send {
    /// Kind name of this strategy (e.g. "SMA_Crossover").
    fn name(&self) -> &str;

    /// The coin this strategy watches (e.g. "BTC").
    fn coin(&self) -> &str;

    /// Unique key within an engine: `coin_name`.
    fn id(&self) -> String {
        strategy_id(self.coin(), self.name())
    }

    /// Configured parameters, by name.
    fn config(&self) -> BTreeMap<String, f64>;

    /// Ticks that must be observed before a signal can be emitted.
    fn warmup(&self) -> usize;

    /// Consume one tick and optionally emit an action.
    fn evaluate(&mut self, tick: &Tick) -> Option<Signal>;
}

pub fn strategy_id(coin: &str, name: &str) -> String {
    format!("{coin}_{name}")
}

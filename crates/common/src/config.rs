use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What `submit_tick` does when the ingress queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackpressurePolicy {
    /// Wait for capacity.
    #[default]
    Block,
    /// Fail immediately with `Error::QueueFull`.
    Reject,
}

impl std::str::FromStr for BackpressurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(BackpressurePolicy::Block),
            "reject" => Ok(BackpressurePolicy::Reject),
            other => Err(Error::Config(format!(
                "backpressure must be 'block' or 'reject', got: '{other}'"
            ))),
        }
    }
}

/// Tuning for one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of worker shards evaluating strategies in parallel.
    pub workers: usize,
    /// Capacity of the tick ingress queue.
    pub queue_capacity: usize,
    pub backpressure: BackpressurePolicy,
}

impl EngineConfig {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            backpressure: BackpressurePolicy::Block,
        }
    }
}

/// Which regime the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Live,
    Backtest,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Live => write!(f, "live"),
            RunMode::Backtest => write!(f, "backtest"),
        }
    }
}

/// Process configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub run_mode: RunMode,
    pub engine: EngineConfig,

    // Strategy config file path
    pub strategy_config_path: String,

    // Backtest
    pub backtest_csv_path: Option<String>,
    pub backtest_coins: Option<Vec<String>>,
    pub rank_metric: String,

    // Synthetic live feed
    pub synthetic_ticks: usize,
    pub synthetic_seed: u64,
    pub synthetic_coins: Vec<(String, f64)>,
    pub synthetic_interval_ms: u64,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let run_mode = match optional_env("VELOCITAS_MODE")
            .unwrap_or_else(|| "live".to_string())
            .to_lowercase()
            .as_str()
        {
            "live" => RunMode::Live,
            "backtest" => RunMode::Backtest,
            other => {
                return Err(Error::Config(format!(
                    "VELOCITAS_MODE must be 'live' or 'backtest', got: '{other}'"
                )))
            }
        };

        let mut engine = EngineConfig::default();
        if let Some(workers) = parsed_env::<usize>("VELOCITAS_WORKERS")? {
            engine = engine.with_workers(workers);
        }
        if let Some(capacity) = parsed_env::<usize>("VELOCITAS_QUEUE_CAPACITY")? {
            engine = engine.with_queue_capacity(capacity);
        }
        if let Some(policy) = optional_env("VELOCITAS_BACKPRESSURE") {
            engine = engine.with_backpressure(policy.parse()?);
        }

        let backtest_coins = optional_env("BACKTEST_COINS").map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let synthetic_coins = match optional_env("SYNTHETIC_COINS") {
            Some(raw) => parse_coin_prices(&raw)?,
            None => vec![("BTC".to_string(), 45_000.0), ("ETH".to_string(), 2_500.0)],
        };

        Ok(Config {
            run_mode,
            engine,
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
            backtest_csv_path: optional_env("BACKTEST_CSV_PATH"),
            backtest_coins,
            rank_metric: optional_env("RANK_METRIC").unwrap_or_else(|| "net_pnl".to_string()),
            synthetic_ticks: parsed_env("SYNTHETIC_TICKS")?.unwrap_or(1_000),
            synthetic_seed: parsed_env("SYNTHETIC_SEED")?.unwrap_or(42),
            synthetic_coins,
            synthetic_interval_ms: parsed_env("SYNTHETIC_INTERVAL_MS")?.unwrap_or(1),
        })
    }
}

/// Parse `BTC:45000,ETH:2500` into `(coin, base price)` pairs.
pub fn parse_coin_prices(raw: &str) -> Result<Vec<(String, f64)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (coin, price) = entry.split_once(':').ok_or_else(|| {
                Error::Config(format!("expected COIN:PRICE, got '{entry}'"))
            })?;
            let price: f64 = price
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("non-numeric base price in '{entry}'")))?;
            if price <= 0.0 {
                return Err(Error::Config(format!("base price must be > 0 in '{entry}'")));
            }
            Ok((coin.trim().to_string(), price))
        })
        .collect()
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'"))),
        None => Ok(None),
    }
}

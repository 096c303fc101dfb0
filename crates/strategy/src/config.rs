use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use common::{Error, Result};

use crate::catalog::{self, StrategyParams};
use crate::Strategy;

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// type = "RSI"
/// coin = "BTC"
///
/// [strategy.params]
/// period = 14
/// lower_bound = 30.0
/// upper_bound = 70.0
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Catalog kind name: "SMA_Crossover", "Momentum", "MeanReversion",
    /// "RSI", "BollingerBands" or "MACD".
    #[serde(rename = "type")]
    pub kind: String,
    /// Coin symbol, e.g. "BTC".
    pub coin: String,
    /// Kind-specific parameters. Missing keys take catalog defaults.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

impl StrategyConfig {
    pub fn new(kind: impl Into<String>, coin: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            coin: coin.into(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Id the resulting strategy will register under.
    pub fn strategy_id(&self) -> Result<String> {
        let kind: catalog::StrategyKind = self.kind.parse()?;
        Ok(crate::strategy_id(&self.coin, kind.name()))
    }

    pub fn validate(&self) -> Result<StrategyParams> {
        catalog::validate(&self.kind, &self.params)
    }

    pub fn build(&self) -> Result<Box<dyn Strategy>> {
        catalog::create(&self.kind, &self.coin, &self.params)
    }
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read strategy config at '{path}': {e}")))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse strategy config at '{path}': {e}")))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[strategy]]
        type = "SMA_Crossover"
        coin = "BTC"

        [strategy.params]
        fast_period = 5
        slow_period = 20

        [[strategy]]
        type = "RSI"
        coin = "ETH"
    "#;

    #[test]
    fn parses_strategy_tables_in_order() {
        let cfg = StrategyFileConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.strategies.len(), 2);
        assert_eq!(cfg.strategies[0].kind, "SMA_Crossover");
        assert_eq!(cfg.strategies[0].params["slow_period"].as_integer(), Some(20));
        assert!(cfg.strategies[1].params.is_empty());
        assert_eq!(cfg.strategies[1].strategy_id().unwrap(), "ETH_RSI");
    }

    #[test]
    fn builds_through_the_catalog() {
        let strategy = StrategyConfig::new("Momentum", "SOL")
            .with_param("lookback", 10_i64)
            .build()
            .unwrap();
        assert_eq!(strategy.id(), "SOL_Momentum");
        assert_eq!(strategy.warmup(), 11);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = StrategyFileConfig::from_toml_str("[[strategy]]\ncoin = 3").err();
        assert!(matches!(err, Some(Error::Config(_))));
    }

    #[test]
    fn shipped_config_builds() {
        let cfg = StrategyFileConfig::from_toml_str(include_str!("../../../config/strategies.toml"))
            .unwrap();
        assert!(!cfg.strategies.is_empty());
        for strategy in &cfg.strategies {
            strategy.build().unwrap();
        }
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = StrategyFileConfig::load("/nonexistent/strategies.toml").err();
        assert!(matches!(err, Some(Error::Config(_))));
    }
}

//! Strategy catalog: kind names, typed parameters with validated defaults,
//! and the constructor for each kind.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use common::{Error, Result};

use crate::strategies::{
    BollingerBandsStrategy, MacdStrategy, MeanReversionStrategy, MomentumStrategy, RsiStrategy,
    SmaCrossoverStrategy,
};
use crate::Strategy;

/// The closed set of supported strategy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StrategyKind {
    SmaCrossover,
    Momentum,
    MeanReversion,
    Rsi,
    BollingerBands,
    Macd,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::SmaCrossover,
        StrategyKind::Momentum,
        StrategyKind::MeanReversion,
        StrategyKind::Rsi,
        StrategyKind::BollingerBands,
        StrategyKind::Macd,
    ];

    /// Name used in strategy ids, config files and the external API.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::SmaCrossover => "SMA_Crossover",
            StrategyKind::Momentum => "Momentum",
            StrategyKind::MeanReversion => "MeanReversion",
            StrategyKind::Rsi => "RSI",
            StrategyKind::BollingerBands => "BollingerBands",
            StrategyKind::Macd => "MACD",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| Error::UnknownStrategyKind(s.to_string()))
    }
}

// ─── Typed parameters ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmaCrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub position_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumParams {
    pub lookback: usize,
    pub momentum_threshold: f64,
    pub position_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanReversionParams {
    pub period: usize,
    pub deviation_threshold: f64,
    pub position_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RsiParams {
    pub period: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub position_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerParams {
    pub period: usize,
    /// Band width in population standard deviations.
    pub std_dev: f64,
    pub position_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    pub position_size: f64,
}

/// Fully resolved, validated parameters for one strategy instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "params")]
pub enum StrategyParams {
    SmaCrossover(SmaCrossoverParams),
    Momentum(MomentumParams),
    MeanReversion(MeanReversionParams),
    Rsi(RsiParams),
    BollingerBands(BollingerParams),
    Macd(MacdParams),
}

pub const DEFAULT_POSITION_SIZE: f64 = 1.0;

/// Upper bound on any window length, including MACD's `slow + signal`.
pub const MAX_PERIOD: usize = 10_000;

impl StrategyParams {
    pub fn defaults(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::SmaCrossover => StrategyParams::SmaCrossover(SmaCrossoverParams {
                fast_period: 5,
                slow_period: 20,
                position_size: DEFAULT_POSITION_SIZE,
            }),
            StrategyKind::Momentum => StrategyParams::Momentum(MomentumParams {
                lookback: 5,
                momentum_threshold: 0.002,
                position_size: DEFAULT_POSITION_SIZE,
            }),
            StrategyKind::MeanReversion => StrategyParams::MeanReversion(MeanReversionParams {
                period: 20,
                deviation_threshold: 0.02,
                position_size: DEFAULT_POSITION_SIZE,
            }),
            StrategyKind::Rsi => StrategyParams::Rsi(RsiParams {
                period: 14,
                lower_bound: 30.0,
                upper_bound: 70.0,
                position_size: DEFAULT_POSITION_SIZE,
            }),
            StrategyKind::BollingerBands => StrategyParams::BollingerBands(BollingerParams {
                period: 20,
                std_dev: 2.0,
                position_size: DEFAULT_POSITION_SIZE,
            }),
            StrategyKind::Macd => StrategyParams::Macd(MacdParams {
                fast: 12,
                slow: 26,
                signal: 9,
                position_size: DEFAULT_POSITION_SIZE,
            }),
        }
    }

    /// Overlay raw config values onto the kind's defaults and validate.
    /// Unknown parameter names are rejected.
    pub fn resolve(kind: StrategyKind, raw: &HashMap<String, toml::Value>) -> Result<Self> {
        let reader = ParamReader { kind, raw };
        reader.reject_unknown()?;

        let params = match Self::defaults(kind) {
            StrategyParams::SmaCrossover(d) => StrategyParams::SmaCrossover(SmaCrossoverParams {
                fast_period: reader.usize("fast_period", d.fast_period)?,
                slow_period: reader.usize("slow_period", d.slow_period)?,
                position_size: reader.f64("position_size", d.position_size)?,
            }),
            StrategyParams::Momentum(d) => StrategyParams::Momentum(MomentumParams {
                lookback: reader.usize("lookback", d.lookback)?,
                momentum_threshold: reader.f64("momentum_threshold", d.momentum_threshold)?,
                position_size: reader.f64("position_size", d.position_size)?,
            }),
            StrategyParams::MeanReversion(d) => {
                StrategyParams::MeanReversion(MeanReversionParams {
                    period: reader.usize("period", d.period)?,
                    deviation_threshold: reader.f64("deviation_threshold", d.deviation_threshold)?,
                    position_size: reader.f64("position_size", d.position_size)?,
                })
            }
            StrategyParams::Rsi(d) => StrategyParams::Rsi(RsiParams {
                period: reader.usize("period", d.period)?,
                lower_bound: reader.f64("lower_bound", d.lower_bound)?,
                upper_bound: reader.f64("upper_bound", d.upper_bound)?,
                position_size: reader.f64("position_size", d.position_size)?,
            }),
            StrategyParams::BollingerBands(d) => StrategyParams::BollingerBands(BollingerParams {
                period: reader.usize("period", d.period)?,
                std_dev: reader.f64("std_dev", d.std_dev)?,
                position_size: reader.f64("position_size", d.position_size)?,
            }),
            StrategyParams::Macd(d) => StrategyParams::Macd(MacdParams {
                fast: reader.usize("fast", d.fast)?,
                slow: reader.usize("slow", d.slow)?,
                signal: reader.usize("signal", d.signal)?,
                position_size: reader.f64("position_size", d.position_size)?,
            }),
        };

        params.validate()?;
        Ok(params)
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyParams::SmaCrossover(_) => StrategyKind::SmaCrossover,
            StrategyParams::Momentum(_) => StrategyKind::Momentum,
            StrategyParams::MeanReversion(_) => StrategyKind::MeanReversion,
            StrategyParams::Rsi(_) => StrategyKind::Rsi,
            StrategyParams::BollingerBands(_) => StrategyKind::BollingerBands,
            StrategyParams::Macd(_) => StrategyKind::Macd,
        }
    }

    /// Range checks shared by every construction path.
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind().name();
        let err = |param: &str, reason: &str| Err(Error::invalid_param(kind, param, reason));

        match self {
            StrategyParams::SmaCrossover(p) => {
                check_period(kind, "fast_period", p.fast_period)?;
                check_period(kind, "slow_period", p.slow_period)?;
                if p.fast_period >= p.slow_period {
                    return err("fast_period", "must be less than slow_period");
                }
                check_size(kind, p.position_size)
            }
            StrategyParams::Momentum(p) => {
                check_period(kind, "lookback", p.lookback)?;
                check_non_negative(kind, "momentum_threshold", p.momentum_threshold)?;
                check_size(kind, p.position_size)
            }
            StrategyParams::MeanReversion(p) => {
                check_period(kind, "period", p.period)?;
                check_non_negative(kind, "deviation_threshold", p.deviation_threshold)?;
                check_size(kind, p.position_size)
            }
            StrategyParams::Rsi(p) => {
                check_period(kind, "period", p.period)?;
                if !(0.0..=100.0).contains(&p.lower_bound) {
                    return err("lower_bound", "must be within [0, 100]");
                }
                if !(0.0..=100.0).contains(&p.upper_bound) {
                    return err("upper_bound", "must be within [0, 100]");
                }
                if p.lower_bound >= p.upper_bound {
                    return err("lower_bound", "must be less than upper_bound");
                }
                check_size(kind, p.position_size)
            }
            StrategyParams::BollingerBands(p) => {
                check_period(kind, "period", p.period)?;
                check_non_negative(kind, "std_dev", p.std_dev)?;
                check_size(kind, p.position_size)
            }
            StrategyParams::Macd(p) => {
                check_period(kind, "fast", p.fast)?;
                check_period(kind, "slow", p.slow)?;
                check_period(kind, "signal", p.signal)?;
                if p.fast >= p.slow {
                    return err("fast", "must be less than slow");
                }
                if p.slow + p.signal > MAX_PERIOD {
                    return err("signal", &format!("slow + signal must be at most {MAX_PERIOD}"));
                }
                check_size(kind, p.position_size)
            }
        }
    }

    /// Parameters as a flat name → value map.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let pairs: Vec<(&str, f64)> = match self {
            StrategyParams::SmaCrossover(p) => vec![
                ("fast_period", p.fast_period as f64),
                ("slow_period", p.slow_period as f64),
                ("position_size", p.position_size),
            ],
            StrategyParams::Momentum(p) => vec![
                ("lookback", p.lookback as f64),
                ("momentum_threshold", p.momentum_threshold),
                ("position_size", p.position_size),
            ],
            StrategyParams::MeanReversion(p) => vec![
                ("period", p.period as f64),
                ("deviation_threshold", p.deviation_threshold),
                ("position_size", p.position_size),
            ],
            StrategyParams::Rsi(p) => vec![
                ("period", p.period as f64),
                ("lower_bound", p.lower_bound),
                ("upper_bound", p.upper_bound),
                ("position_size", p.position_size),
            ],
            StrategyParams::BollingerBands(p) => vec![
                ("period", p.period as f64),
                ("std_dev", p.std_dev),
                ("position_size", p.position_size),
            ],
            StrategyParams::Macd(p) => vec![
                ("fast", p.fast as f64),
                ("slow", p.slow as f64),
                ("signal", p.signal as f64),
                ("position_size", p.position_size),
            ],
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn param_names(kind: StrategyKind) -> Vec<String> {
        Self::defaults(kind).to_map().into_keys().collect()
    }
}

fn check_period(kind: &str, param: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::invalid_param(kind, param, "must be at least 1"));
    }
    if value > MAX_PERIOD {
        return Err(Error::invalid_param(kind, param, format!("must be at most {MAX_PERIOD}")));
    }
    Ok(())
}

fn check_non_negative(kind: &str, param: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid_param(kind, param, "must be a finite value >= 0"));
    }
    Ok(())
}

fn check_size(kind: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::invalid_param(kind, "position_size", "must be a finite value > 0"));
    }
    Ok(())
}

struct ParamReader<'a> {
    kind: StrategyKind,
    raw: &'a HashMap<String, toml::Value>,
}

impl ParamReader<'_> {
    fn reject_unknown(&self) -> Result<()> {
        let known = StrategyParams::param_names(self.kind);
        let mut unknown: Vec<&String> = self.raw.keys().filter(|k| !known.contains(k)).collect();
        unknown.sort();
        match unknown.first() {
            Some(key) => Err(Error::invalid_param(
                self.kind.name(),
                key.as_str(),
                format!("unknown parameter (expected one of: {})", known.join(", ")),
            )),
            None => Ok(()),
        }
    }

    fn f64(&self, key: &str, default: f64) -> Result<f64> {
        match self.raw.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_float()
                .or_else(|| v.as_integer().map(|i| i as f64))
                .ok_or_else(|| Error::invalid_param(self.kind.name(), key, "expected a number")),
        }
    }

    fn usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.raw.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_integer()
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| {
                    Error::invalid_param(self.kind.name(), key, "expected a non-negative integer")
                }),
        }
    }
}

// ─── Construction ─────────────────────────────────────────────────────────────

/// Resolve `kind` by name and validate `raw` parameters without building.
pub fn validate(kind: &str, raw: &HashMap<String, toml::Value>) -> Result<StrategyParams> {
    let kind: StrategyKind = kind.parse()?;
    StrategyParams::resolve(kind, raw)
}

/// Build a strategy for `coin` from a kind name and raw parameters.
pub fn create(
    kind: &str,
    coin: &str,
    raw: &HashMap<String, toml::Value>,
) -> Result<Box<dyn Strategy>> {
    let params = validate(kind, raw)?;
    let strategy = build(coin, params);
    debug!(strategy_id = %strategy.id(), "Strategy constructed");
    Ok(strategy)
}

/// Build a strategy from already validated parameters.
pub fn build(coin: &str, params: StrategyParams) -> Box<dyn Strategy> {
    match params {
        StrategyParams::SmaCrossover(p) => Box::new(SmaCrossoverStrategy::new(coin, p)),
        StrategyParams::Momentum(p) => Box::new(MomentumStrategy::new(coin, p)),
        StrategyParams::MeanReversion(p) => Box::new(MeanReversionStrategy::new(coin, p)),
        StrategyParams::Rsi(p) => Box::new(RsiStrategy::new(coin, p)),
        StrategyParams::BollingerBands(p) => Box::new(BollingerBandsStrategy::new(coin, p)),
        StrategyParams::Macd(p) => Box::new(MacdStrategy::new(coin, p)),
    }
}

/// Human-facing description of one catalog kind.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub kind: StrategyKind,
    pub name: &'static str,
    pub description: &'static str,
    pub best_for: &'static [&'static str],
    pub defaults: BTreeMap<String, f64>,
}

/// Every supported kind with its description and default parameters.
pub fn describe() -> Vec<CatalogEntry> {
    StrategyKind::ALL
        .into_iter()
        .map(|kind| {
            let (description, best_for): (&str, &[&str]) = match kind {
                StrategyKind::SmaCrossover => {
                    ("Simple Moving Average Crossover", &["Trending markets"])
                }
                StrategyKind::Momentum => {
                    ("Rate of Change Momentum", &["Uptrends", "Strong movements"])
                }
                StrategyKind::MeanReversion => {
                    ("Mean Reversion", &["Sideways markets", "Ranging"])
                }
                StrategyKind::Rsi => {
                    ("Relative Strength Index", &["Overbought/Oversold detection"])
                }
                StrategyKind::BollingerBands => ("Bollinger Bands", &["Volatile markets"]),
                StrategyKind::Macd => {
                    ("Moving Average Convergence Divergence", &["Trend confirmation"])
                }
            };
            CatalogEntry {
                kind,
                name: kind.name(),
                description,
                best_for,
                defaults: StrategyParams::defaults(kind).to_map(),
            }
        })
        .collect()
}

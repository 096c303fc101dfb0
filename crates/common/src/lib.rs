pub mod config;
pub mod error;
pub mod types;

pub use config::{BackpressurePolicy, Config, EngineConfig, RunMode};
pub use error::{Error, Result};
pub use types::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown strategy kind: '{0}'")]
    UnknownStrategyKind(String),

    #[error("Strategy already registered: '{0}'")]
    DuplicateStrategy(String),

    #[error("Invalid parameter '{param}' for {kind}: {reason}")]
    InvalidParameter {
        kind: String,
        param: String,
        reason: String,
    },

    #[error("Tick queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Backtest dataset has no usable ticks")]
    EmptyDataset,

    #[error("Invalid tick: {0}")]
    InvalidTick(String),

    #[error("Engine is not accepting work")]
    EngineStopped,

    #[error("Unknown ranking metric: '{0}'")]
    UnknownMetric(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tick feed error: {0}")]
    Feed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_param(
        kind: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            kind: kind.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

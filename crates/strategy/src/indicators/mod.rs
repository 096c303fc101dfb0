pub mod bollinger;
pub mod macd;
pub mod rsi;

pub use bollinger::{Bands, BollingerIndicator};
pub use macd::MacdIndicator;
pub use rsi::RsiIndicator;

/// Simple moving average of the last `period` values.
pub fn sma(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }
    Some(data[data.len() - period..].iter().sum::<f64>() / period as f64)
}

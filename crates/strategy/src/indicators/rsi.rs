/// RSI (Relative Strength Index) indicator.
///
/// Plain-average variant: gains and losses over the last `period` deltas are
/// each summed and divided by `period` (no Wilder smoothing carried across
/// windows). Returns `None` until at least `period + 1` prices are available.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

/// RSI reported for a window with neither gains nor losses. Flat prices
/// read as neutral rather than 0, so a constant series never looks
/// oversold and never triggers a BUY.
pub const NEUTRAL_RSI: f64 = 50.0;

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Compute RSI from a slice of prices (oldest first), using the most
    /// recent `period + 1` values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if self.period == 0 || closes.len() < self.period + 1 {
            return None;
        }

        let window = &closes[closes.len() - (self.period + 1)..];
        let (gains, losses) = window
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold((0.0, 0.0), |(g, l), d| {
                if d > 0.0 {
                    (g + d, l)
                } else {
                    (g, l - d)
                }
            });

        let avg_gain = gains / self.period as f64;
        let avg_loss = losses / self.period as f64;

        if avg_loss == 0.0 {
            return Some(if avg_gain > 0.0 { 100.0 } else { NEUTRAL_RSI });
        }

        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

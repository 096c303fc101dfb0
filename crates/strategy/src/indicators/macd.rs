/// MACD line indicator.
///
/// Computes MACD line = EMA(fast) − EMA(slow) where each EMA is seeded with
/// the simple average of the last `period` prices and then smoothed over
/// those same `period` prices with `k = 2 / (period + 1)`. This is a
/// compressed EMA rather than a full-history one; crossovers are detected on
/// the sign of the line, not against a signal line.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self { fast, slow, signal }
    }

    /// Prices retained by a strategy using this indicator.
    pub fn window_capacity(&self) -> usize {
        self.slow + self.signal
    }

    /// Compute the MACD line from prices (oldest first).
    /// Returns `None` until at least `slow` prices are available.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.slow {
            return None;
        }
        let fast = seeded_ema(closes, self.fast)?;
        let slow = seeded_ema(closes, self.slow)?;
        Some(fast - slow)
    }
}

/// EMA over the last `period` values of `data`, seeded from their SMA.
pub fn seeded_ema(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let tail = &data[data.len() - period..];

    let mut ema_val = tail.iter().sum::<f64>() / period as f64;
    for &price in tail {
        ema_val = price * k + ema_val * (1.0 - k);
    }
    Some(ema_val)
}

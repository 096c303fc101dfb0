/// Bollinger bands over a population standard deviation.
#[derive(Debug, Clone)]
pub struct BollingerIndicator {
    pub period: usize,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub lower: f64,
    pub middle: f64,
    pub upper: f64,
}

impl BollingerIndicator {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self { period, multiplier }
    }

    /// Bands over the last `period` prices, or `None` with fewer prices.
    pub fn compute(&self, closes: &[f64]) -> Option<Bands> {
        if self.period == 0 || closes.len() < self.period {
            return None;
        }
        let window = &closes[closes.len() - self.period..];
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        let width = self.multiplier * variance.sqrt();

        Some(Bands {
            lower: mean - width,
            middle: mean,
            upper: mean + width,
        })
    }
}

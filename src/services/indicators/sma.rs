//! Simple Moving Average (SMA) indicator.

use crate::services::indicators::Indicator;
use crate::types::Candle;

/// Arithmetic mean of the trailing `period` closes. Undefined until `period`
/// candles exist.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// SMA at the end of the series.
    pub fn last(&self, candles: &[Candle]) -> Option<f64> {
        if candles.len() < self.period {
            return None;
        }
        let sum: f64 = candles
            .iter()
            .rev()
            .take(self.period)
            .map(|c| c.close)
            .sum();
        Some(sum / self.period as f64)
    }
}

impl Indicator for Sma {
    fn id(&self) -> String {
        format!("sma{}", self.period)
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn series(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let mut out = Vec::with_capacity(candles.len());
        let mut sum = 0.0;
        for (i, candle) in candles.iter().enumerate() {
            sum += candle.close;
            if i >= self.period {
                sum -= candles[i - self.period].close;
            }
            if i + 1 >= self.period {
                out.push(Some(sum / self.period as f64));
            } else {
                out.push(None);
            }
        }
        out
    }
}

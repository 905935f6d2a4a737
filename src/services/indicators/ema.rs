//! Exponential Moving Average (EMA) indicator.

use crate::services::indicators::Indicator;
use crate::types::Candle;

/// Incremental EMA fold.
///
/// The first `period` outputs are the running simple average of the prices
/// seen so far, so the series has no leading gap. After that the standard
/// recursion applies: `ema = (price - prev) * 2 / (period + 1) + prev`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaState {
    period: usize,
    count: usize,
    sum: f64,
    value: Option<f64>,
}

impl EmaState {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            count: 0,
            sum: 0.0,
            value: None,
        }
    }

    pub fn multiplier(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }

    /// Fold one price into the average and return the new value.
    pub fn next(&mut self, price: f64) -> f64 {
        self.count += 1;
        let value = match self.value {
            Some(prev) if self.count > self.period => (price - prev) * self.multiplier() + prev,
            _ => {
                self.sum += price;
                self.sum / self.count as f64
            }
        };
        self.value = Some(value);
        value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// EMA over candle closes.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// Full series; equal to replaying [`EmaState::next`] over every close.
    pub fn values(&self, candles: &[Candle]) -> Vec<f64> {
        let mut state = EmaState::new(self.period);
        candles.iter().map(|c| state.next(c.close)).collect()
    }

    /// Final state after folding every close, for incremental continuation.
    pub fn state(&self, candles: &[Candle]) -> EmaState {
        let mut state = EmaState::new(self.period);
        for candle in candles {
            state.next(candle.close);
        }
        state
    }
}

impl Indicator for Ema {
    fn id(&self) -> String {
        format!("ema{}", self.period)
    }

    fn min_periods(&self) -> usize {
        1
    }

    fn series(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        self.values(candles).into_iter().map(Some).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::from_price(i as i64 * 60, c, 100.0))
            .collect()
    }

    #[test]
    fn test_ema_seeds_with_running_average() {
        let ema = Ema::new(3);
        let values = ema.values(&candles(&[2.0, 4.0, 6.0, 8.0]));
        assert_eq!(values[0], 2.0);
        assert_eq!(values[1], 3.0);
        assert_eq!(values[2], 4.0);
        // (8 - 4) * 0.5 + 4
        assert_eq!(values[3], 6.0);
    }

    #[test]
    fn test_ema_no_leading_gap() {
        let ema = Ema::new(21);
        let series = ema.series(&candles(&[10.0, 11.0]));
        assert!(series.iter().all(Option::is_some));
    }

    #[test]
    fn test_incremental_matches_batch() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 3.0).collect();
        let all = candles(&closes);
        let ema = Ema::new(9);

        let mut state = ema.state(&all[..39]);
        let stepped = state.next(all[39].close);
        let batch = *ema.values(&all).last().unwrap();

        assert_eq!(stepped, batch);
        assert_eq!(state.count(), 40);
    }

    #[test]
    fn test_empty_series() {
        assert!(Ema::new(9).values(&[]).is_empty());
        assert_eq!(Ema::new(9).state(&[]).value(), None);
    }
}

//! Patience-candle detection: an inside bar pausing at a key level.

use crate::types::{Candle, Direction, KeyLevel, PatienceSignal};

/// Detects patience candles on the last two candles of a series.
#[derive(Debug, Clone, Copy)]
pub struct PatienceDetector {
    /// Midpoint-to-level band, percent of the midpoint.
    proximity_pct: f64,
}

impl PatienceDetector {
    pub fn new(proximity_pct: f64) -> Self {
        Self {
            proximity_pct: proximity_pct.max(0.0),
        }
    }

    /// Fires when the last candle is an inside bar of the one before it and its
    /// midpoint sits within the proximity band of any level. Bullish when the
    /// candle closed above its open, bearish otherwise.
    pub fn detect(&self, candles: &[Candle], levels: &[KeyLevel]) -> PatienceSignal {
        let [.., prev, last] = candles else {
            return PatienceSignal::none();
        };
        if !last.is_inside(prev) {
            return PatienceSignal::none();
        }

        let mid = last.midpoint();
        let band = mid.abs() * self.proximity_pct / 100.0;
        let near_level = levels
            .iter()
            .any(|l| l.price.is_finite() && (l.price - mid).abs() <= band);
        if !near_level {
            return PatienceSignal::none();
        }

        let direction = if last.is_bullish() {
            Direction::Bullish
        } else {
            Direction::Bearish
        };
        PatienceSignal::fired(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LevelType;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            time: 0,
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    fn level(price: f64) -> Vec<KeyLevel> {
        vec![KeyLevel::new(LevelType::Support, price)]
    }

    #[test]
    fn test_inside_bar_at_level_bullish() {
        let detector = PatienceDetector::new(0.15);
        let candles = [candle(7.0, 10.0, 5.0, 6.0), candle(6.5, 9.0, 6.0, 8.0)];
        let signal = detector.detect(&candles, &level(7.5));
        assert_eq!(signal, PatienceSignal::fired(Direction::Bullish));
    }

    #[test]
    fn test_inside_bar_at_level_bearish() {
        let detector = PatienceDetector::new(0.15);
        let candles = [candle(7.0, 10.0, 5.0, 6.0), candle(8.0, 9.0, 6.0, 6.5)];
        let signal = detector.detect(&candles, &level(7.5));
        assert_eq!(signal, PatienceSignal::fired(Direction::Bearish));
    }

    #[test]
    fn test_outside_bar_never_fires() {
        let detector = PatienceDetector::new(100.0);
        let candles = [candle(7.0, 10.0, 5.0, 6.0), candle(6.0, 11.0, 4.0, 9.0)];
        assert!(!detector.detect(&candles, &level(7.5)).detected);
    }

    #[test]
    fn test_equal_high_is_not_inside() {
        let detector = PatienceDetector::new(100.0);
        let candles = [candle(7.0, 10.0, 5.0, 6.0), candle(6.0, 10.0, 6.0, 9.0)];
        assert!(!detector.detect(&candles, &level(8.0)).detected);
    }

    #[test]
    fn test_inside_bar_away_from_levels() {
        let detector = PatienceDetector::new(0.15);
        let candles = [candle(7.0, 10.0, 5.0, 6.0), candle(6.5, 9.0, 6.0, 8.0)];
        assert!(!detector.detect(&candles, &level(9.5)).detected);
        assert!(!detector.detect(&candles, &[]).detected);
    }

    #[test]
    fn test_needs_two_candles() {
        let detector = PatienceDetector::new(0.15);
        assert!(!detector.detect(&[candle(1.0, 2.0, 0.5, 1.5)], &level(1.25)).detected);
    }
}

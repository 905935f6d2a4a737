//! Opening range (ORB) bounds.

use crate::services::calendar::{local_time, session_date};
use crate::types::{Candle, OpeningRange};
use chrono::NaiveTime;
use chrono_tz::Tz;

/// High/low of the first `window_candles` candles at or after the session open.
pub struct OpeningRangeCalc {
    tz: Tz,
    session_open: NaiveTime,
    window_candles: usize,
}

impl OpeningRangeCalc {
    pub fn new(tz: Tz, session_open: NaiveTime, window_candles: usize) -> Self {
        Self {
            tz,
            session_open,
            window_candles: window_candles.max(1),
        }
    }

    /// Opening range of the session the last candle belongs to. `None` before
    /// the open or with no candles.
    pub fn compute(&self, candles: &[Candle]) -> Option<OpeningRange> {
        let last = candles.last()?;
        let session = session_date(last.time, self.tz)?;

        let mut range: Option<OpeningRange> = None;
        let mut regular = 0usize;

        for candle in candles {
            if session_date(candle.time, self.tz) != Some(session) {
                continue;
            }
            match local_time(candle.time, self.tz) {
                Some(t) if t >= self.session_open => {}
                _ => continue,
            }
            regular += 1;
            if regular > self.window_candles {
                break;
            }
            range = Some(match range {
                None => OpeningRange {
                    high: candle.high,
                    low: candle.low,
                    candles: 1,
                    complete: false,
                },
                Some(r) => OpeningRange {
                    high: r.high.max(candle.high),
                    low: r.low.min(candle.low),
                    candles: r.candles + 1,
                    complete: false,
                },
            });
        }

        range.map(|mut r| {
            r.complete = r.candles >= self.window_candles;
            r
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    // 2024-06-03 13:30 UTC, 09:30 in New York.
    const OPEN: i64 = 1_717_421_400;

    fn bar(time: i64, high: f64, low: f64) -> Candle {
        Candle {
            time,
            open: low,
            high,
            low,
            close: high,
            volume: 10.0,
        }
    }

    fn calc() -> OpeningRangeCalc {
        OpeningRangeCalc::new(New_York, NaiveTime::from_hms_opt(9, 30, 0).unwrap(), 3)
    }

    #[test]
    fn test_orb_ignores_premarket_and_later_candles() {
        let candles = vec![
            bar(OPEN - 300, 120.0, 80.0),
            bar(OPEN, 101.0, 99.0),
            bar(OPEN + 300, 102.0, 98.5),
            bar(OPEN + 600, 101.5, 99.5),
            bar(OPEN + 900, 130.0, 90.0),
        ];
        let orb = calc().compute(&candles).unwrap();
        assert_eq!(orb.high, 102.0);
        assert_eq!(orb.low, 98.5);
        assert!(orb.complete);
    }

    #[test]
    fn test_orb_incomplete_window() {
        let candles = vec![bar(OPEN, 101.0, 99.0)];
        let orb = calc().compute(&candles).unwrap();
        assert_eq!(orb.candles, 1);
        assert!(!orb.complete);
    }

    #[test]
    fn test_orb_none_before_open() {
        let candles = vec![bar(OPEN - 600, 101.0, 99.0)];
        assert!(calc().compute(&candles).is_none());
    }
}

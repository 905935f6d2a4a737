//! Session Volume Weighted Average Price (VWAP).

use crate::services::calendar::session_date;
use crate::services::indicators::Indicator;
use crate::types::Candle;
use chrono::NaiveDate;
use chrono_tz::Tz;

/// Cumulative session VWAP:
/// VWAP = Cumulative(TP * Volume) / Cumulative(Volume), reset at each
/// exchange-local calendar day.
///
/// Bars with zero or missing volume weigh 1 so they still pull the average
/// by their typical price.
pub struct SessionVwap {
    tz: Tz,
}

impl SessionVwap {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    fn weight(candle: &Candle) -> f64 {
        if candle.volume.is_finite() && candle.volume > 0.0 {
            candle.volume
        } else {
            1.0
        }
    }

    fn vwap_of<'a>(candles: impl Iterator<Item = &'a Candle>) -> Option<f64> {
        let mut cum_tp_vol = 0.0;
        let mut cum_vol = 0.0;
        for candle in candles {
            let vol = Self::weight(candle);
            cum_tp_vol += candle.typical_price() * vol;
            cum_vol += vol;
        }
        (cum_vol > 0.0).then(|| cum_tp_vol / cum_vol)
    }

    /// Session to report for `today`: today if it has bars, otherwise the most
    /// recent earlier session.
    fn target_session(&self, candles: &[Candle], today: NaiveDate) -> Option<NaiveDate> {
        let mut latest_prior: Option<NaiveDate> = None;
        for candle in candles.iter().rev() {
            let Some(date) = session_date(candle.time, self.tz) else {
                continue;
            };
            if date == today {
                return Some(today);
            }
            if date < today && latest_prior.map_or(true, |d| date > d) {
                latest_prior = Some(date);
            }
        }
        latest_prior
    }

    /// VWAP for the session containing `as_of` (epoch seconds), falling back to
    /// the most recent prior session. Returns 0 when no session has bars;
    /// callers treat 0 as unavailable.
    pub fn value(&self, candles: &[Candle], as_of: i64) -> f64 {
        let Some(today) = session_date(as_of, self.tz) else {
            return 0.0;
        };
        let Some(target) = self.target_session(candles, today) else {
            return 0.0;
        };
        Self::vwap_of(
            candles
                .iter()
                .filter(|c| session_date(c.time, self.tz) == Some(target)),
        )
        .unwrap_or(0.0)
    }
}

impl Indicator for SessionVwap {
    fn id(&self) -> String {
        "vwap".to_string()
    }

    fn min_periods(&self) -> usize {
        1
    }

    fn series(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let mut out = Vec::with_capacity(candles.len());
        let mut session: Option<NaiveDate> = None;
        let mut cum_tp_vol = 0.0;
        let mut cum_vol = 0.0;

        for candle in candles {
            let date = session_date(candle.time, self.tz);
            if date != session {
                session = date;
                cum_tp_vol = 0.0;
                cum_vol = 0.0;
            }
            let vol = Self::weight(candle);
            cum_tp_vol += candle.typical_price() * vol;
            cum_vol += vol;
            out.push(Some(cum_tp_vol / cum_vol));
        }
        out
    }
}

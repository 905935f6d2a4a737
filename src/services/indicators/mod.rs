//! Technical indicator implementations.
//!
//! Every indicator is a pure function of the candle series: entry `i` of an
//! output series depends only on candles `[0..=i]`.

pub mod ema;
pub mod orb;
pub mod sma;
pub mod vwap;

pub use ema::{Ema, EmaState};
pub use orb::OpeningRangeCalc;
pub use sma::Sma;
pub use vwap::SessionVwap;

use crate::config::EngineConfig;
use crate::types::{Candle, IndicatorSnapshot};
use serde::{Deserialize, Serialize};

/// Trait for series-producing indicators.
pub trait Indicator: Send + Sync {
    /// Unique identifier, e.g. `ema9`.
    fn id(&self) -> String;

    /// Candles required before the first defined entry.
    fn min_periods(&self) -> usize;

    /// One entry per candle; `None` where the window is not yet satisfied.
    fn series(&self, candles: &[Candle]) -> Vec<Option<f64>>;
}

/// Indicator arrays aligned 1:1 with a candle series, for charting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSeries {
    pub ema_short: Vec<Option<f64>>,
    pub ema_long: Vec<Option<f64>>,
    pub vwap: Vec<Option<f64>>,
    pub sma_long: Vec<Option<f64>>,
}

/// The indicator bundle the engine runs on every analysis pass.
pub struct IndicatorSet {
    pub ema_short: Ema,
    pub ema_long: Ema,
    pub sma_long: Sma,
    pub vwap: SessionVwap,
    pub orb: OpeningRangeCalc,
}

impl IndicatorSet {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            ema_short: Ema::new(config.ema_short),
            ema_long: Ema::new(config.ema_long),
            sma_long: Sma::new(config.sma_long),
            vwap: SessionVwap::new(config.session_tz),
            orb: OpeningRangeCalc::new(
                config.session_tz,
                config.session_open,
                config.orb_candles(),
            ),
        }
    }

    pub fn series(&self, candles: &[Candle]) -> IndicatorSeries {
        IndicatorSeries {
            ema_short: self.ema_short.series(candles),
            ema_long: self.ema_long.series(candles),
            vwap: self.vwap.series(candles),
            sma_long: self.sma_long.series(candles),
        }
    }

    /// Latest values; `as_of` picks the VWAP session.
    pub fn snapshot(&self, candles: &[Candle], as_of: i64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            ema_short: self.ema_short.state(candles).value(),
            ema_long: self.ema_long.state(candles).value(),
            vwap: self.vwap.value(candles, as_of),
            sma_long: self.sma_long.last(candles),
            orb: self.orb.compute(candles),
        }
    }
}

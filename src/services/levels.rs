//! Key price levels for confluence scoring and chart display.
//!
//! The whole collection is rebuilt on every analysis pass. Each [`LevelType`]
//! appears at most once, and derived support/resistance candidates are
//! skipped when they coincide with a level already added.

use crate::config::EngineConfig;
use crate::services::calendar::{bar_date, local_time, month_key, session_date, week_key};
use crate::types::{Candle, IndicatorSnapshot, KeyLevel, LevelType};
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use std::collections::HashSet;

/// Touch tolerance for support/resistance strength, percent of price.
const TOUCH_TOLERANCE_PCT: f64 = 0.10;

/// Everything the registry needs for one pass.
#[derive(Debug, Clone, Copy)]
pub struct LevelInputs<'a> {
    pub daily: &'a [Candle],
    pub weekly: &'a [Candle],
    pub intraday: &'a [Candle],
    pub indicators: &'a IndicatorSnapshot,
    pub current_price: f64,
    /// Epoch seconds used to decide which session is "today".
    pub as_of: i64,
}

/// Accumulates levels, enforcing one entry per type and finite prices.
struct LevelBuilder {
    levels: Vec<KeyLevel>,
    added_types: HashSet<LevelType>,
    added_prices: Vec<f64>,
    merge_pct: f64,
}

impl LevelBuilder {
    fn new(merge_pct: f64) -> Self {
        Self {
            levels: Vec::new(),
            added_types: HashSet::new(),
            added_prices: Vec::new(),
            merge_pct,
        }
    }

    fn valid(price: f64) -> bool {
        price.is_finite() && price > 0.0
    }

    fn push(&mut self, level: KeyLevel) -> bool {
        if !Self::valid(level.price) || self.added_types.contains(&level.level_type) {
            return false;
        }
        self.added_types.insert(level.level_type);
        self.added_prices.push(level.price);
        self.levels.push(level);
        true
    }

    fn push_price(&mut self, level_type: LevelType, price: Option<f64>) -> bool {
        match price {
            Some(price) => self.push(KeyLevel::new(level_type, price)),
            None => false,
        }
    }

    /// Push unless the price duplicates one already added.
    fn push_distinct(&mut self, level: KeyLevel) -> bool {
        if !Self::valid(level.price) {
            return false;
        }
        let tolerance = level.price * self.merge_pct / 100.0;
        if self
            .added_prices
            .iter()
            .any(|p| (p - level.price).abs() <= tolerance)
        {
            return false;
        }
        self.push(level)
    }

    fn finish(self) -> Vec<KeyLevel> {
        self.levels
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PeriodStats {
    high: f64,
    low: f64,
    close: f64,
}

fn period_stats<'a>(candles: impl Iterator<Item = &'a Candle>) -> Option<PeriodStats> {
    candles.fold(None, |acc: Option<PeriodStats>, c| {
        Some(match acc {
            None => PeriodStats {
                high: c.high,
                low: c.low,
                close: c.close,
            },
            Some(s) => PeriodStats {
                high: s.high.max(c.high),
                low: s.low.min(c.low),
                close: c.close,
            },
        })
    })
}

/// Stats of the latest period strictly before `current`, grouping candles by `key`.
fn prior_period<K: Ord + Copy>(
    candles: &[Candle],
    key: impl Fn(&Candle) -> Option<K>,
    current: K,
) -> Option<PeriodStats> {
    let target = candles
        .iter()
        .filter_map(|c| key(c))
        .filter(|k| *k < current)
        .max()?;
    period_stats(candles.iter().filter(|c| key(c) == Some(target)))
}

/// Round-number increment for a price.
pub fn round_step(price: f64) -> f64 {
    if price >= 100.0 {
        5.0
    } else {
        1.0
    }
}

/// Nearest round numbers at or below and strictly above `price`.
pub fn round_levels(price: f64) -> Option<(f64, f64)> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let step = round_step(price);
    let below = (price / step).floor() * step;
    Some((below, below + step))
}

pub struct LevelRegistry {
    tz: Tz,
    session_open: NaiveTime,
    merge_pct: f64,
    pivot_lookback: usize,
}

impl LevelRegistry {
    pub fn new(tz: Tz, session_open: NaiveTime, merge_pct: f64, pivot_lookback: usize) -> Self {
        Self {
            tz,
            session_open,
            merge_pct,
            pivot_lookback: pivot_lookback.max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.session_tz,
            config.session_open,
            config.level_merge_pct,
            config.pivot_lookback,
        )
    }

    /// Build the complete level set for the session containing `inputs.as_of`.
    pub fn build(&self, inputs: &LevelInputs<'_>) -> Vec<KeyLevel> {
        let mut builder = LevelBuilder::new(self.merge_pct);
        let Some(today) = session_date(inputs.as_of, self.tz) else {
            return Vec::new();
        };

        if let Some(prev) = self.previous_day(inputs, today) {
            builder.push_price(LevelType::PrevDayHigh, Some(prev.high));
            builder.push_price(LevelType::PrevDayLow, Some(prev.low));
            builder.push_price(LevelType::PrevDayClose, Some(prev.close));
        }

        if let Some(pre) = self.premarket(inputs.intraday, today) {
            builder.push_price(LevelType::PremarketHigh, Some(pre.high));
            builder.push_price(LevelType::PremarketLow, Some(pre.low));
        }

        if let Some(orb) = inputs.indicators.orb {
            builder.push_price(LevelType::OrbHigh, Some(orb.high));
            builder.push_price(LevelType::OrbLow, Some(orb.low));
        }

        builder.push_price(LevelType::Vwap, inputs.indicators.vwap());
        builder.push_price(LevelType::EmaShort, inputs.indicators.ema_short);
        builder.push_price(LevelType::EmaLong, inputs.indicators.ema_long);
        builder.push_price(LevelType::SmaLong, inputs.indicators.sma_long);

        let week_source = if inputs.weekly.is_empty() {
            inputs.daily
        } else {
            inputs.weekly
        };
        if let Some(week) =
            prior_period(week_source, |c| bar_date(c.time).map(week_key), week_key(today))
        {
            builder.push_price(LevelType::WeekHigh, Some(week.high));
            builder.push_price(LevelType::WeekLow, Some(week.low));
        }
        if let Some(month) =
            prior_period(inputs.daily, |c| bar_date(c.time).map(month_key), month_key(today))
        {
            builder.push_price(LevelType::MonthHigh, Some(month.high));
            builder.push_price(LevelType::MonthLow, Some(month.low));
        }

        if let Some((below, above)) = round_levels(inputs.current_price) {
            builder.push(KeyLevel::new(LevelType::RoundBelow, below).with_label(format!("${}", below)));
            builder.push(KeyLevel::new(LevelType::RoundAbove, above).with_label(format!("${}", above)));
        }

        if let Some(level) = self.resistance(inputs.intraday, inputs.current_price) {
            builder.push_distinct(level);
        }
        if let Some(level) = self.support(inputs.intraday, inputs.current_price) {
            builder.push_distinct(level);
        }

        builder.finish()
    }

    /// Previous session's high/low/close: daily bars first, then the prior
    /// session's intraday candles.
    fn previous_day(&self, inputs: &LevelInputs<'_>, today: NaiveDate) -> Option<PeriodStats> {
        let from_daily = inputs
            .daily
            .iter()
            .filter(|c| bar_date(c.time).is_some_and(|d| d < today))
            .last()
            .map(|c| PeriodStats {
                high: c.high,
                low: c.low,
                close: c.close,
            });
        from_daily.or_else(|| prior_period(inputs.intraday, |c| session_date(c.time, self.tz), today))
    }

    fn premarket(&self, intraday: &[Candle], today: NaiveDate) -> Option<PeriodStats> {
        period_stats(intraday.iter().filter(|c| {
            session_date(c.time, self.tz) == Some(today)
                && local_time(c.time, self.tz).is_some_and(|t| t < self.session_open)
        }))
    }

    fn is_pivot(&self, candles: &[Candle], i: usize, value: impl Fn(&Candle) -> f64, higher: bool) -> bool {
        let n = self.pivot_lookback;
        if i < n || i + n >= candles.len() {
            return false;
        }
        let center = value(&candles[i]);
        (i - n..=i + n).filter(|&j| j != i).all(|j| {
            let other = value(&candles[j]);
            if higher {
                center > other
            } else {
                center < other
            }
        })
    }

    fn touches(candles: &[Candle], price: f64, value: impl Fn(&Candle) -> f64) -> u32 {
        let tolerance = price * TOUCH_TOLERANCE_PCT / 100.0;
        candles
            .iter()
            .filter(|c| (value(c) - price).abs() <= tolerance)
            .count() as u32
    }

    /// Nearest swing high above price.
    fn resistance(&self, candles: &[Candle], price: f64) -> Option<KeyLevel> {
        let level = (0..candles.len())
            .filter(|&i| self.is_pivot(candles, i, |c| c.high, true))
            .map(|i| candles[i].high)
            .filter(|h| *h > price)
            .min_by(|a, b| a.total_cmp(b))?;
        Some(
            KeyLevel::new(LevelType::Resistance, level)
                .with_strength(Self::touches(candles, level, |c| c.high)),
        )
    }

    /// Nearest swing low below price.
    fn support(&self, candles: &[Candle], price: f64) -> Option<KeyLevel> {
        let level = (0..candles.len())
            .filter(|&i| self.is_pivot(candles, i, |c| c.low, false))
            .map(|i| candles[i].low)
            .filter(|l| *l < price)
            .max_by(|a, b| a.total_cmp(b))?;
        Some(
            KeyLevel::new(LevelType::Support, level)
                .with_strength(Self::touches(candles, level, |c| c.low)),
        )
    }
}

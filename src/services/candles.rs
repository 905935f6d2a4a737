//! Tick to candle aggregation for one symbol/timeframe pair.

use crate::error::{EngineError, Result};
use crate::types::{Candle, Tick, Timeframe};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// Why a tick did not reach a candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Non-finite or non-positive price, or bad volume.
    Invalid,
    /// Bucket is older than the current candle.
    Late,
    /// Tick belongs to a different symbol than this aggregator.
    OtherSymbol,
    /// Timeframe switched and history has not been reseeded yet.
    AwaitingSeed,
}

/// Outcome of feeding a tick into the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum CandleEvent {
    /// The in-progress candle absorbed the tick.
    Updated(Candle),
    /// A new bucket opened; `closed` is the candle it replaced, now immutable.
    Opened {
        closed: Option<Candle>,
        current: Candle,
    },
    Dropped(DropReason),
}

impl CandleEvent {
    /// The candle that closed with this event, if any.
    pub fn closed(&self) -> Option<&Candle> {
        match self {
            CandleEvent::Opened { closed, .. } => closed.as_ref(),
            _ => None,
        }
    }
}

/// Lifecycle of the current-candle slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorState {
    /// Ticks bucket normally.
    Live,
    /// Waiting for history at a new width; ticks are dropped.
    AwaitingSeed,
}

/// Fixed-width OHLCV aggregation with exactly one in-progress candle.
#[derive(Debug)]
pub struct CandleAggregator {
    timeframe: Timeframe,
    state: AggregatorState,
    closed: Vec<Candle>,
    current: Option<Candle>,
    max_candles: usize,
}

impl CandleAggregator {
    pub fn new(timeframe: Timeframe, max_candles: usize) -> Self {
        Self {
            timeframe,
            state: AggregatorState::Live,
            closed: Vec::new(),
            current: None,
            max_candles: max_candles.max(1),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// Closed, immutable candles in increasing time order.
    pub fn closed(&self) -> &[Candle] {
        &self.closed
    }

    /// The in-progress candle.
    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// Closed candles followed by the in-progress one, for charting.
    pub fn all_candles(&self) -> Vec<Candle> {
        let mut out = self.closed.clone();
        out.extend(self.current);
        out
    }

    pub fn last_candle_time(&self) -> Option<i64> {
        self.current
            .as_ref()
            .or_else(|| self.closed.last())
            .map(|c| c.time)
    }

    /// Feed one tick. Invalid or late ticks never touch a candle.
    pub fn push_tick(&mut self, tick: &Tick) -> CandleEvent {
        if let Err(e) = self.ensure_live(&tick.symbol) {
            trace!("{}", e);
            return CandleEvent::Dropped(DropReason::AwaitingSeed);
        }
        if let Err(e) = tick.validate() {
            debug!("{}", e);
            return CandleEvent::Dropped(DropReason::Invalid);
        }

        let bucket_time = self.timeframe.bucket_start(tick.timestamp_secs());

        if let Some(current) = self.current.as_mut() {
            if bucket_time == current.time {
                current.update(tick.price, tick.volume);
                return CandleEvent::Updated(*current);
            }
            if bucket_time < current.time {
                debug!(
                    "{}: late tick for bucket {} behind {}",
                    tick.symbol, bucket_time, current.time
                );
                return CandleEvent::Dropped(DropReason::Late);
            }
        } else if let Some(last) = self.closed.last() {
            if bucket_time <= last.time {
                return CandleEvent::Dropped(DropReason::Late);
            }
        }

        let current = Candle::from_price(bucket_time, tick.price, tick.volume);
        let closed = self.current.replace(current);
        if let Some(candle) = closed {
            self.closed.push(candle);
            self.trim();
        }
        CandleEvent::Opened { closed, current }
    }

    /// Error while a timeframe switch is waiting for history.
    pub fn ensure_live(&self, symbol: &str) -> Result<()> {
        match self.state {
            AggregatorState::Live => Ok(()),
            AggregatorState::AwaitingSeed => Err(EngineError::AwaitingSeed(format!(
                "{} at {}",
                symbol, self.timeframe
            ))),
        }
    }

    /// Install history. The newest bar becomes the current candle so later
    /// ticks merge into it rather than duplicating it. Bars sharing a bucket
    /// are merged into one candle.
    pub fn seed(&mut self, bars: Vec<Candle>) {
        let mut bars = merge_buckets(bars);

        let live = self.current.take();
        let last_bar_time = bars.last().map(|c| c.time);

        match live {
            // A live candle newer than the history survives the refresh, along
            // with the candles it closed after the last bar.
            Some(live) if last_bar_time.map_or(true, |last| live.time > last) => {
                bars.extend(
                    self.closed
                        .iter()
                        .filter(|c| last_bar_time.map_or(true, |last| c.time > last))
                        .copied(),
                );
                self.closed = bars;
                self.current = Some(live);
            }
            _ => {
                self.current = bars.pop();
                self.closed = bars;
            }
        }
        self.trim();

        if self.state == AggregatorState::AwaitingSeed {
            info!("Seeded {} history, resuming live bucketing", self.timeframe);
        }
        self.state = AggregatorState::Live;
    }

    /// Change bucket width. Discards all candles and waits for a reseed so no
    /// tick from the old width is spliced into the new one.
    pub fn switch_timeframe(&mut self, timeframe: Timeframe) {
        self.timeframe = timeframe;
        self.closed.clear();
        self.current = None;
        self.state = AggregatorState::AwaitingSeed;
    }

    fn trim(&mut self) {
        if self.closed.len() > self.max_candles {
            let excess = self.closed.len() - self.max_candles;
            self.closed.drain(..excess);
        }
    }
}

/// Sort by time and fold bars of the same bucket into one candle.
fn merge_buckets(mut bars: Vec<Candle>) -> Vec<Candle> {
    bars.sort_by_key(|c| c.time);
    let mut merged: Vec<Candle> = Vec::with_capacity(bars.len());
    for bar in bars {
        match merged.last_mut() {
            Some(last) if last.time == bar.time => {
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
                last.volume += bar.volume;
            }
            _ => merged.push(bar),
        }
    }
    merged
}

/// Minimal mutation surface a chart needs to follow the aggregator without
/// re-deriving the whole series each tick.
pub trait CandleSink: Send {
    fn append_candle(&mut self, candle: &Candle);

    fn update_last_candle(&mut self, candle: &Candle);

    fn last_candle_time(&self) -> Option<i64>;

    /// Replace the displayed series after a history (re)load.
    fn load_candles(&mut self, candles: &[Candle]) {
        for candle in candles {
            dispatch_candle(self, candle);
        }
    }
}

/// Route a candle to `append_candle` or `update_last_candle` depending on the
/// sink's last time. Older candles are ignored.
pub fn dispatch_candle<S: CandleSink + ?Sized>(sink: &mut S, candle: &Candle) {
    match sink.last_candle_time() {
        Some(last) if candle.time == last => sink.update_last_candle(candle),
        Some(last) if candle.time < last => {}
        _ => sink.append_candle(candle),
    }
}

/// In-memory candle buffer implementing [`CandleSink`].
#[derive(Debug, Default, Clone)]
pub struct ChartBuffer {
    candles: Vec<Candle>,
}

impl ChartBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn clear(&mut self) {
        self.candles.clear();
    }
}

impl CandleSink for ChartBuffer {
    fn append_candle(&mut self, candle: &Candle) {
        self.candles.push(*candle);
    }

    fn update_last_candle(&mut self, candle: &Candle) {
        match self.candles.last_mut() {
            Some(last) => *last = *candle,
            None => self.candles.push(*candle),
        }
    }

    fn last_candle_time(&self) -> Option<i64> {
        self.candles.last().map(|c| c.time)
    }

    fn load_candles(&mut self, candles: &[Candle]) {
        self.candles = candles.to_vec();
    }
}

//! Per-symbol engine state with an explicit lifecycle.

use crate::config::EngineConfig;
use crate::services::analysis::{Analysis, Analyzer, Context};
use crate::services::candles::{
    dispatch_candle, AggregatorState, CandleAggregator, CandleEvent, CandleSink, DropReason,
};
use crate::services::indicators::IndicatorSeries;
use crate::services::scorer::ConfluenceScorer;
use crate::types::{Candle, DirectionalBias, HistoricalBar, Tick, Timeframe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of routing one tick through a session.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub event: CandleEvent,
    /// Present when the tick closed a candle.
    pub analysis: Option<Analysis>,
}

/// Owns the candle series, higher-timeframe context and score history of one
/// symbol. Ticks are the only writer of the current-candle slot.
pub struct SymbolSession {
    symbol: String,
    aggregator: CandleAggregator,
    analyzer: Analyzer,
    scorer: ConfluenceScorer,
    daily: Vec<Candle>,
    weekly: Vec<Candle>,
    bias: Option<DirectionalBias>,
    sink: Option<Box<dyn CandleSink>>,
    last_analysis: Option<Analysis>,
}

impl SymbolSession {
    pub fn new(symbol: impl Into<String>, config: Arc<EngineConfig>) -> Self {
        let symbol = symbol.into();
        Self {
            aggregator: CandleAggregator::new(config.timeframe, config.max_candles),
            analyzer: Analyzer::from_config(&config),
            scorer: ConfluenceScorer::new(config.scoring.clone()),
            daily: Vec::new(),
            weekly: Vec::new(),
            bias: None,
            sink: None,
            last_analysis: None,
            symbol,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.aggregator.timeframe()
    }

    pub fn aggregator(&self) -> &CandleAggregator {
        &self.aggregator
    }

    pub fn scorer(&self) -> &ConfluenceScorer {
        &self.scorer
    }

    pub fn bias(&self) -> Option<DirectionalBias> {
        self.bias
    }

    pub fn last_analysis(&self) -> Option<&Analysis> {
        self.last_analysis.as_ref()
    }

    /// Indicator arrays aligned with the closed series.
    pub fn indicator_series(&self) -> IndicatorSeries {
        self.analyzer.indicator_series(self.aggregator.closed())
    }

    /// Attach a renderer. It is loaded with the current series immediately.
    pub fn attach_sink(&mut self, mut sink: Box<dyn CandleSink>) {
        sink.load_candles(&self.aggregator.all_candles());
        self.sink = Some(sink);
    }

    pub fn detach_sink(&mut self) -> Option<Box<dyn CandleSink>> {
        self.sink.take()
    }

    /// Route one tick. Scoring runs only when a bucket closes; in-progress
    /// updates go to the sink alone.
    pub fn on_tick(&mut self, tick: &Tick) -> TickOutcome {
        if !tick.symbol.eq_ignore_ascii_case(&self.symbol) {
            warn!("{} session received tick for {}", self.symbol, tick.symbol);
            return TickOutcome {
                event: CandleEvent::Dropped(DropReason::OtherSymbol),
                analysis: None,
            };
        }

        let event = self.aggregator.push_tick(tick);
        let analysis = match &event {
            CandleEvent::Updated(candle) => {
                self.emit(candle);
                None
            }
            CandleEvent::Opened { closed, current } => {
                if let Some(closed) = closed {
                    self.emit(closed);
                }
                self.emit(current);
                if closed.is_some() {
                    self.analyze()
                } else {
                    None
                }
            }
            CandleEvent::Dropped(_) => None,
        };

        TickOutcome { event, analysis }
    }

    /// Load intraday history at the session's timeframe. Malformed bars are
    /// skipped. Returns the analysis of the last closed candle.
    pub fn seed(&mut self, bars: &[HistoricalBar]) -> Option<Analysis> {
        let timeframe = self.aggregator.timeframe();
        let candles: Vec<Candle> = bars
            .iter()
            .filter_map(|b| match b.validate() {
                Ok(()) => b.normalize(timeframe),
                Err(e) => {
                    debug!("{}: {}", self.symbol, e);
                    None
                }
            })
            .collect();
        if candles.len() < bars.len() {
            warn!(
                "{}: skipped {} malformed bars of {}",
                self.symbol,
                bars.len() - candles.len(),
                bars.len()
            );
        }
        info!("{}: seeding {} {} candles", self.symbol, candles.len(), timeframe);

        self.aggregator.seed(candles);
        if let Some(sink) = self.sink.as_mut() {
            sink.load_candles(&self.aggregator.all_candles());
        }
        self.analyze()
    }

    /// Load daily and weekly bars for prior-session levels.
    pub fn seed_context(&mut self, daily: &[HistoricalBar], weekly: &[HistoricalBar]) {
        self.daily = normalize_sorted(daily);
        self.weekly = normalize_sorted(weekly);
        debug!(
            "{}: context {} daily, {} weekly bars",
            self.symbol,
            self.daily.len(),
            self.weekly.len()
        );
    }

    /// Change bucket width. Candles and score history are discarded; ticks are
    /// dropped until [`seed`](Self::seed) supplies history at the new width.
    pub fn switch_timeframe(&mut self, timeframe: Timeframe) {
        if timeframe == self.aggregator.timeframe()
            && self.aggregator.state() == AggregatorState::Live
        {
            return;
        }
        info!(
            "{}: timeframe {} -> {}, awaiting reseed",
            self.symbol,
            self.aggregator.timeframe(),
            timeframe
        );
        self.aggregator.switch_timeframe(timeframe);
        self.scorer.reset();
        self.last_analysis = None;
        if let Some(sink) = self.sink.as_mut() {
            sink.load_candles(&[]);
        }
    }

    pub fn set_bias(&mut self, bias: Option<DirectionalBias>) {
        self.bias = bias;
    }

    /// Analyse the closed series. Safe to repeat for the same candle; the
    /// score history is replaced, not advanced.
    pub fn analyze(&mut self) -> Option<Analysis> {
        let analysis = self.analyzer.analyze(
            &self.symbol,
            self.aggregator.timeframe(),
            self.aggregator.closed(),
            Context {
                daily: &self.daily,
                weekly: &self.weekly,
                bias: self.bias,
            },
            &mut self.scorer,
        )?;
        self.last_analysis = Some(analysis.clone());
        Some(analysis)
    }

    /// Forget score history. Candle series are kept.
    pub fn reset(&mut self) {
        debug!("{}: score history reset", self.symbol);
        self.scorer.reset();
        self.last_analysis = None;
    }

    /// End tracking of this symbol.
    pub fn dispose(mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.load_candles(&[]);
        }
        info!(
            "{}: disposed with {} closed candles",
            self.symbol,
            self.aggregator.closed().len()
        );
    }

    fn emit(&mut self, candle: &Candle) {
        if let Some(sink) = self.sink.as_mut() {
            dispatch_candle(sink.as_mut(), candle);
        }
    }
}

fn normalize_sorted(bars: &[HistoricalBar]) -> Vec<Candle> {
    let mut candles: Vec<Candle> = bars.iter().filter_map(HistoricalBar::to_candle).collect();
    candles.sort_by_key(|c| c.time);
    candles
}

//! Event loop that serialises all engine mutations.
//!
//! Collaborators push [`EngineEvent`]s on an mpsc channel; the engine handles
//! them one at a time and publishes [`EngineUpdate`]s on a broadcast channel.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::services::analysis::Analysis;
use crate::services::candles::{AggregatorState, CandleSink};
use crate::services::watchlist::Watchlist;
use crate::types::{Candle, DirectionalBias, HistoricalBar, Tick, Timeframe};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// Input from market-data and analytics collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Tick(Tick),
    /// Bar history for one symbol. `intraday` bars reseed the candle series;
    /// daily/weekly bars feed prior-session levels.
    History {
        symbol: String,
        #[serde(default)]
        intraday: Vec<HistoricalBar>,
        #[serde(default)]
        daily: Vec<HistoricalBar>,
        #[serde(default)]
        weekly: Vec<HistoricalBar>,
    },
    Focus {
        symbol: String,
    },
    Bias {
        symbol: String,
        bias: Option<DirectionalBias>,
    },
    /// Change the focused symbol's bucket width; a `History` event must follow.
    Timeframe {
        timeframe: Timeframe,
    },
    Unwatch {
        symbol: String,
    },
}

/// Output for renderers and alerting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineUpdate {
    CandleAppended { symbol: String, candle: Candle },
    CandleUpdated { symbol: String, candle: Candle },
    Analysis(Analysis),
}

/// Bar history for one symbol, as stored in a seed file keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySeed {
    #[serde(default)]
    pub intraday: Vec<HistoricalBar>,
    #[serde(default)]
    pub daily: Vec<HistoricalBar>,
    #[serde(default)]
    pub weekly: Vec<HistoricalBar>,
}

impl HistorySeed {
    pub fn into_event(self, symbol: impl Into<String>) -> EngineEvent {
        EngineEvent::History {
            symbol: symbol.into(),
            intraday: self.intraday,
            daily: self.daily,
            weekly: self.weekly,
        }
    }
}

/// Read a JSON object of `{symbol: HistorySeed}`.
pub async fn load_history_file(path: impl AsRef<Path>) -> Result<HashMap<String, HistorySeed>> {
    let raw = tokio::fs::read_to_string(path.as_ref()).await?;
    let seeds: HashMap<String, HistorySeed> = serde_json::from_str(&raw)?;
    debug!(
        "Read history for {} symbols from {}",
        seeds.len(),
        path.as_ref().display()
    );
    Ok(seeds)
}

/// Forwards candle mutations of the focused session to the update channel.
struct BroadcastSink {
    symbol: String,
    tx: broadcast::Sender<EngineUpdate>,
    last_time: Option<i64>,
}

impl CandleSink for BroadcastSink {
    fn append_candle(&mut self, candle: &Candle) {
        self.last_time = Some(candle.time);
        let _ = self.tx.send(EngineUpdate::CandleAppended {
            symbol: self.symbol.clone(),
            candle: *candle,
        });
    }

    fn update_last_candle(&mut self, candle: &Candle) {
        let _ = self.tx.send(EngineUpdate::CandleUpdated {
            symbol: self.symbol.clone(),
            candle: *candle,
        });
    }

    fn last_candle_time(&self) -> Option<i64> {
        self.last_time
    }

    fn load_candles(&mut self, candles: &[Candle]) {
        // Full reloads are published as appends from scratch.
        self.last_time = None;
        for candle in candles {
            self.append_candle(candle);
        }
    }
}

pub struct Engine {
    watchlist: Watchlist,
    updates: broadcast::Sender<EngineUpdate>,
}

impl Engine {
    pub fn new(config: Arc<EngineConfig>) -> (Self, broadcast::Receiver<EngineUpdate>) {
        let (updates, rx) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let engine = Self {
            watchlist: Watchlist::new(config),
            updates,
        };
        (engine, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineUpdate> {
        self.updates.subscribe()
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    /// Apply one event.
    pub fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Tick(tick) => {
                if let Some(outcome) = self.watchlist.route_tick(&tick) {
                    if let Some(analysis) = outcome.analysis {
                        self.publish(analysis);
                    }
                }
            }
            EngineEvent::History {
                symbol,
                intraday,
                daily,
                weekly,
            } => {
                let session = self.watchlist.watch(&symbol);
                if !daily.is_empty() || !weekly.is_empty() {
                    session.seed_context(&daily, &weekly);
                }
                // Context-only history keeps the live series unless a
                // timeframe switch is waiting for a reseed.
                let reseed = !intraday.is_empty()
                    || session.aggregator().state() == AggregatorState::AwaitingSeed;
                let analysis = if reseed {
                    session.seed(&intraday)
                } else {
                    session.analyze()
                };
                if let Some(analysis) = analysis {
                    self.publish(analysis);
                }
            }
            EngineEvent::Focus { symbol } => {
                if let Some(previous) = self.watchlist.focused().map(str::to_string) {
                    if let Some(session) = self.watchlist.session_mut(&previous) {
                        session.detach_sink();
                    }
                }
                let tx = self.updates.clone();
                let session = self.watchlist.focus(&symbol);
                session.attach_sink(Box::new(BroadcastSink {
                    symbol: session.symbol().to_string(),
                    tx,
                    last_time: None,
                }));
            }
            EngineEvent::Bias { symbol, bias } => {
                debug!("{}: bias {:?}", symbol, bias);
                self.watchlist.watch(&symbol).set_bias(bias);
            }
            EngineEvent::Timeframe { timeframe } => {
                let Some(focused) = self.watchlist.focused().map(str::to_string) else {
                    warn!("Timeframe change to {} with no focused symbol", timeframe);
                    return;
                };
                if let Some(session) = self.watchlist.session_mut(&focused) {
                    session.switch_timeframe(timeframe);
                }
            }
            EngineEvent::Unwatch { symbol } => {
                self.watchlist.unwatch(&symbol);
            }
        }
    }

    fn publish(&self, analysis: Analysis) {
        if let Some(score) = &analysis.score {
            debug!(
                "{}: {} ({:.1}) stable={}",
                analysis.symbol,
                score.grade,
                score.score,
                score.is_stable()
            );
        }
        let _ = self.updates.send(EngineUpdate::Analysis(analysis));
    }

    /// Process events until every sender is dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) {
        info!("Engine started");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        info!("Engine stopped, {} symbols tracked", self.watchlist.len());
    }

    /// Spawn the event loop on the tokio runtime.
    pub fn spawn(self, capacity: usize) -> (mpsc::Sender<EngineEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_717_421_400;

    fn bars(n: usize) -> Vec<HistoricalBar> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.1;
                HistoricalBar {
                    timestamp: T0 + i as i64 * 300,
                    open: base,
                    high: base + 0.2,
                    low: base - 0.1,
                    close: base + 0.1,
                    volume: Some(500.0),
                }
            })
            .collect()
    }

    fn drain(rx: &mut broadcast::Receiver<EngineUpdate>) -> Vec<EngineUpdate> {
        let mut out = Vec::new();
        while let Ok(update) = rx.try_recv() {
            out.push(update);
        }
        out
    }

    #[test]
    fn test_focused_symbol_streams_candles() {
        let (mut engine, mut rx) = Engine::new(Arc::new(EngineConfig::default()));
        engine.handle(EngineEvent::Focus {
            symbol: "SPY".to_string(),
        });
        engine.handle(HistorySeed {
            intraday: bars(30),
            ..HistorySeed::default()
        }
        .into_event("SPY"));

        let updates = drain(&mut rx);
        let appended = updates
            .iter()
            .filter(|u| matches!(u, EngineUpdate::CandleAppended { .. }))
            .count();
        assert_eq!(appended, 30);
        assert!(matches!(updates.last(), Some(EngineUpdate::Analysis(a)) if a.score.is_some()));

        engine.handle(EngineEvent::Tick(Tick::new("SPY", (T0 + 29 * 300 + 1) * 1000, 103.5, 1.0)));
        let updates = drain(&mut rx);
        assert!(matches!(
            updates.as_slice(),
            [EngineUpdate::CandleUpdated { candle, .. }] if candle.high == 103.5
        ));
    }

    #[test]
    fn test_unfocused_ticks_publish_nothing() {
        let (mut engine, mut rx) = Engine::new(Arc::new(EngineConfig::default()));
        engine.handle(EngineEvent::Focus {
            symbol: "SPY".to_string(),
        });
        drain(&mut rx);
        engine.handle(EngineEvent::Tick(Tick::new("QQQ", T0 * 1000, 380.0, 1.0)));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_timeframe_event_waits_for_history() {
        let (mut engine, mut rx) = Engine::new(Arc::new(EngineConfig::default()));
        engine.handle(EngineEvent::Focus {
            symbol: "SPY".to_string(),
        });
        engine.handle(EngineEvent::Timeframe {
            timeframe: Timeframe::OneMinute,
        });
        drain(&mut rx);

        engine.handle(EngineEvent::Tick(Tick::new("SPY", T0 * 1000, 100.0, 1.0)));
        assert!(drain(&mut rx).is_empty());

        engine.handle(HistorySeed::default().into_event("SPY"));
        engine.handle(EngineEvent::Tick(Tick::new("SPY", T0 * 1000, 100.0, 1.0)));
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [EngineUpdate::CandleAppended { .. }]
        ));
        assert_eq!(
            engine.watchlist().session("SPY").map(|s| s.timeframe()),
            Some(Timeframe::OneMinute)
        );
    }

    #[test]
    fn test_bias_event_reaches_session() {
        let (mut engine, _rx) = Engine::new(Arc::new(EngineConfig::default()));
        engine.handle(EngineEvent::Bias {
            symbol: "spy".to_string(),
            bias: Some(DirectionalBias::Positive),
        });
        assert_eq!(
            engine.watchlist().session("SPY").and_then(|s| s.bias()),
            Some(DirectionalBias::Positive)
        );

        engine.handle(EngineEvent::Bias {
            symbol: "SPY".to_string(),
            bias: None,
        });
        assert_eq!(engine.watchlist().session("SPY").and_then(|s| s.bias()), None);
    }

    #[test]
    fn test_load_history_file() {
        let path = std::env::temp_dir().join(format!("ltp-history-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"SPY":{"intraday":[{"timestamp":1717421400,"open":1,"high":2,"low":0.5,"close":1.5}]}}"#,
        )
        .unwrap();

        let seeds = tokio_test::block_on(load_history_file(&path)).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(seeds["SPY"].intraday.len(), 1);
        assert!(seeds["SPY"].daily.is_empty());

        let missing = tokio_test::block_on(load_history_file(&path));
        assert!(matches!(missing, Err(crate::error::EngineError::Io(_))));
    }
}

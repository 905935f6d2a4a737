//! Tracks watched symbols and which one is focused.

use crate::config::EngineConfig;
use crate::services::session::{SymbolSession, TickOutcome};
use crate::types::Tick;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, trace};

/// Canonical symbol key.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Sessions by symbol plus the focused symbol. Only the focused symbol
/// receives ticks; unfocused sessions keep their closed candles.
pub struct Watchlist {
    config: Arc<EngineConfig>,
    sessions: HashMap<String, SymbolSession>,
    focused: Option<String>,
}

impl Watchlist {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            focused: None,
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn session(&self, symbol: &str) -> Option<&SymbolSession> {
        self.sessions.get(&normalize_symbol(symbol))
    }

    pub fn session_mut(&mut self, symbol: &str) -> Option<&mut SymbolSession> {
        self.sessions.get_mut(&normalize_symbol(symbol))
    }

    /// Session for `symbol`, created on first use.
    pub fn watch(&mut self, symbol: &str) -> &mut SymbolSession {
        let key = normalize_symbol(symbol);
        let config = self.config.clone();
        self.sessions
            .entry(key.clone())
            .or_insert_with(|| SymbolSession::new(key, config))
    }

    /// Move focus to `symbol`. Score history of both the old and the new focus
    /// is reset; candle series are reused.
    pub fn focus(&mut self, symbol: &str) -> &mut SymbolSession {
        let key = normalize_symbol(symbol);

        if let Some(previous) = self.focused.take() {
            if previous != key {
                info!("Focus {} -> {}", previous, key);
            }
            if let Some(session) = self.sessions.get_mut(&previous) {
                session.reset();
            }
        } else {
            info!("Focus {}", key);
        }

        self.focused = Some(key.clone());
        let session = self.watch(&key);
        session.reset();
        session
    }

    /// Route a tick to the focused session. Ticks for other symbols are ignored.
    pub fn route_tick(&mut self, tick: &Tick) -> Option<TickOutcome> {
        let focused = self.focused.as_deref()?;
        if !tick.symbol.trim().eq_ignore_ascii_case(focused) {
            trace!("Ignoring tick for unfocused {}", tick.symbol);
            return None;
        }
        let key = focused.to_string();
        self.sessions.get_mut(&key).map(|s| s.on_tick(tick))
    }

    /// Stop tracking `symbol` and dispose of its session.
    pub fn unwatch(&mut self, symbol: &str) -> bool {
        let key = normalize_symbol(symbol);
        if self.focused.as_deref() == Some(key.as_str()) {
            self.focused = None;
        }
        match self.sessions.remove(&key) {
            Some(session) => {
                session.dispose();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HistoricalBar;

    const T0: i64 = 1_717_421_400;

    #[test]
    fn test_only_focused_symbol_receives_ticks() {
        let mut watchlist = Watchlist::new(Arc::new(EngineConfig::default()));
        watchlist.focus("spy");
        assert!(watchlist.route_tick(&Tick::new("SPY", T0 * 1000, 450.0, 1.0)).is_some());
        assert!(watchlist.route_tick(&Tick::new("QQQ", T0 * 1000, 380.0, 1.0)).is_none());

        watchlist.focus("QQQ");
        assert!(watchlist.route_tick(&Tick::new("SPY", T0 * 1000 + 1, 451.0, 1.0)).is_none());
        // SPY's series survives the focus change.
        assert_eq!(
            watchlist.session("SPY").unwrap().aggregator().current().map(|c| c.close),
            Some(450.0)
        );
    }

    #[test]
    fn test_focus_change_resets_score_history() {
        let mut watchlist = Watchlist::new(Arc::new(EngineConfig::default()));
        let bars: Vec<HistoricalBar> = (0..31)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.1;
                HistoricalBar {
                    timestamp: T0 + i * 300,
                    open: base,
                    high: base + 0.2,
                    low: base - 0.1,
                    close: base + 0.1,
                    volume: Some(1000.0),
                }
            })
            .collect();

        let spy = watchlist.focus("SPY");
        assert!(spy.seed(&bars[..30]).and_then(|a| a.score).is_some());
        assert!(spy.seed(&bars).and_then(|a| a.score).is_some());
        assert_eq!(spy.scorer().history().len(), 2);
        assert_eq!(spy.aggregator().closed().len(), 30);

        watchlist.focus("QQQ");
        let spy = watchlist.session("SPY").unwrap();
        assert!(spy.scorer().history().is_empty());
        assert!(spy.last_analysis().is_none());
        assert_eq!(spy.aggregator().closed().len(), 30);

        let spy = watchlist.focus("SPY");
        assert!(spy.scorer().history().is_empty());
        assert_eq!(spy.aggregator().closed().len(), 30);
        assert!(watchlist.session("QQQ").unwrap().scorer().history().is_empty());
    }

    #[test]
    fn test_unwatch_disposes() {
        let mut watchlist = Watchlist::new(Arc::new(EngineConfig::default()));
        watchlist.focus("SPY");
        assert!(watchlist.unwatch("spy"));
        assert!(watchlist.focused().is_none());
        assert!(watchlist.is_empty());
        assert!(!watchlist.unwatch("SPY"));
    }
}

pub mod analysis;
pub mod calendar;
pub mod candles;
pub mod engine;
pub mod indicators;
pub mod levels;
pub mod patience;
pub mod scorer;
pub mod session;
pub mod watchlist;

pub use analysis::{Analysis, Analyzer, Context};
pub use candles::{
    dispatch_candle, AggregatorState, CandleAggregator, CandleEvent, CandleSink, ChartBuffer,
    DropReason,
};
pub use engine::{load_history_file, Engine, EngineEvent, EngineUpdate, HistorySeed};
pub use indicators::{Indicator, IndicatorSeries, IndicatorSet};
pub use levels::{LevelInputs, LevelRegistry};
pub use patience::PatienceDetector;
pub use scorer::{ConfluenceScorer, ScoreHistory, ScoreInput, ScorerState, TrendReading};
pub use session::{SymbolSession, TickOutcome};
pub use watchlist::{normalize_symbol, Watchlist};

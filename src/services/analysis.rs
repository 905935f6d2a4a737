//! One analysis pass over a closed candle series.

use crate::config::EngineConfig;
use crate::services::indicators::{IndicatorSeries, IndicatorSet};
use crate::services::levels::{LevelInputs, LevelRegistry};
use crate::services::patience::PatienceDetector;
use crate::services::scorer::{ConfluenceScorer, ScoreInput};
use crate::types::{
    Candle, DirectionalBias, IndicatorSnapshot, KeyLevel, LtpScore, PatienceSignal, Timeframe,
};
use serde::{Deserialize, Serialize};

/// Everything the engine derives on a candle close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Bucket start of the last closed candle.
    pub candle_time: i64,
    pub price: f64,
    pub indicators: IndicatorSnapshot,
    pub levels: Vec<KeyLevel>,
    pub patience: PatienceSignal,
    /// `None` while there is not enough history to score.
    pub score: Option<LtpScore>,
}

/// Higher-timeframe context for level building.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context<'a> {
    pub daily: &'a [Candle],
    pub weekly: &'a [Candle],
    pub bias: Option<DirectionalBias>,
}

/// Stateless stages of the pipeline: indicators, levels, patience.
pub struct Analyzer {
    indicators: IndicatorSet,
    levels: LevelRegistry,
    patience: PatienceDetector,
}

impl Analyzer {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            indicators: IndicatorSet::from_config(config),
            levels: LevelRegistry::from_config(config),
            patience: PatienceDetector::new(config.patience_proximity_pct),
        }
    }

    pub fn indicator_series(&self, candles: &[Candle]) -> IndicatorSeries {
        self.indicators.series(candles)
    }

    /// Run the pipeline on `candles` and score the last one. `None` for an
    /// empty series.
    pub fn analyze(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
        context: Context<'_>,
        scorer: &mut ConfluenceScorer,
    ) -> Option<Analysis> {
        let last = candles.last()?;
        let as_of = last.time;

        let indicators = self.indicators.snapshot(candles, as_of);
        let levels = self.levels.build(&LevelInputs {
            daily: context.daily,
            weekly: context.weekly,
            intraday: candles,
            indicators: &indicators,
            current_price: last.close,
            as_of,
        });
        let patience = self.patience.detect(candles, &levels);

        let score = scorer.score(
            symbol,
            &ScoreInput {
                candles,
                indicators: &indicators,
                levels: &levels,
                patience,
                bias: context.bias,
            },
        );

        Some(Analysis {
            symbol: symbol.to_string(),
            timeframe,
            candle_time: last.time,
            price: last.close,
            indicators,
            levels,
            patience,
            score,
        })
    }
}

//! LTP (Level / Trend / Patience) confluence scoring with grade hysteresis.

use crate::config::ScoringConfig;
use crate::types::{
    nearest_level, Candle, Direction, DirectionalBias, Grade, IndicatorSnapshot, KeyLevel,
    LtpScore, PatienceSignal, ScoreComponents, Stability,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

/// Scorer lifecycle for the tracked symbol. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerState {
    NoData,
    Scoring,
}

/// Per-symbol grade memory: a `(grade, counter)` state machine plus a capped
/// window of recent scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreHistory {
    previous_grade: Option<Grade>,
    previous_scores: VecDeque<f64>,
    candles_at_grade: u32,
    /// Candle the latest transition was applied for.
    last_candle_time: Option<i64>,
    /// `(grade, counter)` before the latest transition, so a re-score of the
    /// same candle replaces it instead of advancing the counter.
    checkpoint: (Option<Grade>, u32),
    capacity: usize,
}

impl ScoreHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            previous_grade: None,
            previous_scores: VecDeque::with_capacity(capacity.max(1)),
            candles_at_grade: 0,
            last_candle_time: None,
            checkpoint: (None, 0),
            capacity: capacity.max(1),
        }
    }

    pub fn previous_grade(&self) -> Option<Grade> {
        self.previous_grade
    }

    pub fn candles_at_grade(&self) -> u32 {
        self.candles_at_grade
    }

    /// Candle the latest transition was applied for.
    pub fn last_candle_time(&self) -> Option<i64> {
        self.last_candle_time
    }

    /// Recent scores, oldest first.
    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.previous_scores.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.previous_scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous_scores.is_empty()
    }

    /// Apply the grade for the candle at `candle_time`.
    pub fn transition(
        &mut self,
        candle_time: i64,
        grade: Grade,
        score: f64,
        stable_after: u32,
    ) -> Stability {
        match self.last_candle_time {
            Some(last) if candle_time < last => {
                return self.stability(stable_after);
            }
            Some(last) if candle_time == last => {
                (self.previous_grade, self.candles_at_grade) = self.checkpoint;
                self.previous_scores.pop_back();
            }
            _ => {}
        }

        self.checkpoint = (self.previous_grade, self.candles_at_grade);
        self.candles_at_grade = if self.previous_grade == Some(grade) {
            self.candles_at_grade + 1
        } else {
            1
        };
        self.previous_grade = Some(grade);

        self.previous_scores.push_back(score);
        while self.previous_scores.len() > self.capacity {
            self.previous_scores.pop_front();
        }
        self.last_candle_time = Some(candle_time);

        self.stability(stable_after)
    }

    pub fn stability(&self, stable_after: u32) -> Stability {
        Stability {
            candles_at_grade: self.candles_at_grade,
            stable: self.previous_grade.is_some() && self.candles_at_grade >= stable_after,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.capacity);
    }
}

/// Inputs for one scoring pass.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    /// Closed candles, oldest first; the last one is being scored.
    pub candles: &'a [Candle],
    pub indicators: &'a IndicatorSnapshot,
    pub levels: &'a [KeyLevel],
    pub patience: PatienceSignal,
    pub bias: Option<DirectionalBias>,
}

/// Directional reading from the trend inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendReading {
    /// 0-100 strength of agreement.
    pub score: f64,
    pub direction: Option<Direction>,
}

/// Stateful scorer for one symbol.
pub struct ConfluenceScorer {
    config: ScoringConfig,
    symbol: Option<String>,
    history: ScoreHistory,
    state: ScorerState,
}

impl ConfluenceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        let history = ScoreHistory::new(config.history_len);
        Self {
            config,
            symbol: None,
            history,
            state: ScorerState::NoData,
        }
    }

    pub fn state(&self) -> ScorerState {
        self.state
    }

    pub fn history(&self) -> &ScoreHistory {
        &self.history
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    /// Discard all grade memory.
    pub fn reset(&mut self) {
        self.history.reset();
        self.state = ScorerState::NoData;
    }

    /// Score the last candle of `input.candles` for `symbol`.
    ///
    /// Returns `None` when there are too few candles to seed the indicators;
    /// that is "no score", not a bad setup. Switching symbols resets the
    /// history before scoring.
    pub fn score(&mut self, symbol: &str, input: &ScoreInput<'_>) -> Option<LtpScore> {
        if self.symbol.as_deref() != Some(symbol) {
            if let Some(previous) = self.symbol.as_deref() {
                info!("Scorer switching {} -> {}, resetting history", previous, symbol);
            }
            self.reset();
            self.symbol = Some(symbol.to_string());
        }

        if input.candles.len() < self.config.min_candles {
            debug!(
                "{}: {} candles, need {} to score",
                symbol,
                input.candles.len(),
                self.config.min_candles
            );
            return None;
        }
        let last = input.candles.last()?;
        if self.history.last_candle_time().is_some_and(|t| last.time < t) {
            debug!(
                "{}: candle {} is older than last scored {:?}, not scoring",
                symbol,
                last.time,
                self.history.last_candle_time()
            );
            return None;
        }
        let price = last.close;

        let level = self.level_score(input.levels, price);
        let trend = self.trend_reading(input.indicators, price, input.bias)?;
        let patience = self.patience_score(&input.patience, trend.direction);

        let cfg = &self.config;
        let total_weight = cfg.level_weight + cfg.trend_weight + cfg.patience_weight;
        let overall = if total_weight > 0.0 {
            (level * cfg.level_weight + trend.score * cfg.trend_weight + patience * cfg.patience_weight)
                / total_weight
        } else {
            0.0
        };
        let overall = (overall.clamp(0.0, 100.0) * 10.0).round() / 10.0;
        let grade = cfg.grades.grade(overall);

        let before = self.history.previous_grade();
        let stability = self
            .history
            .transition(last.time, grade, overall, cfg.stable_after);
        if before != Some(grade) {
            debug!("{}: grade {:?} -> {} at {}", symbol, before, grade, last.time);
        }
        self.state = ScorerState::Scoring;

        Some(LtpScore {
            symbol: symbol.to_string(),
            candle_time: last.time,
            score: overall,
            grade,
            components: ScoreComponents {
                level,
                trend: trend.score,
                patience,
                trend_direction: trend.direction,
            },
            patience: input.patience,
            stability,
        })
    }

    /// 100 inside the inner band, 0 beyond the outer band, linear between.
    pub fn level_score(&self, levels: &[KeyLevel], price: f64) -> f64 {
        let Some(nearest) = nearest_level(levels, price) else {
            return 0.0;
        };
        if price <= 0.0 {
            return 0.0;
        }
        let distance_pct = (price - nearest.price).abs() / price * 100.0;
        let inner = self.config.level_inner_pct;
        let outer = self.config.level_outer_pct.max(inner);

        if distance_pct <= inner {
            100.0
        } else if distance_pct >= outer {
            0.0
        } else {
            100.0 * (outer - distance_pct) / (outer - inner)
        }
    }

    /// Weighted average of the EMA-order, price-vs-VWAP and external-bias votes.
    /// A neutral or absent bias abstains. `None` if the EMAs are not available.
    pub fn trend_reading(
        &self,
        indicators: &IndicatorSnapshot,
        price: f64,
        bias: Option<DirectionalBias>,
    ) -> Option<TrendReading> {
        let cfg = &self.config;
        let (short, long) = (indicators.ema_short?, indicators.ema_long?);
        if price <= 0.0 {
            return None;
        }

        let mut weighted = 0.0;
        let mut total = 0.0;

        let spread_pct = (short - long) / price * 100.0;
        weighted += normalize_vote(spread_pct, cfg.ema_full_spread_pct) * cfg.ema_vote_weight;
        total += cfg.ema_vote_weight;

        if let Some(vwap) = indicators.vwap() {
            let distance_pct = (price - vwap) / price * 100.0;
            weighted +=
                normalize_vote(distance_pct, cfg.vwap_full_distance_pct) * cfg.vwap_vote_weight;
            total += cfg.vwap_vote_weight;
        }

        if let Some(vote) = bias.and_then(|b| b.vote()) {
            weighted += vote * cfg.bias_vote_weight;
            total += cfg.bias_vote_weight;
        }

        let average = if total > 0.0 { weighted / total } else { 0.0 };
        let direction = if average.abs() < cfg.trend_neutral_band {
            None
        } else if average > 0.0 {
            Some(Direction::Bullish)
        } else {
            Some(Direction::Bearish)
        };

        Some(TrendReading {
            score: (average.abs() * 100.0).min(100.0),
            direction,
        })
    }

    /// Full marks when the patience candle agrees with the trend, partial when
    /// it fired against or without one, zero when it did not fire.
    pub fn patience_score(&self, patience: &PatienceSignal, trend: Option<Direction>) -> f64 {
        if !patience.detected {
            return 0.0;
        }
        match (patience.direction, trend) {
            (Some(p), Some(t)) if p == t => 100.0,
            _ => self.config.patience_partial,
        }
    }
}

/// Scale a signed percentage to a vote in [-1, 1].
fn normalize_vote(value_pct: f64, full_pct: f64) -> f64 {
    if !value_pct.is_finite() {
        return 0.0;
    }
    if full_pct <= 0.0 {
        return value_pct.signum();
    }
    (value_pct / full_pct).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LevelType;

    #[test]
    fn test_hysteresis_sequence() {
        let mut history = ScoreHistory::new(10);
        let grades = [Grade::B, Grade::A, Grade::B, Grade::A, Grade::A, Grade::A];
        let stable: Vec<bool> = grades
            .iter()
            .enumerate()
            .map(|(i, g)| history.transition(i as i64 * 300, *g, 85.0, 2).stable)
            .collect();
        assert_eq!(stable, vec![false, false, false, false, true, true]);
        assert_eq!(history.candles_at_grade(), 3);
    }

    #[test]
    fn test_rescore_same_candle_does_not_advance() {
        let mut history = ScoreHistory::new(10);
        history.transition(0, Grade::A, 91.0, 2);
        history.transition(300, Grade::A, 92.0, 2);
        let again = history.transition(300, Grade::A, 93.0, 2);
        assert_eq!(again.candles_at_grade, 2);
        assert_eq!(history.len(), 2);

        let flipped = history.transition(300, Grade::B, 85.0, 2);
        assert_eq!(flipped.candles_at_grade, 1);
        assert!(!flipped.stable);
        assert_eq!(history.scores().collect::<Vec<_>>(), vec![91.0, 85.0]);
    }

    #[test]
    fn test_window_capped() {
        let mut history = ScoreHistory::new(10);
        for i in 0..15 {
            history.transition(i * 60, Grade::C, i as f64, 2);
        }
        assert_eq!(history.len(), 10);
        assert_eq!(history.scores().next(), Some(5.0));
    }

    #[test]
    fn test_level_score_bands() {
        let scorer = ConfluenceScorer::new(ScoringConfig::default());
        let levels = vec![KeyLevel::new(LevelType::Vwap, 100.0)];
        assert_eq!(scorer.level_score(&levels, 100.05), 100.0);
        assert_eq!(scorer.level_score(&levels, 102.0), 0.0);
        let mid = scorer.level_score(&levels, 100.55);
        assert!(mid > 0.0 && mid < 100.0);
        assert_eq!(scorer.level_score(&[], 100.0), 0.0);
    }

    #[test]
    fn test_bias_dominates_weak_internal_signals() {
        let scorer = ConfluenceScorer::new(ScoringConfig::default());
        // Both internal votes mildly bearish.
        let indicators = IndicatorSnapshot {
            ema_short: Some(99.9),
            ema_long: Some(100.0),
            vwap: 100.1,
            sma_long: None,
            orb: None,
        };
        let reading = scorer
            .trend_reading(&indicators, 100.0, Some(DirectionalBias::Positive))
            .unwrap();
        assert_eq!(reading.direction, Some(Direction::Bullish));

        let without = scorer.trend_reading(&indicators, 100.0, None).unwrap();
        assert_eq!(without.direction, Some(Direction::Bearish));
    }

    #[test]
    fn test_patience_score() {
        let scorer = ConfluenceScorer::new(ScoringConfig::default());
        let bull = PatienceSignal::fired(Direction::Bullish);
        assert_eq!(scorer.patience_score(&bull, Some(Direction::Bullish)), 100.0);
        assert_eq!(scorer.patience_score(&bull, Some(Direction::Bearish)), 50.0);
        assert_eq!(scorer.patience_score(&bull, None), 50.0);
        assert_eq!(scorer.patience_score(&PatienceSignal::none(), Some(Direction::Bullish)), 0.0);
    }

    #[test]
    fn test_older_candle_is_not_scored() {
        let mut scorer = ConfluenceScorer::new(ScoringConfig::default());
        let candles: Vec<Candle> = (0..25)
            .map(|i| Candle::from_price(i * 300, 100.0 + i as f64 * 0.1, 1.0))
            .collect();
        let indicators = IndicatorSnapshot {
            ema_short: Some(102.0),
            ema_long: Some(101.0),
            vwap: 101.5,
            sma_long: None,
            orb: None,
        };
        let input = |n: usize| ScoreInput {
            candles: &candles[..n],
            indicators: &indicators,
            levels: &[],
            patience: PatienceSignal::none(),
            bias: None,
        };

        assert!(scorer.score("SPY", &input(24)).is_some());
        assert!(scorer.score("SPY", &input(25)).is_some());
        let before = scorer.history().clone();

        assert!(scorer.score("SPY", &input(23)).is_none());
        assert_eq!(scorer.history(), &before);
        assert_eq!(scorer.history().last_candle_time(), Some(24 * 300));
    }

    #[test]
    fn test_insufficient_candles_is_no_score() {
        let mut scorer = ConfluenceScorer::new(ScoringConfig::default());
        let candles: Vec<Candle> = (0..20).map(|i| Candle::from_price(i * 300, 100.0, 1.0)).collect();
        let indicators = IndicatorSnapshot::default();
        let input = ScoreInput {
            candles: &candles,
            indicators: &indicators,
            levels: &[],
            patience: PatienceSignal::none(),
            bias: None,
        };
        assert!(scorer.score("SPY", &input).is_none());
        assert_eq!(scorer.state(), ScorerState::NoData);
        assert!(scorer.history().is_empty());
    }
}

use serde::{Deserialize, Serialize};

/// Direction of a setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Bullish,
    Bearish,
}


/// External directional regime, e.g. dealer gamma positioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DirectionalBias {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl DirectionalBias {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "positive" | "bullish" | "long" => Some(Self::Positive),
            "negative" | "bearish" | "short" => Some(Self::Negative),
            "neutral" | "none" => Some(Self::Neutral),
            _ => None,
        }
    }

    /// Directional vote, `None` when the regime expresses no opinion.
    pub fn vote(&self) -> Option<f64> {
        match self {
            Self::Positive => Some(1.0),
            Self::Negative => Some(-1.0),
            Self::Neutral => None,
        }
    }
}

/// Result of patience-candle detection on the latest closed candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PatienceSignal {
    pub detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl PatienceSignal {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn fired(direction: Direction) -> Self {
        Self {
            detected: true,
            direction: Some(direction),
        }
    }
}

/// Letter grade of an LTP score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            "D" => Some(Grade::D),
            "F" => Some(Grade::F),
            _ => None,
        }
    }

    /// True if `self` is the same or a better grade than `other`.
    pub fn at_least(&self, other: Grade) -> bool {
        *self <= other
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-factor sub-scores, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponents {
    pub level: f64,
    pub trend: f64,
    pub patience: f64,
    /// Sign of the trend reading, if it leaned either way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_direction: Option<Direction>,
}

/// Grade persistence reported alongside a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stability {
    pub candles_at_grade: u32,
    pub stable: bool,
}

/// LTP confluence score for one closed candle. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtpScore {
    pub symbol: String,
    /// Bucket start of the candle this score was computed on.
    pub candle_time: i64,
    pub score: f64,
    pub grade: Grade,
    pub components: ScoreComponents,
    pub patience: PatienceSignal,
    pub stability: Stability,
}

impl LtpScore {
    /// Alerts and voice prompts must gate on this, never on the raw grade.
    pub fn is_stable(&self) -> bool {
        self.stability.stable
    }
}

/// Opening-range bounds for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningRange {
    pub high: f64,
    pub low: f64,
    /// Candles seen so far inside the window.
    pub candles: usize,
    /// True once the full window has elapsed.
    pub complete: bool,
}

/// Latest indicator values at the end of a candle series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    /// Session VWAP; 0 means unavailable.
    pub vwap: f64,
    pub sma_long: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orb: Option<OpeningRange>,
}

impl IndicatorSnapshot {
    pub fn vwap(&self) -> Option<f64> {
        (self.vwap > 0.0).then_some(self.vwap)
    }
}

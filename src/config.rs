use crate::error::{EngineError, Result};
use crate::types::{Grade, Timeframe};
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::env;
use std::str::FromStr;
use tracing::warn;

/// Letter-grade cut points, best grade first.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeTable {
    /// `(minimum score, grade)` pairs, sorted by descending minimum.
    cuts: Vec<(f64, Grade)>,
    /// Grade for scores below every cut.
    floor: Grade,
}

impl Default for GradeTable {
    fn default() -> Self {
        Self {
            cuts: vec![
                (90.0, Grade::A),
                (80.0, Grade::B),
                (70.0, Grade::C),
                (60.0, Grade::D),
            ],
            floor: Grade::F,
        }
    }
}

impl GradeTable {
    pub fn new(mut cuts: Vec<(f64, Grade)>, floor: Grade) -> Self {
        cuts.sort_by(|a, b| b.0.total_cmp(&a.0));
        Self { cuts, floor }
    }

    /// Parse `A:90,B:80,C:70,D:60` style tables. Unlisted scores map to F.
    pub fn parse(s: &str) -> Result<Self> {
        let mut cuts = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (grade, min) = part
                .split_once(':')
                .ok_or_else(|| EngineError::InvalidConfig(format!("grade cut '{}'", part)))?;
            let grade = Grade::from_str(grade)
                .ok_or_else(|| EngineError::InvalidConfig(format!("grade '{}'", grade)))?;
            let min: f64 = min
                .trim()
                .parse()
                .map_err(|_| EngineError::InvalidConfig(format!("grade minimum '{}'", min)))?;
            cuts.push((min, grade));
        }
        if cuts.is_empty() {
            return Err(EngineError::InvalidConfig("empty grade table".to_string()));
        }
        Ok(Self::new(cuts, Grade::F))
    }

    pub fn grade(&self, score: f64) -> Grade {
        self.cuts
            .iter()
            .find(|(min, _)| score >= *min)
            .map(|(_, grade)| *grade)
            .unwrap_or(self.floor)
    }
}

/// Tuned constants for the confluence scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Overall weights for the Level, Trend and Patience sub-scores.
    pub level_weight: f64,
    pub trend_weight: f64,
    pub patience_weight: f64,
    /// Distance (percent of price) at or inside which the level sub-score is 100.
    pub level_inner_pct: f64,
    /// Distance (percent of price) at or beyond which the level sub-score is 0.
    pub level_outer_pct: f64,
    /// Trend input weights. The external bias outweighs either internal signal.
    pub ema_vote_weight: f64,
    pub vwap_vote_weight: f64,
    pub bias_vote_weight: f64,
    /// EMA spread (percent of price) that counts as a full-strength vote.
    pub ema_full_spread_pct: f64,
    /// Price-vs-VWAP distance (percent of price) that counts as a full-strength vote.
    pub vwap_full_distance_pct: f64,
    /// Trend readings weaker than this have no direction.
    pub trend_neutral_band: f64,
    /// Patience sub-score when the candle fired against or without a trend.
    pub patience_partial: f64,
    /// Candles required before any score is produced.
    pub min_candles: usize,
    /// Consecutive candles at one grade before it is reported stable.
    pub stable_after: u32,
    /// Rolling score window length.
    pub history_len: usize,
    pub grades: GradeTable,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            level_weight: 0.35,
            trend_weight: 0.35,
            patience_weight: 0.30,
            level_inner_pct: 0.10,
            level_outer_pct: 1.00,
            ema_vote_weight: 1.0,
            vwap_vote_weight: 1.0,
            bias_vote_weight: 2.5,
            ema_full_spread_pct: 0.20,
            vwap_full_distance_pct: 0.30,
            trend_neutral_band: 0.05,
            patience_partial: 50.0,
            min_candles: 21,
            stable_after: 2,
            history_len: 10,
            grades: GradeTable::default(),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Candle width for the live chart.
    pub timeframe: Timeframe,
    /// Exchange-local calendar used for session boundaries.
    pub session_tz: Tz,
    /// Regular-session open in exchange-local time.
    pub session_open: NaiveTime,
    /// Opening-range window in minutes.
    pub orb_minutes: u32,
    pub ema_short: usize,
    pub ema_long: usize,
    pub sma_long: usize,
    /// Closed candles retained per symbol.
    pub max_candles: usize,
    /// Patience midpoint proximity band, percent of price.
    pub patience_proximity_pct: f64,
    /// Tolerance (percent of price) under which two level candidates are the same price.
    pub level_merge_pct: f64,
    /// Swing-pivot lookback on each side for support/resistance.
    pub pivot_lookback: usize,
    pub scoring: ScoringConfig,
    /// Optional seed history for the binary.
    pub history_file: Option<String>,
    /// Symbol focused at start-up.
    pub initial_symbol: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::FiveMinute,
            session_tz: chrono_tz::America::New_York,
            session_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            orb_minutes: 15,
            ema_short: 9,
            ema_long: 21,
            sma_long: 200,
            max_candles: 2000,
            patience_proximity_pct: 0.15,
            level_merge_pct: 0.02,
            pivot_lookback: 2,
            scoring: ScoringConfig::default(),
            history_file: None,
            initial_symbol: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeframe = env::var("LTP_TIMEFRAME")
            .ok()
            .and_then(|v| match Timeframe::parse(&v) {
                Ok(tf) => Some(tf),
                Err(e) => {
                    warn!("{}, using {}", e, defaults.timeframe);
                    None
                }
            })
            .unwrap_or(defaults.timeframe);

        let session_tz = env::var("LTP_SESSION_TZ")
            .ok()
            .and_then(|v| match parse_timezone(&v) {
                Ok(tz) => Some(tz),
                Err(e) => {
                    warn!("{}, using {}", e, defaults.session_tz.name());
                    None
                }
            })
            .unwrap_or(defaults.session_tz);

        let session_open = env::var("LTP_SESSION_OPEN")
            .ok()
            .and_then(|v| match NaiveTime::parse_from_str(&v, "%H:%M") {
                Ok(t) => Some(t),
                Err(_) => {
                    warn!("Invalid LTP_SESSION_OPEN '{}', using {}", v, defaults.session_open);
                    None
                }
            })
            .unwrap_or(defaults.session_open);

        let mut scoring = ScoringConfig {
            stable_after: env_or("LTP_STABLE_AFTER", defaults.scoring.stable_after),
            ..ScoringConfig::default()
        };
        if let Ok(table) = env::var("LTP_GRADE_TABLE") {
            match GradeTable::parse(&table) {
                Ok(grades) => scoring.grades = grades,
                Err(e) => warn!("{}, using default grade table", e),
            }
        }

        let ema_short = env_or("LTP_EMA_SHORT", defaults.ema_short).max(1);
        let ema_long = env_or("LTP_EMA_LONG", defaults.ema_long).max(1);
        scoring.min_candles = ema_short.max(ema_long);

        Self {
            timeframe,
            session_tz,
            session_open,
            orb_minutes: env_or("LTP_ORB_MINUTES", defaults.orb_minutes),
            ema_short,
            ema_long,
            sma_long: env_or("LTP_SMA_LONG", defaults.sma_long).max(1),
            max_candles: env_or("LTP_MAX_CANDLES", defaults.max_candles).max(2),
            patience_proximity_pct: env_or(
                "LTP_PATIENCE_PROXIMITY_PCT",
                defaults.patience_proximity_pct,
            ),
            level_merge_pct: defaults.level_merge_pct,
            pivot_lookback: defaults.pivot_lookback,
            scoring,
            history_file: env::var("LTP_HISTORY_FILE").ok().filter(|s| !s.is_empty()),
            initial_symbol: env::var("LTP_SYMBOL")
                .ok()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty()),
        }
    }

    /// Number of candles in the opening range for the active timeframe.
    pub fn orb_candles(&self) -> usize {
        let window = self.orb_minutes as i64 * 60;
        let width = self.timeframe.seconds();
        ((window + width - 1) / width).max(1) as usize
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    Tz::from_str(name.trim()).map_err(|_| EngineError::UnknownTimezone(name.to_string()))
}

fn env_or<T: FromStr + std::fmt::Display + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {} '{}', using {}", key, v, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grade_table() {
        let table = GradeTable::default();
        assert_eq!(table.grade(95.0), Grade::A);
        assert_eq!(table.grade(90.0), Grade::A);
        assert_eq!(table.grade(89.9), Grade::B);
        assert_eq!(table.grade(72.0), Grade::C);
        assert_eq!(table.grade(60.0), Grade::D);
        assert_eq!(table.grade(12.0), Grade::F);
    }

    #[test]
    fn test_parse_grade_table() {
        let table = GradeTable::parse("B:75, A:85").unwrap();
        assert_eq!(table.grade(86.0), Grade::A);
        assert_eq!(table.grade(80.0), Grade::B);
        assert_eq!(table.grade(74.0), Grade::F);
        assert!(GradeTable::parse("Z:10").is_err());
        assert!(GradeTable::parse("").is_err());
    }

    #[test]
    fn test_orb_candles_rounds_up() {
        let mut config = EngineConfig::default();
        assert_eq!(config.orb_candles(), 3);
        config.timeframe = Timeframe::TwoMinute;
        assert_eq!(config.orb_candles(), 8);
        config.timeframe = Timeframe::OneHour;
        assert_eq!(config.orb_candles(), 1);
    }

    #[test]
    fn test_parse_timezone() {
        assert!(parse_timezone("America/Chicago").is_ok());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}

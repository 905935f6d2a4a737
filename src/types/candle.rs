use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Millisecond timestamps are at least this large; anything smaller is seconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Candle bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "2m")]
    TwoMinute,
    #[default]
    #[serde(rename = "5m")]
    FiveMinute,
    #[serde(rename = "15m")]
    FifteenMinute,
    #[serde(rename = "30m")]
    ThirtyMinute,
    #[serde(rename = "1h")]
    OneHour,
}

impl Timeframe {
    /// Get the timeframe from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Timeframe::OneMinute),
            "2m" => Some(Timeframe::TwoMinute),
            "5m" => Some(Timeframe::FiveMinute),
            "15m" => Some(Timeframe::FifteenMinute),
            "30m" => Some(Timeframe::ThirtyMinute),
            "1h" => Some(Timeframe::OneHour),
            _ => None,
        }
    }

    /// Parse a timeframe, reporting unknown labels as an error.
    pub fn parse(s: &str) -> Result<Self> {
        Self::from_str(s).ok_or_else(|| EngineError::UnknownTimeframe(s.to_string()))
    }

    /// Get the bucket size in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Timeframe::OneMinute => 60,
            Timeframe::TwoMinute => 120,
            Timeframe::FiveMinute => 300,
            Timeframe::FifteenMinute => 900,
            Timeframe::ThirtyMinute => 1800,
            Timeframe::OneHour => 3600,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::TwoMinute => "2m",
            Timeframe::FiveMinute => "5m",
            Timeframe::FifteenMinute => "15m",
            Timeframe::ThirtyMinute => "30m",
            Timeframe::OneHour => "1h",
        }
    }

    /// Start of the bucket containing `time` (epoch seconds).
    pub fn bucket_start(&self, time: i64) -> i64 {
        time.div_euclid(self.seconds()) * self.seconds()
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single trade/quote print from the market-data feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub symbol: String,
    pub timestamp_ms: i64,
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, timestamp_ms: i64, price: f64, volume: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp_ms,
            price,
            volume,
        }
    }

    /// Reject ticks that would corrupt a candle.
    pub fn validate(&self) -> Result<()> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(EngineError::InvalidTick(format!(
                "{}: price {} is not a positive finite number",
                self.symbol, self.price
            )));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(EngineError::InvalidTick(format!(
                "{}: volume {} is not a non-negative finite number",
                self.symbol, self.volume
            )));
        }
        Ok(())
    }

    /// Tick time in whole epoch seconds.
    pub fn timestamp_secs(&self) -> i64 {
        self.timestamp_ms.div_euclid(1000)
    }
}

/// OHLCV candle. `time` is always the bucket start in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Open a new candle from its first print.
    pub fn from_price(time: i64, price: f64, volume: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    /// Merge a same-bucket print.
    pub fn update(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
    }

    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// High strictly below and low strictly above `prev`.
    pub fn is_inside(&self, prev: &Candle) -> bool {
        self.high < prev.high && self.low > prev.low
    }
}

/// A bar as delivered by the historical-data collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    /// Seconds or milliseconds since the epoch.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl HistoricalBar {
    /// Timestamp in whole seconds, whichever unit the source used.
    pub fn timestamp_secs(&self) -> i64 {
        if self.timestamp.abs() >= MILLIS_THRESHOLD {
            self.timestamp.div_euclid(1000)
        } else {
            self.timestamp
        }
    }

    /// Every price must be a positive finite number.
    pub fn validate(&self) -> Result<()> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(EngineError::InvalidBar(format!(
                "bar at {}: OHLC {}/{}/{}/{}",
                self.timestamp, self.open, self.high, self.low, self.close
            )));
        }
        Ok(())
    }

    /// Convert to a bucket-aligned candle, or `None` if any price is unusable.
    pub fn normalize(&self, timeframe: Timeframe) -> Option<Candle> {
        let mut candle = self.to_candle()?;
        candle.time = timeframe.bucket_start(candle.time);
        Some(candle)
    }

    /// Same as [`normalize`](Self::normalize) but keeps the raw second timestamp,
    /// for daily/weekly bars that are not bucketed by the intraday timeframe.
    /// High and low are widened to contain open and close.
    pub fn to_candle(&self) -> Option<Candle> {
        self.validate().ok()?;
        Some(Candle {
            time: self.timestamp_secs(),
            open: self.open,
            high: self.high.max(self.open).max(self.close),
            low: self.low.min(self.open).min(self.close),
            close: self.close,
            volume: self.volume.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0),
        })
    }
}

//! Unit tests for types module

use ltp_engine::services::EngineEvent;
use ltp_engine::types::*;

#[test]
fn test_timeframe_from_str() {
    assert_eq!(Timeframe::from_str("1m"), Some(Timeframe::OneMinute));
    assert_eq!(Timeframe::from_str("5m"), Some(Timeframe::FiveMinute));
    assert_eq!(Timeframe::from_str("1h"), Some(Timeframe::OneHour));
    assert_eq!(Timeframe::from_str("3m"), None);
    assert!(Timeframe::parse("weekly").is_err());
}

#[test]
fn test_timeframe_bucket_start() {
    let tf = Timeframe::FiveMinute;
    assert_eq!(tf.seconds(), 300);
    assert_eq!(tf.bucket_start(1_717_421_400), 1_717_421_400);
    assert_eq!(tf.bucket_start(1_717_421_699), 1_717_421_400);
    assert_eq!(tf.bucket_start(1_717_421_700), 1_717_421_700);
    assert_eq!(tf.bucket_start(-1), -300);
}

#[test]
fn test_timeframe_serialization() {
    assert_eq!(serde_json::to_string(&Timeframe::FifteenMinute).unwrap(), "\"15m\"");
    let parsed: Timeframe = serde_json::from_str("\"1h\"").unwrap();
    assert_eq!(parsed, Timeframe::OneHour);
    assert_eq!(format!("{}", Timeframe::TwoMinute), "2m");
}

#[test]
fn test_tick_deserialize_defaults_volume() {
    let tick: Tick =
        serde_json::from_str(r#"{"symbol":"SPY","timestampMs":1717421400000,"price":450.25}"#)
            .unwrap();
    assert_eq!(tick.volume, 0.0);
    assert_eq!(tick.timestamp_secs(), 1_717_421_400);
    assert!(tick.validate().is_ok());
}

#[test]
fn test_tick_validation() {
    assert!(Tick::new("SPY", 0, f64::NAN, 1.0).validate().is_err());
    assert!(Tick::new("SPY", 0, -1.0, 1.0).validate().is_err());
    assert!(Tick::new("SPY", 0, 450.0, -5.0).validate().is_err());
    assert!(Tick::new("SPY", 0, 450.0, 0.0).validate().is_ok());
}

#[test]
fn test_historical_bar_millis_and_seconds() {
    let bar = HistoricalBar {
        timestamp: 1_717_421_520_000,
        open: 10.0,
        high: 11.0,
        low: 9.5,
        close: 10.5,
        volume: None,
    };
    let candle = bar.normalize(Timeframe::FiveMinute).unwrap();
    assert_eq!(candle.time, 1_717_421_400);
    assert_eq!(candle.volume, 0.0);

    let seconds = HistoricalBar {
        timestamp: 1_717_421_520,
        ..bar.clone()
    };
    assert_eq!(seconds.to_candle().unwrap().time, 1_717_421_520);

    let broken = HistoricalBar { close: 0.0, ..bar };
    assert!(broken.normalize(Timeframe::FiveMinute).is_none());
}

#[test]
fn test_grade_ordering() {
    assert!(Grade::A.at_least(Grade::B));
    assert!(Grade::B.at_least(Grade::B));
    assert!(!Grade::C.at_least(Grade::B));
    assert_eq!(Grade::from_str("d"), Some(Grade::D));
    assert_eq!(serde_json::to_string(&Grade::A).unwrap(), "\"A\"");
}

#[test]
fn test_directional_bias() {
    assert_eq!(DirectionalBias::from_str("Positive"), Some(DirectionalBias::Positive));
    assert_eq!(DirectionalBias::Neutral.vote(), None);
    assert_eq!(DirectionalBias::Negative.vote(), Some(-1.0));
    let parsed: DirectionalBias = serde_json::from_str("\"negative\"").unwrap();
    assert_eq!(parsed, DirectionalBias::Negative);
}

#[test]
fn test_key_level_serialization() {
    let level = KeyLevel::new(LevelType::Vwap, 450.0);
    let json = serde_json::to_value(&level).unwrap();
    assert_eq!(json["price"], 450.0);
    assert!(json.get("type").is_some());
}

#[test]
fn test_nearest_level() {
    let levels = vec![
        KeyLevel::new(LevelType::RoundBelow, 450.0),
        KeyLevel::new(LevelType::RoundAbove, 455.0),
    ];
    assert_eq!(nearest_level(&levels, 451.0).map(|l| l.price), Some(450.0));
    assert_eq!(nearest_level(&levels, 454.0).map(|l| l.price), Some(455.0));
    assert!(nearest_level(&[], 451.0).is_none());
}

#[test]
fn test_patience_signal_serialization() {
    let none = serde_json::to_value(PatienceSignal::none()).unwrap();
    assert_eq!(none["detected"], false);
    assert!(none.get("direction").is_none());

    let fired = serde_json::to_value(PatienceSignal::fired(Direction::Bullish)).unwrap();
    assert_eq!(fired["direction"], "bullish");
}

#[test]
fn test_engine_event_deserialization() {
    let tick: EngineEvent = serde_json::from_str(
        r#"{"type":"tick","symbol":"SPY","timestampMs":1717421400000,"price":450.0,"volume":3}"#,
    )
    .unwrap();
    assert_eq!(
        tick,
        EngineEvent::Tick(Tick::new("SPY", 1_717_421_400_000, 450.0, 3.0))
    );

    let focus: EngineEvent = serde_json::from_str(r#"{"type":"focus","symbol":"QQQ"}"#).unwrap();
    assert_eq!(
        focus,
        EngineEvent::Focus {
            symbol: "QQQ".to_string()
        }
    );

    let history: EngineEvent =
        serde_json::from_str(r#"{"type":"history","symbol":"SPY","daily":[]}"#).unwrap();
    assert!(matches!(history, EngineEvent::History { intraday, .. } if intraday.is_empty()));

    let timeframe: EngineEvent =
        serde_json::from_str(r#"{"type":"timeframe","timeframe":"1m"}"#).unwrap();
    assert_eq!(
        timeframe,
        EngineEvent::Timeframe {
            timeframe: Timeframe::OneMinute
        }
    );
}

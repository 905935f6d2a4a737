use thiserror::Error;

/// Engine error types.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid tick: {0}")]
    InvalidTick(String),

    #[error("Invalid bar: {0}")]
    InvalidBar(String),

    #[error("Unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Awaiting history seed for {0}")]
    AwaitingSeed(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

//! LTP engine - streaming candle aggregation and Level / Trend / Patience
//! confluence scoring for a focused instrument.

pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use config::{EngineConfig, GradeTable, ScoringConfig};
pub use error::{EngineError, Result};
pub use services::{Engine, EngineEvent, EngineUpdate, SymbolSession, Watchlist};
pub use types::*;

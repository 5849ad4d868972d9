//! Error types for harmony

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HarmonyError {
    #[error("Invalid chord symbol: {0:?}")]
    InvalidSymbol(String),
    #[error("Invalid tonic: {0:?}")]
    InvalidTonic(String),
    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),
    #[error("Invalid duration {duration} for chord {symbol:?}")]
    InvalidDuration { symbol: String, duration: f64 },
    #[error("Invalid articulation ratio: {0}")]
    InvalidArticulation(f64),
}

pub type Result<T> = std::result::Result<T, HarmonyError>;

// Domain errors for request validation
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("lookback window must be a positive number of hours, got {0}")]
    InvalidWindow(u32),

    #[error("unknown range {0:?}, expected 1h, 24h or 7d")]
    UnknownRange(String),

    #[error("alignment key granularity must be at least one second")]
    InvalidGranularity,
}

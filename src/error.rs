//! Per-instrument scan errors
//!
//! Both variants are non-fatal: the batch runner logs the instrument and moves on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Market data could not be retrieved (provider error, bad payload, missing file)
    #[error("retrieval failed: {reason}")]
    Retrieval { reason: String },

    /// Not enough bars to seat the ATR window
    #[error("insufficient history: {bars} bars, need at least {required}")]
    InsufficientHistory { bars: usize, required: usize },
}

impl ScanError {
    /// Wrap a collaborator error, keeping its full context chain in the message
    pub fn retrieval(err: &anyhow::Error) -> Self {
        ScanError::Retrieval {
            reason: format!("{:#}", err),
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

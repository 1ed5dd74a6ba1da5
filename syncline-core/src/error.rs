//! Syncline error abstractions.

use thiserror::Error;

/// Application error variants.
#[derive(Debug, Error)]
pub enum AppError {
    /// The given input was invalid.
    ///
    /// Always raised before any network call is made, and surfaced inline.
    #[error("validation error: {0}")]
    InvalidInput(String),
    /// A backend call failed: fetch failure, non-2xx response or timeout.
    #[error("transport error: {0}")]
    Transport(String),
    /// The stream is expected to be active but has produced no data within the
    /// staleness threshold. Advisory, auto-recovered after the grace period.
    #[error("stream is stale: no data received within the staleness threshold")]
    Stale,
    /// The engine has hit an internal error, but will remain online.
    #[error("internal error")]
    Ise(anyhow::Error),
}

impl AppError {
    /// Whether this error should be surfaced as a blocking error.
    ///
    /// Staleness is advisory only, and malformed-record errors never construct
    /// an `AppError` at all.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Self::Stale)
    }
}

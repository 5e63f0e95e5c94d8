//! Structured errors for administrative operations
//!
//! Background loops never surface these; every failure inside a watchdog tick
//! is logged and swallowed so the loop survives to the next tick. Only the
//! synchronous administrative surface (market/band create/start/stop/remove)
//! propagates errors to its caller.

use crate::core::types::{BandId, MarketId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("market {0} not found")]
    MarketNotFound(MarketId),

    #[error("band {0} not found")]
    BandNotFound(BandId),

    #[error("{0}")]
    Validation(String),

    /// Persistence failure; the store is the source of truth, so these are
    /// not absorbed silently on the admin surface.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// HTTP-equivalent status code for a caller that maps errors to a wire
    /// protocol (404 for missing records, 400 for rejected input).
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::MarketNotFound(_) | EngineError::BandNotFound(_) => 404,
            EngineError::Validation(_) => 400,
            EngineError::Store(_) => 500,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }
}

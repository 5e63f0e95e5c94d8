//! Engine configuration
//!
//! Tick intervals for the three polling loops plus the validation bounds the
//! administrative surface enforces. Loaded from JSON in the binaries;
//! defaults match the recommended operating values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reserve watchdog tick, per market
    pub market_tick_secs: u64,
    /// Cancellation receipt reconciler tick
    pub cancellation_tick_secs: u64,
    /// Soft-cancellation reconciler tick
    pub soft_cancel_tick_secs: u64,
    /// Age after which an unmined cancellation's gas is recorded as unknown
    pub cancel_receipt_timeout_secs: u64,
    /// Band expiration bounds enforced at band creation
    pub min_expiration_secs: u64,
    pub max_expiration_secs: u64,
    /// `source` tag stamped on orders this engine creates
    pub order_source: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            market_tick_secs: 10,
            cancellation_tick_secs: 30,
            soft_cancel_tick_secs: 30,
            cancel_receipt_timeout_secs: 3 * 60 * 60,
            min_expiration_secs: 60,
            max_expiration_secs: 7 * 24 * 60 * 60,
            order_source: "fen".to_string(),
        }
    }
}

//! Fen Core - Band Market Maker for Decentralized Limit-Order Exchanges
//!
//! Fen maintains a ladder ("bands") of buy and sell limit orders around a
//! reference price and keeps that ladder consistent with the remote order
//! book and the wallet's reserves, recovering from expired orders, stale
//! cancellations, price drift and reserve depletion without manual
//! intervention.
//!
//! ## Architecture
//! - **Polling, not events**: three independent timers (reserve watchdog,
//!   cancellation receipt reconciler, soft-cancellation reconciler)
//! - **Per-band serialization**: at most one in-flight cycle per band;
//!   late ticks are dropped, not queued
//! - **Fail-open validation**: an unreachable exchange never retires a
//!   possibly-live order
//! - **Exact arithmetic**: all prices and token amounts are
//!   `rust_decimal::Decimal`, never floats
//!
//! ## Core Modules
//! - `core`: domain types, pricing math, error taxonomy
//! - `store`: entities and the `Repository` persistence contract
//! - `services`: collaborator traits (exchange, wallet, price feed) and the
//!   operator audit log
//! - `engine`: order lifecycle manager, band engine, market service
//! - `watch`: the three background polling loops
//! - `sim`: simulated collaborators for paper trading and tests

pub mod config;
pub mod core;
pub mod engine;
pub mod services;
pub mod sim;
pub mod store;
pub mod watch;

// Re-export core types
pub use crate::core::{
    BandId, CancellationMode, ContainmentStatus, EngineError, GasAmount, LogId, MarketId, OrderId,
    OrderState, Severity, Side,
};

pub use config::EngineConfig;
pub use engine::{BandEngine, EngineDeps, MarketService, OrderLifecycle, Validation};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::core::{
        CancellationMode, ContainmentStatus, EngineError, GasAmount, OrderState, Severity, Side,
    };
    pub use crate::engine::{BandEngine, EngineDeps, MarketService, OrderLifecycle, Validation};
    pub use crate::services::{
        LogService, PriceFeed, RemoteOrderLookup, TokenRegistry, TradingService, WalletService,
    };
    pub use crate::store::entities::{Band, LogEntry, Market, MarketStats, Order};
    pub use crate::store::repository::{Entity, FindOptions, MemoryRepository, Repository};
    pub use crate::watch::{CancellationWatcher, MarketWatcher, SoftCancellationWatcher};
}

//! The band-reconciliation engine
//!
//! - [`orders`]: lifecycle of a single order record (validate / cancel /
//!   soft-cancel / persist)
//! - [`band`]: the per-band reconciliation cycle
//! - [`market`]: administrative market operations and balance statistics
//!
//! All components share one [`EngineDeps`] bundle assembled at startup; there
//! are no implicit defaults and no global state.

pub mod band;
pub mod market;
pub mod orders;

#[cfg(test)]
mod band_proptest;

use crate::config::EngineConfig;
use crate::services::{
    LogService, PriceFeed, RemoteOrderLookup, TokenRegistry, TradingService, WalletService,
};
use crate::store::entities::{Band, LogEntry, Market, MarketStats, Order};
use crate::store::repository::Repository;
use std::sync::Arc;

pub use band::BandEngine;
pub use market::MarketService;
pub use orders::{OrderLifecycle, Validation};

/// Explicit dependency bundle, assembled once at startup
pub struct EngineDeps {
    pub markets: Arc<dyn Repository<Market>>,
    pub bands: Arc<dyn Repository<Band>>,
    pub orders: Arc<dyn Repository<Order>>,
    pub stats: Arc<dyn Repository<MarketStats>>,
    pub log_entries: Arc<dyn Repository<LogEntry>>,
    pub logs: Arc<LogService>,
    pub price_feed: Arc<dyn PriceFeed>,
    pub trading: Arc<dyn TradingService>,
    pub remote_orders: Arc<dyn RemoteOrderLookup>,
    pub wallet: Arc<dyn WalletService>,
    pub tokens: Arc<dyn TokenRegistry>,
    pub config: EngineConfig,
}

//! Collaborator interfaces at the system boundary
//!
//! The engine is written against these traits only; production wiring plugs
//! in real clients once at startup, tests and paper trading plug in the `sim`
//! implementations. Every method is a suspension point from the caller's
//! perspective - a band cycle awaits each call in turn, with no pipelining.
//!
//! Failures behind these traits are opaque transients (`anyhow::Result`);
//! how to degrade is the caller's decision, not the collaborator's.

pub mod logs;

use crate::core::types::{OrderId, Side};
use crate::store::entities::Order;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

pub use logs::LogService;

/// One token of a trading pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: String,
    pub decimals: u32,
}

/// A resolved trading pair; base is the traded asset, quote the pricing asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub base: TokenInfo,
    pub quote: TokenInfo,
}

/// Token metadata lookup (symbols -> addresses and decimals)
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    async fn get_pair(&self, base_symbol: &str, quote_symbol: &str) -> Result<TokenPair>;
}

/// Reference price source
///
/// Fails if the pair is unsupported or the upstream source is unreachable
/// after its own internal retry policy; the engine never retries inline.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_price(&self, base_symbol: &str, quote_symbol: &str) -> Result<Decimal>;
}

/// Parameters for a new remote limit order
#[derive(Debug, Clone)]
pub struct CreateLimitOrder {
    pub account: String,
    pub base_token_symbol: String,
    pub quote_token_symbol: String,
    pub side: Side,
    /// Unit price (quote per base)
    pub price: Decimal,
    /// Quantity in base-token wei
    pub quantity: Decimal,
    pub expiration_unix: u64,
}

/// Current remote view of an order
#[derive(Debug, Clone)]
pub struct RemoteOrder {
    /// Remote state code; 0 means open
    pub state: u8,
    pub remaining_taker_amount: Decimal,
}

/// Mined receipt of a hard cancellation
#[derive(Debug, Clone)]
pub struct CancelReceipt {
    pub gas_cost: Decimal,
}

/// Remote exchange client (order placement and cancellation)
#[async_trait]
pub trait TradingService: Send + Sync {
    /// Submit a limit order; the returned record carries the remote-assigned
    /// id, hash and maker/taker amounts.
    async fn create_limit_order(&self, request: CreateLimitOrder) -> Result<Order>;

    /// Broadcast an on-chain cancellation, returning the transaction hash
    async fn cancel_order(&self, order_hash: &str, gas_price: Option<Decimal>) -> Result<String>;

    /// Remove the order from the visible book only; no chain transaction
    async fn soft_cancel_order(&self, order_hash: &str) -> Result<()>;

    /// Receipt of a broadcast cancellation; fails while not yet mined
    async fn get_cancel_receipt(&self, tx_hash: &str) -> Result<CancelReceipt>;
}

/// Authoritative remote order state lookup
#[async_trait]
pub trait RemoteOrderLookup: Send + Sync {
    async fn get_by_id(&self, order_id: OrderId) -> Result<RemoteOrder>;
}

/// Blockchain wallet balances (wei scale)
#[async_trait]
pub trait WalletService: Send + Sync {
    async fn get_balance(&self, account: &str, token_address: &str) -> Result<Decimal>;
    async fn get_eth_balance(&self, account: &str) -> Result<Decimal>;
}

//! Simulated collaborators for paper trading and integration tests
//!
//! [`SimExchange`] keeps a private book of remote order records and settles
//! cancellations instantly unless told to defer receipts; [`SimWallet`] and
//! [`FixedPriceFeed`] are plain maps behind locks. Failure toggles let tests
//! exercise the degraded paths without bespoke mock types.

use crate::core::pricing;
use crate::core::types::OrderId;
use crate::services::{
    CancelReceipt, CreateLimitOrder, RemoteOrder, RemoteOrderLookup, TokenPair, TokenRegistry,
    TradingService, WalletService,
};
use crate::store::entities::Order;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Fixed gas cost reported for every mined simulated cancellation
const SIM_GAS_COST: Decimal = dec!(0.00042);

/// Token registry over a fixed pair list
pub struct StaticTokenRegistry {
    pairs: Vec<TokenPair>,
}

impl StaticTokenRegistry {
    pub fn new(pairs: Vec<TokenPair>) -> Self {
        Self { pairs }
    }
}

#[async_trait]
impl TokenRegistry for StaticTokenRegistry {
    async fn get_pair(&self, base_symbol: &str, quote_symbol: &str) -> Result<TokenPair> {
        self.pairs
            .iter()
            .find(|p| p.base.symbol == base_symbol && p.quote.symbol == quote_symbol)
            .cloned()
            .ok_or_else(|| anyhow!("unknown token pair {base_symbol}/{quote_symbol}"))
    }
}

/// Price feed backed by a mutable map; set prices, read them back
#[derive(Default)]
pub struct FixedPriceFeed {
    prices: RwLock<HashMap<(String, String), Decimal>>,
    fail: AtomicBool,
}

impl FixedPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, base: &str, quote: &str, price: Decimal) {
        self.prices
            .write()
            .insert((base.to_string(), quote.to_string()), price);
    }

    /// Make every subsequent lookup fail (transient-outage simulation)
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::Release);
    }
}

#[async_trait]
impl crate::services::PriceFeed for FixedPriceFeed {
    async fn get_price(&self, base_symbol: &str, quote_symbol: &str) -> Result<Decimal> {
        if self.fail.load(Ordering::Acquire) {
            bail!("price feed unavailable");
        }
        self.prices
            .read()
            .get(&(base_symbol.to_string(), quote_symbol.to_string()))
            .copied()
            .ok_or_else(|| anyhow!("no price for {base_symbol}/{quote_symbol}"))
    }
}

/// Wallet with settable per-account token and ether balances
#[derive(Default)]
pub struct SimWallet {
    token_balances: RwLock<HashMap<(String, String), Decimal>>,
    eth_balances: RwLock<HashMap<String, Decimal>>,
}

impl SimWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, account: &str, token_address: &str, amount: Decimal) {
        self.token_balances
            .write()
            .insert((account.to_string(), token_address.to_string()), amount);
    }

    pub fn set_eth_balance(&self, account: &str, amount: Decimal) {
        self.eth_balances.write().insert(account.to_string(), amount);
    }
}

#[async_trait]
impl WalletService for SimWallet {
    async fn get_balance(&self, account: &str, token_address: &str) -> Result<Decimal> {
        Ok(self
            .token_balances
            .read()
            .get(&(account.to_string(), token_address.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn get_eth_balance(&self, account: &str) -> Result<Decimal> {
        Ok(self
            .eth_balances
            .read()
            .get(account)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }
}

struct BookEntry {
    order_hash: String,
    state: u8,
    remaining_taker_amount: Decimal,
}

/// In-memory exchange implementing both the trading and the lookup side
pub struct SimExchange {
    tokens: Arc<dyn TokenRegistry>,
    order_source: String,
    book: RwLock<HashMap<OrderId, BookEntry>>,
    receipts: RwLock<HashMap<String, Decimal>>,
    next_id: AtomicU64,
    fail_creates: AtomicBool,
    fail_lookups: AtomicBool,
    defer_receipts: AtomicBool,
}

impl SimExchange {
    pub fn new(tokens: Arc<dyn TokenRegistry>, order_source: impl Into<String>) -> Self {
        Self {
            tokens,
            order_source: order_source.into(),
            book: RwLock::new(HashMap::new()),
            receipts: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fail_creates: AtomicBool::new(false),
            fail_lookups: AtomicBool::new(false),
            defer_receipts: AtomicBool::new(false),
        }
    }

    pub fn set_fail_creates(&self, failing: bool) {
        self.fail_creates.store(failing, Ordering::Release);
    }

    pub fn set_fail_lookups(&self, failing: bool) {
        self.fail_lookups.store(failing, Ordering::Release);
    }

    /// Hold cancellation receipts back, as if the transactions never mine
    pub fn set_defer_receipts(&self, defer: bool) {
        self.defer_receipts.store(defer, Ordering::Release);
    }

    /// Simulate a (partial) fill against the remote book
    pub fn fill(&self, order_id: OrderId, taker_amount: Decimal) {
        if let Some(entry) = self.book.write().get_mut(&order_id) {
            entry.remaining_taker_amount =
                (entry.remaining_taker_amount - taker_amount).max(Decimal::ZERO);
        }
    }

    /// Force a remote state code (e.g. 4 for removed-by-exchange)
    pub fn set_remote_state(&self, order_id: OrderId, state: u8) {
        if let Some(entry) = self.book.write().get_mut(&order_id) {
            entry.state = state;
        }
    }

    pub fn open_order_count(&self) -> usize {
        self.book.read().values().filter(|e| e.state == 0).count()
    }

    fn random_hash() -> String {
        let mut rng = rand::thread_rng();
        let bytes: [u8; 32] = rng.gen();
        let mut hash = String::with_capacity(66);
        hash.push_str("0x");
        for byte in bytes {
            hash.push_str(&format!("{byte:02x}"));
        }
        hash
    }

    fn find_by_hash(&self, order_hash: &str) -> Result<OrderId> {
        self.book
            .read()
            .iter()
            .find(|(_, entry)| entry.order_hash == order_hash)
            .map(|(id, _)| *id)
            .ok_or_else(|| anyhow!("no order with hash {order_hash}"))
    }
}

#[async_trait]
impl TradingService for SimExchange {
    async fn create_limit_order(&self, request: CreateLimitOrder) -> Result<Order> {
        if self.fail_creates.load(Ordering::Acquire) {
            bail!("exchange rejected order creation");
        }

        let pair = self
            .tokens
            .get_pair(&request.base_token_symbol, &request.quote_token_symbol)
            .await?;
        let (maker, taker) = pricing::order_amounts(
            request.side,
            request.quantity,
            request.price,
            pair.base.decimals,
            pair.quote.decimals,
        );
        if maker <= Decimal::ZERO || taker <= Decimal::ZERO {
            bail!("order amounts must be positive");
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let order_hash = Self::random_hash();
        self.book.write().insert(
            id,
            BookEntry {
                order_hash: order_hash.clone(),
                state: 0,
                remaining_taker_amount: taker,
            },
        );

        Ok(Order {
            id,
            order_hash,
            source: self.order_source.clone(),
            maker_token_amount: maker,
            taker_token_amount: taker,
            remaining_taker_amount: taker,
            expiration_unix: request.expiration_unix,
            state: crate::core::types::OrderState::Open,
            side: request.side,
            market_id: 0,
            band_id: None,
            soft_canceled: false,
        })
    }

    async fn cancel_order(&self, order_hash: &str, _gas_price: Option<Decimal>) -> Result<String> {
        let id = self.find_by_hash(order_hash)?;
        if let Some(entry) = self.book.write().get_mut(&id) {
            entry.state = 1;
        }
        let tx_hash = Self::random_hash();
        self.receipts.write().insert(tx_hash.clone(), SIM_GAS_COST);
        Ok(tx_hash)
    }

    async fn soft_cancel_order(&self, order_hash: &str) -> Result<()> {
        // off the visible book only; the remote record stays chain-valid
        self.find_by_hash(order_hash)?;
        Ok(())
    }

    async fn get_cancel_receipt(&self, tx_hash: &str) -> Result<CancelReceipt> {
        if self.defer_receipts.load(Ordering::Acquire) {
            bail!("transaction not yet mined");
        }
        self.receipts
            .read()
            .get(tx_hash)
            .map(|gas_cost| CancelReceipt {
                gas_cost: *gas_cost,
            })
            .ok_or_else(|| anyhow!("no receipt for {tx_hash}"))
    }
}

#[async_trait]
impl RemoteOrderLookup for SimExchange {
    async fn get_by_id(&self, order_id: OrderId) -> Result<RemoteOrder> {
        if self.fail_lookups.load(Ordering::Acquire) {
            bail!("exchange unreachable");
        }
        self.book
            .read()
            .get(&order_id)
            .map(|entry| RemoteOrder {
                state: entry.state,
                remaining_taker_amount: entry.remaining_taker_amount,
            })
            .ok_or_else(|| anyhow!("no order with id {order_id}"))
    }
}

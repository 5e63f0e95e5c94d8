//! Shared test rig: in-memory store wired to the simulated collaborators
#![allow(dead_code)]

use fen_core::config::EngineConfig;
use fen_core::prelude::*;
use fen_core::services::{PriceFeed, TokenInfo, TokenPair};
use fen_core::sim::{FixedPriceFeed, SimExchange, SimWallet, StaticTokenRegistry};
use fen_core::store::entities::{Band, LogEntry, Market, MarketStats, Order, OrderFilter};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub const ACCOUNT: &str = "0xtestaccount";
pub const BASE_ADDR: &str = "0xbase";
pub const QUOTE_ADDR: &str = "0xquote";

pub fn test_pair() -> TokenPair {
    TokenPair {
        base: TokenInfo {
            symbol: "ZRX".into(),
            address: BASE_ADDR.into(),
            decimals: 18,
        },
        quote: TokenInfo {
            symbol: "WETH".into(),
            address: QUOTE_ADDR.into(),
            decimals: 18,
        },
    }
}

pub struct Rig {
    pub deps: Arc<EngineDeps>,
    pub bands: Arc<BandEngine>,
    pub markets: Arc<MarketService>,
    pub exchange: Arc<SimExchange>,
    pub wallet: Arc<SimWallet>,
    /// Default feed; unwired when the rig was built with a custom price feed
    pub feed: Arc<FixedPriceFeed>,
    pub pair: TokenPair,
}

impl Rig {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_price_feed(feed: Arc<dyn PriceFeed>) -> Self {
        Self::build(Some(feed))
    }

    fn build(feed_override: Option<Arc<dyn PriceFeed>>) -> Self {
        let pair = test_pair();
        let tokens = Arc::new(StaticTokenRegistry::new(vec![pair.clone()]));

        let feed = Arc::new(FixedPriceFeed::new());
        feed.set_price("ZRX", "WETH", dec!(100));
        feed.set_price("ZRX", "USD", dec!(1));
        feed.set_price("WETH", "USD", dec!(1));
        feed.set_price("ETH", "USD", dec!(1));

        let wallet = Arc::new(SimWallet::new());
        wallet.set_balance(ACCOUNT, BASE_ADDR, dec!(10000));
        wallet.set_balance(ACCOUNT, QUOTE_ADDR, dec!(10000));
        wallet.set_eth_balance(ACCOUNT, dec!(10));

        let exchange = Arc::new(SimExchange::new(tokens.clone(), "fen"));

        let log_entries: Arc<MemoryRepository<LogEntry>> = Arc::new(MemoryRepository::new());
        let price_feed: Arc<dyn PriceFeed> = match feed_override {
            Some(custom) => custom,
            None => feed.clone(),
        };

        let deps = Arc::new(EngineDeps {
            markets: Arc::new(MemoryRepository::<Market>::new()),
            bands: Arc::new(MemoryRepository::<Band>::new()),
            orders: Arc::new(MemoryRepository::<Order>::new()),
            stats: Arc::new(MemoryRepository::<MarketStats>::new()),
            log_entries: log_entries.clone(),
            logs: Arc::new(LogService::new(log_entries)),
            price_feed,
            trading: exchange.clone(),
            remote_orders: exchange.clone(),
            wallet: wallet.clone(),
            tokens,
            config: EngineConfig::default(),
        });

        let bands = Arc::new(BandEngine::new(deps.clone()));
        let markets = Arc::new(MarketService::new(deps.clone(), bands.clone()));

        Self {
            deps,
            bands,
            markets,
            exchange,
            wallet,
            feed,
            pair,
        }
    }

    /// Create an inactive market with permissive reserve settings
    pub async fn market(&self, mode: CancellationMode) -> Market {
        self.markets
            .create(Market {
                id: 0,
                label: "ZRX/WETH test".into(),
                account: ACCOUNT.into(),
                base_token_symbol: "ZRX".into(),
                quote_token_symbol: "WETH".into(),
                min_base_amount: dec!(100),
                max_base_amount: dec!(10000),
                min_quote_amount: dec!(100),
                max_quote_amount: dec!(10000),
                min_eth_amount: dec!(1),
                active: false,
                cancellation_mode: mode,
            })
            .await
            .unwrap()
    }

    /// Flip a market active directly in the store
    pub async fn activate(&self, market: &mut Market) {
        market.active = true;
        self.deps.markets.update(market).await.unwrap();
    }

    pub async fn band(&self, market_id: u64, side: Side, spread_bps: u32, units: u32) -> Band {
        self.bands
            .create(Band {
                id: 0,
                market_id,
                side,
                spread_bps,
                tolerance_bps: 10,
                units,
                min_units: units / 2,
                expiration_seconds: 1200,
            })
            .await
            .unwrap()
    }

    /// Create an order on the simulated exchange and bind it locally
    pub async fn open_order(
        &self,
        market: &Market,
        band_id: Option<u64>,
        side: Side,
        price: Decimal,
        quantity: Decimal,
    ) -> Order {
        let mut order = self
            .exchange
            .create_limit_order(fen_core::services::CreateLimitOrder {
                account: ACCOUNT.into(),
                base_token_symbol: "ZRX".into(),
                quote_token_symbol: "WETH".into(),
                side,
                price,
                quantity,
                expiration_unix: u64::MAX,
            })
            .await
            .unwrap();
        order.market_id = market.id;
        order.band_id = band_id;
        self.deps.orders.create(order.clone()).await.unwrap();
        order
    }

    pub async fn get_market(&self, market_id: u64) -> Market {
        self.deps
            .markets
            .find_one(&fen_core::store::entities::MarketFilter::by_id(market_id))
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn get_order(&self, order_id: u64) -> Order {
        self.deps
            .orders
            .find(&OrderFilter::default(), FindOptions::default())
            .await
            .unwrap()
            .into_iter()
            .find(|o| o.id == order_id)
            .unwrap()
    }

    pub async fn orders(&self, filter: OrderFilter) -> Vec<Order> {
        self.deps
            .orders
            .find(&filter, FindOptions::default())
            .await
            .unwrap()
    }

    pub async fn open_orders(&self, market_id: u64) -> Vec<Order> {
        self.orders(OrderFilter {
            market_id: Some(market_id),
            state: Some(OrderState::Open),
            ..Default::default()
        })
        .await
    }

    pub fn sum_remaining_maker(orders: &[Order]) -> Decimal {
        orders.iter().map(|o| o.remaining_maker_amount()).sum()
    }
}

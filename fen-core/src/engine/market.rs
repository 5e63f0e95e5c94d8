//! Administrative market operations and balance statistics
//!
//! Markets are created inactive. Starting a market flips it active and leaves
//! the rest to the watchdog's periodic ticks; stopping flips it inactive and
//! retires every bound order according to the requested cancellation mode.

use crate::core::pricing;
use crate::core::types::{now_unix, MarketId, OrderState, Severity, Side};
use crate::core::EngineError;
use crate::engine::band::BandEngine;
use crate::engine::EngineDeps;
use crate::store::entities::{
    Band, BandFilter, Market, MarketFilter, MarketStats, MarketStatsFilter, OrderFilter,
};
use crate::store::repository::FindOptions;
use rust_decimal::Decimal;
use std::sync::Arc;

/// USD equivalents are display values; two decimal places is plenty
const USD_SCALE: u32 = 2;

const STATS_PAGE_SIZE: usize = 100;

pub struct MarketService {
    deps: Arc<EngineDeps>,
    bands: Arc<BandEngine>,
}

impl MarketService {
    pub fn new(deps: Arc<EngineDeps>, bands: Arc<BandEngine>) -> Self {
        Self { deps, bands }
    }

    /// Register a new market; at most one market may exist per pair
    pub async fn create(&self, mut market: Market) -> Result<Market, EngineError> {
        let existing = self
            .deps
            .markets
            .find_one(&MarketFilter {
                pair: Some((
                    market.base_token_symbol.clone(),
                    market.quote_token_symbol.clone(),
                )),
                ..Default::default()
            })
            .await?;
        if existing.is_some() {
            return Err(EngineError::validation(format!(
                "market already exists for {}/{}",
                market.base_token_symbol, market.quote_token_symbol
            )));
        }

        if market.min_base_amount > market.max_base_amount {
            return Err(EngineError::validation(
                "minBaseAmount cannot exceed maxBaseAmount",
            ));
        }
        if market.min_quote_amount > market.max_quote_amount {
            return Err(EngineError::validation(
                "minQuoteAmount cannot exceed maxQuoteAmount",
            ));
        }

        market.active = false;
        Ok(self.deps.markets.create(market).await?)
    }

    /// Activate a market so the watchdog starts cycling its bands
    ///
    /// Requires at least one configured band: an active market with no bands
    /// has no units to size orders against, so the misconfiguration is
    /// rejected here rather than surfacing as a log entry every tick.
    pub async fn start(&self, market_id: MarketId) -> Result<Market, EngineError> {
        let mut market = self.get(market_id).await?;
        if market.active {
            return Err(EngineError::validation(format!(
                "market {market_id} already active"
            )));
        }

        let band_count = self
            .deps
            .bands
            .count(&BandFilter {
                market_id: Some(market_id),
                ..Default::default()
            })
            .await?;
        if band_count == 0 {
            return Err(EngineError::validation(format!(
                "market {market_id} has no bands configured"
            )));
        }

        self.deps
            .logs
            .add_market_log(
                Severity::Info,
                market_id,
                format!("starting market '{}'", market.label),
            )
            .await;

        market.active = true;
        self.deps.markets.update(&market).await?;

        self.deps
            .logs
            .add_market_log(
                Severity::Success,
                market_id,
                format!("successfully started market '{}'", market.label),
            )
            .await;
        Ok(market)
    }

    /// Deactivate a market and retire every order bound to its bands
    ///
    /// `immediate_cancellation` hard-cancels bound orders on-chain; otherwise
    /// they are unbound into the orphan pool and left to expire or be
    /// re-adopted if the market restarts.
    pub async fn stop(
        &self,
        market_id: MarketId,
        immediate_cancellation: bool,
    ) -> Result<Market, EngineError> {
        let mut market = self.get(market_id).await?;
        if !market.active {
            return Err(EngineError::validation(format!(
                "market {market_id} not active"
            )));
        }

        self.deps
            .logs
            .add_market_log(
                Severity::Info,
                market_id,
                format!("stopping market '{}'", market.label),
            )
            .await;

        // deactivate first so no band cycle opens a new order mid-stop
        market.active = false;
        self.deps.markets.update(&market).await?;

        for band in self.market_bands(market_id).await? {
            self.bands.stop(&band, immediate_cancellation).await?;
        }

        self.deps
            .logs
            .add_market_log(
                Severity::Success,
                market_id,
                format!("successfully stopped market '{}'", market.label),
            )
            .await;
        Ok(market)
    }

    /// Whether stopping would affect live orders (drives the UI confirmation
    /// for the cancellation mode choice)
    pub async fn validate_stop(&self, market_id: MarketId) -> Result<bool, EngineError> {
        let open = self
            .deps
            .orders
            .count(&OrderFilter {
                market_id: Some(market_id),
                orphaned: Some(false),
                state: Some(OrderState::Open),
                ..Default::default()
            })
            .await?;
        Ok(open > 0)
    }

    /// Delete an inactive market and its configuration
    pub async fn delete(&self, market_id: MarketId) -> Result<(), EngineError> {
        let market = self.get(market_id).await?;
        if market.active {
            return Err(EngineError::validation(format!(
                "market {market_id} is active; stop it before deleting"
            )));
        }

        self.deps
            .bands
            .delete(&BandFilter {
                market_id: Some(market_id),
                ..Default::default()
            })
            .await?;
        self.deps.markets.delete(&MarketFilter::by_id(market_id)).await?;
        Ok(())
    }

    /// Snapshot wallet balances and open order amounts for a market
    ///
    /// The snapshot is appended to history only when the balances differ from
    /// the latest stored snapshot, so a quiet market does not grow history
    /// every tick.
    pub async fn generate_stats(&self, market_id: MarketId) -> Result<MarketStats, EngineError> {
        let market = self.get(market_id).await?;
        let pair = self
            .deps
            .tokens
            .get_pair(&market.base_token_symbol, &market.quote_token_symbol)
            .await?;

        let wallet = &self.deps.wallet;
        let base_balance = wallet.get_balance(&market.account, &pair.base.address).await?;
        let quote_balance = wallet
            .get_balance(&market.account, &pair.quote.address)
            .await?;
        let eth_balance = wallet.get_eth_balance(&market.account).await?;

        let mut open_quote_amount = Decimal::ZERO;
        let mut open_base_amount = Decimal::ZERO;
        for band in self.market_bands(market_id).await? {
            let orders = self
                .deps
                .orders
                .find(
                    &OrderFilter {
                        band_id: Some(band.id),
                        state: Some(OrderState::Open),
                        ..Default::default()
                    },
                    FindOptions::default(),
                )
                .await?;
            let total: Decimal = orders.iter().map(|o| o.maker_token_amount).sum();
            match band.side {
                Side::Buy => open_quote_amount += total,
                Side::Sell => open_base_amount += total,
            }
        }

        let feed = &self.deps.price_feed;
        let base_usd = feed.get_price(&market.base_token_symbol, "USD").await?;
        let quote_usd = feed.get_price(&market.quote_token_symbol, "USD").await?;
        let eth_usd = feed.get_price("ETH", "USD").await?;

        let stats = MarketStats {
            id: 0,
            market_id,
            base_balance,
            base_usd_balance: (base_usd
                * pricing::to_unit_amount(base_balance, pair.base.decimals))
            .round_dp(USD_SCALE),
            quote_balance,
            quote_usd_balance: (quote_usd
                * pricing::to_unit_amount(quote_balance, pair.quote.decimals))
            .round_dp(USD_SCALE),
            eth_balance,
            eth_usd_balance: (eth_usd * pricing::to_unit_amount(eth_balance, 18))
                .round_dp(USD_SCALE),
            open_base_amount,
            open_quote_amount,
            created_at: now_unix(),
        };

        match self.latest_stats(market_id).await? {
            Some(latest) if latest.same_balances(&stats) => Ok(latest),
            _ => Ok(self.deps.stats.create(stats).await?),
        }
    }

    pub async fn latest_stats(
        &self,
        market_id: MarketId,
    ) -> Result<Option<MarketStats>, EngineError> {
        let mut stats = self
            .deps
            .stats
            .find(
                &MarketStatsFilter {
                    market_id: Some(market_id),
                },
                Self::newest_first().with_limit(1),
            )
            .await?;
        Ok(stats.pop())
    }

    pub async fn stats_history(
        &self,
        market_id: MarketId,
    ) -> Result<Vec<MarketStats>, EngineError> {
        Ok(self
            .deps
            .stats
            .find(
                &MarketStatsFilter {
                    market_id: Some(market_id),
                },
                Self::newest_first().with_limit(STATS_PAGE_SIZE),
            )
            .await?)
    }

    async fn get(&self, market_id: MarketId) -> Result<Market, EngineError> {
        self.deps
            .markets
            .find_one(&MarketFilter::by_id(market_id))
            .await?
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    async fn market_bands(&self, market_id: MarketId) -> Result<Vec<Band>, EngineError> {
        Ok(self
            .deps
            .bands
            .find(
                &BandFilter {
                    market_id: Some(market_id),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await?)
    }

    fn newest_first() -> FindOptions<MarketStats> {
        // timestamps are whole seconds; ids break ties between snapshots
        // written within the same second
        FindOptions::sorted(|a: &MarketStats, b: &MarketStats| {
            b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
        })
    }
}

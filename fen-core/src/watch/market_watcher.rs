//! Market reserve watchdog
//!
//! Top-level scheduler: once per tick it snapshots each active market's
//! balances, retreats when reserves fall below their configured minimums,
//! and otherwise fans the market's bands out into concurrent band cycles.

use crate::core::pricing;
use crate::core::types::{OrderState, Severity, Side};
use crate::core::EngineError;
use crate::engine::band::BandEngine;
use crate::engine::market::MarketService;
use crate::engine::orders::OrderLifecycle;
use crate::engine::EngineDeps;
use crate::store::entities::{BandFilter, Market, MarketFilter, Order, OrderFilter};
use crate::store::repository::FindOptions;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::error;

/// Outcome of the reserve check for one market
enum CycleGate {
    /// Reserves fine; fan out the band cycles
    Proceed,
    /// Transient failure; skip this tick, market stays active
    Skip,
    /// Reserves depleted; deactivate the market
    Retreat,
}

pub struct MarketWatcher {
    deps: Arc<EngineDeps>,
    bands: Arc<BandEngine>,
    markets: Arc<MarketService>,
    lifecycle: OrderLifecycle,
}

impl MarketWatcher {
    pub fn new(deps: Arc<EngineDeps>, bands: Arc<BandEngine>, markets: Arc<MarketService>) -> Self {
        Self {
            lifecycle: OrderLifecycle::new(deps.clone()),
            deps,
            bands,
            markets,
        }
    }

    /// Poll until shutdown. Markets start the process deactivated: whatever
    /// was active when the previous process died must be explicitly
    /// restarted, since its orders may have drifted arbitrarily in the
    /// meantime.
    pub async fn run(self: Arc<Self>, shutdown: Arc<AtomicBool>) {
        if let Err(err) = self.deactivate_all().await {
            error!("failed to deactivate markets at startup: {err:#}");
        }

        let period = Duration::from_secs(self.deps.config.market_tick_secs);
        let watcher = self.clone();
        super::run_ticks(period, shutdown, move || {
            let watcher = watcher.clone();
            async move { watcher.tick().await }
        })
        .await;
    }

    /// One watchdog pass over every active market
    pub async fn tick(&self) {
        let markets = match self
            .deps
            .markets
            .find(
                &MarketFilter {
                    active: Some(true),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await
        {
            Ok(markets) => markets,
            Err(err) => {
                error!("failed to load markets: {err:#}");
                return;
            }
        };

        for mut market in markets {
            if let Err(err) = self.cycle(&mut market).await {
                error!("market {} watchdog cycle failed: {err:#}", market.id);
            }
        }
    }

    /// Snapshot stats, enforce reserve minimums, then cycle every band
    pub async fn cycle(&self, market: &mut Market) -> Result<(), EngineError> {
        match self.can_cycle(market).await? {
            CycleGate::Proceed => {}
            CycleGate::Skip => return Ok(()),
            CycleGate::Retreat => {
                market.active = false;
                self.deps.markets.update(market).await?;
                return Ok(());
            }
        }

        let bands = self
            .deps
            .bands
            .find(
                &BandFilter {
                    market_id: Some(market.id),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await?;

        // bands are individually serialized by the engine's reentrancy
        // guard, so cycles within one tick can run concurrently
        let mut cycles = JoinSet::new();
        for band in bands {
            let engine = self.bands.clone();
            cycles.spawn(async move { engine.cycle(&band).await });
        }
        while let Some(joined) = cycles.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("band cycle failed: {err:#}"),
                Err(err) => error!("band cycle task panicked: {err:#}"),
            }
        }
        Ok(())
    }

    /// Reserve rule: ether below minimum retreats entirely; a depleted base
    /// or quote side halts only that side; both sides depleted means the
    /// market cannot cycle at all. Transient pair or stats failures skip the
    /// whole tick, band cycles included, without deactivating.
    async fn can_cycle(&self, market: &Market) -> Result<CycleGate, EngineError> {
        let pair = match self
            .deps
            .tokens
            .get_pair(&market.base_token_symbol, &market.quote_token_symbol)
            .await
        {
            Ok(pair) => pair,
            Err(err) => {
                self.deps
                    .logs
                    .add_market_log(
                        Severity::Critical,
                        market.id,
                        format!("failed to resolve token pair: {err:#}"),
                    )
                    .await;
                // transient; skip the tick without deactivating
                return Ok(CycleGate::Skip);
            }
        };

        let stats = match self.markets.generate_stats(market.id).await {
            Ok(stats) => stats,
            Err(EngineError::MarketNotFound(id)) => return Err(EngineError::MarketNotFound(id)),
            Err(err) => {
                self.deps
                    .logs
                    .add_market_log(
                        Severity::Critical,
                        market.id,
                        format!("failed to generate stats: {err:#}"),
                    )
                    .await;
                return Ok(CycleGate::Skip);
            }
        };

        let open_orders = self
            .deps
            .orders
            .find(
                &OrderFilter {
                    market_id: Some(market.id),
                    state: Some(OrderState::Open),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await?;

        if stats.eth_balance < market.min_eth_amount {
            if !open_orders.is_empty() {
                self.deps
                    .logs
                    .add_market_log(
                        Severity::Critical,
                        market.id,
                        format!(
                            "below minimum ether amount: {}/{}; all orders will be canceled",
                            pricing::to_unit_amount(stats.eth_balance, 18),
                            pricing::to_unit_amount(market.min_eth_amount, 18)
                        ),
                    )
                    .await;
            }
            self.cancel_validated(open_orders).await;
            return Ok(CycleGate::Retreat);
        }

        let below_base = stats.base_balance < market.min_base_amount;
        if below_base {
            let sells: Vec<Order> = open_orders
                .iter()
                .filter(|o| o.side == Side::Sell)
                .cloned()
                .collect();
            if !sells.is_empty() {
                self.deps
                    .logs
                    .add_market_log(
                        Severity::Critical,
                        market.id,
                        format!(
                            "below minimum {} amount: {}/{}; sell orders will be canceled",
                            market.base_token_symbol,
                            pricing::to_unit_amount(stats.base_balance, pair.base.decimals),
                            pricing::to_unit_amount(market.min_base_amount, pair.base.decimals)
                        ),
                    )
                    .await;
            }
            self.cancel_validated(sells).await;
        }

        let below_quote = stats.quote_balance < market.min_quote_amount;
        if below_quote {
            let buys: Vec<Order> = open_orders
                .iter()
                .filter(|o| o.side == Side::Buy)
                .cloned()
                .collect();
            if !buys.is_empty() {
                self.deps
                    .logs
                    .add_market_log(
                        Severity::Critical,
                        market.id,
                        format!(
                            "below minimum {} amount: {}/{}; buy orders will be canceled",
                            market.quote_token_symbol,
                            pricing::to_unit_amount(stats.quote_balance, pair.quote.decimals),
                            pricing::to_unit_amount(market.min_quote_amount, pair.quote.decimals)
                        ),
                    )
                    .await;
            }
            self.cancel_validated(buys).await;
        }

        if below_base && below_quote {
            Ok(CycleGate::Retreat)
        } else {
            Ok(CycleGate::Proceed)
        }
    }

    /// Hard-cancel every order that still validates as open remotely
    async fn cancel_validated(&self, orders: Vec<Order>) {
        for order in orders {
            if let Some(order) = self.lifecycle.validate(order).await.into_valid() {
                self.lifecycle.cancel(order, None).await;
            }
        }
    }

    async fn deactivate_all(&self) -> Result<(), EngineError> {
        let active = self
            .deps
            .markets
            .find(
                &MarketFilter {
                    active: Some(true),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await?;
        for mut market in active {
            market.active = false;
            self.deps.markets.update(&market).await?;
        }
        Ok(())
    }
}

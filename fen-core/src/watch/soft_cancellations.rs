//! Soft-cancellation reconciler
//!
//! Soft-canceled orders are off the visible book but still chain-valid: a
//! counterparty holding the signed order can fill it at any time. This loop
//! re-evaluates each one against the market's bottom band (largest spread,
//! the safety net furthest from midprice) and retires the ones that have
//! become a loss risk, per the market's cancellation mode.

use crate::core::types::{now_unix, CancellationMode, ContainmentStatus, OrderState, Severity};
use crate::engine::band::{containment_status, BandEngine};
use crate::engine::orders::OrderLifecycle;
use crate::engine::EngineDeps;
use crate::services::TokenPair;
use crate::store::entities::{Market, MarketFilter, Order, OrderFilter};
use crate::store::repository::FindOptions;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

pub struct SoftCancellationWatcher {
    deps: Arc<EngineDeps>,
    bands: Arc<BandEngine>,
    lifecycle: OrderLifecycle,
}

impl SoftCancellationWatcher {
    pub fn new(deps: Arc<EngineDeps>, bands: Arc<BandEngine>) -> Self {
        Self {
            lifecycle: OrderLifecycle::new(deps.clone()),
            deps,
            bands,
        }
    }

    pub async fn run(self: Arc<Self>, shutdown: Arc<AtomicBool>) {
        let period = Duration::from_secs(self.deps.config.soft_cancel_tick_secs);
        let watcher = self.clone();
        super::run_ticks(period, shutdown, move || {
            let watcher = watcher.clone();
            async move { watcher.tick().await }
        })
        .await;
    }

    /// Re-evaluate every soft-canceled order across all markets
    pub async fn tick(&self) {
        let markets = match self
            .deps
            .markets
            .find(&MarketFilter::default(), FindOptions::default())
            .await
        {
            Ok(markets) => markets,
            Err(err) => {
                error!("failed to load markets: {err:#}");
                return;
            }
        };

        for market in markets {
            if let Err(err) = self.reconcile_market(&market).await {
                error!(
                    "soft-cancel reconciliation failed for market {}: {err:#}",
                    market.id
                );
            }
        }
    }

    async fn reconcile_market(&self, market: &Market) -> anyhow::Result<()> {
        let orders = self
            .deps
            .orders
            .find(
                &OrderFilter {
                    market_id: Some(market.id),
                    soft_canceled: Some(true),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await?;
        if orders.is_empty() {
            return Ok(());
        }

        let pair = self
            .deps
            .tokens
            .get_pair(&market.base_token_symbol, &market.quote_token_symbol)
            .await?;

        for order in orders {
            self.process(order, market, &pair).await;
        }
        Ok(())
    }

    async fn process(&self, mut order: Order, market: &Market, pair: &TokenPair) {
        if order.is_expired(now_unix()) {
            order.state = OrderState::Expired;
            order.soft_canceled = false;
            self.lifecycle.update(&order).await;
            return;
        }

        let bottom = match self.bands.bottom_band(market.id, order.side).await {
            Ok(bottom) => bottom,
            Err(err) => {
                self.deps
                    .logs
                    .add_market_log(
                        Severity::Error,
                        market.id,
                        format!("failed to look up bottom band: {err:#}"),
                    )
                    .await;
                return;
            }
        };

        let bottom = match bottom {
            Some(bottom) => bottom,
            None => {
                // nowhere left to rest; retire it
                self.cancel_per_mode(order, market).await;
                return;
            }
        };

        let price = match self
            .deps
            .price_feed
            .get_price(&market.base_token_symbol, &market.quote_token_symbol)
            .await
        {
            Ok(price) => price,
            Err(err) => {
                self.deps
                    .logs
                    .add_market_log(
                        Severity::Critical,
                        market.id,
                        format!("failed to get price: {err:#}"),
                    )
                    .await;
                return;
            }
        };

        if containment_status(price, &order, &bottom, pair) == Some(ContainmentStatus::LossRisk) {
            self.cancel_per_mode(order, market).await;
        }
        // otherwise leave it resting off-book for the next tick
    }

    async fn cancel_per_mode(&self, order: Order, market: &Market) {
        match market.cancellation_mode {
            CancellationMode::Soft => {
                self.lifecycle.soft_cancel(order).await;
            }
            CancellationMode::Hard => {
                self.lifecycle.cancel(order, None).await;
            }
        }
    }
}

//! Per-band reconciliation cycle
//!
//! A band's cycle keeps its slice of the ladder consistent with the current
//! reference price and the wallet's reserves: existing orders are validated
//! and either kept, migrated to a sibling band, or retired, and a new order
//! is opened when the band's remaining quantity falls below its fill
//! threshold.
//!
//! Cycles are serialized per band: a tick that arrives while the previous
//! cycle for the same band is still in flight is dropped, not queued.

use crate::core::pricing;
use crate::core::types::{
    now_unix, BandId, ContainmentStatus, OrderState, Severity, Side,
};
use crate::core::EngineError;
use crate::engine::orders::OrderLifecycle;
use crate::engine::EngineDeps;
use crate::services::{CreateLimitOrder, TokenPair};
use crate::store::entities::{Band, BandFilter, Market, MarketFilter, Order, OrderFilter};
use crate::store::repository::FindOptions;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Containment of an order's price relative to a band's target at the given
/// reference price
///
/// `None` means the order's amounts do not yield a price (zero divisor) -
/// a malformed record that the caller should drop, not classify.
pub fn containment_status(
    price: Decimal,
    order: &Order,
    band: &Band,
    pair: &TokenPair,
) -> Option<ContainmentStatus> {
    let order_price = pricing::order_price(
        band.side,
        order.maker_token_amount,
        order.taker_token_amount,
        pair.base.decimals,
        pair.quote.decimals,
    )?;

    let target = pricing::target_price(price, band.side, band.spread_bps);
    let tolerance = pricing::absolute_offset(price, band.tolerance_bps);

    let below_lower_bound = order_price < target - tolerance;
    let above_upper_bound = order_price > target + tolerance;

    let status = if below_lower_bound {
        match band.side {
            Side::Buy => ContainmentStatus::NoLossRisk,
            Side::Sell => ContainmentStatus::LossRisk,
        }
    } else if above_upper_bound {
        match band.side {
            Side::Buy => ContainmentStatus::LossRisk,
            Side::Sell => ContainmentStatus::NoLossRisk,
        }
    } else {
        ContainmentStatus::Contained
    };
    Some(status)
}

/// Sibling bands ordered by ascending spread distance from `current`,
/// tie-broken by lower band id; `current` itself is excluded.
pub fn sibling_bands(mut bands: Vec<Band>, current: &Band) -> Vec<Band> {
    bands.retain(|b| b.id != current.id);
    bands.sort_by_key(|b| {
        let distance = b.spread_bps.abs_diff(current.spread_bps);
        (distance, b.id)
    });
    bands
}

pub struct BandEngine {
    deps: Arc<EngineDeps>,
    lifecycle: OrderLifecycle,
    in_flight: DashMap<BandId, ()>,
}

impl BandEngine {
    pub fn new(deps: Arc<EngineDeps>) -> Self {
        Self {
            lifecycle: OrderLifecycle::new(deps.clone()),
            deps,
            in_flight: DashMap::new(),
        }
    }

    /// Validate and persist a new band
    pub async fn create(&self, band: Band) -> Result<Band, EngineError> {
        let market = self
            .deps
            .markets
            .find_one(&MarketFilter::by_id(band.market_id))
            .await?;
        if market.is_none() {
            return Err(EngineError::MarketNotFound(band.market_id));
        }

        if band.spread_bps == 0 {
            return Err(EngineError::validation("spreadBps must be positive"));
        }
        if band.tolerance_bps >= band.spread_bps {
            return Err(EngineError::validation(
                "toleranceBps must be strictly less than spreadBps",
            ));
        }
        if band.units == 0 {
            return Err(EngineError::validation("units must be at least 1"));
        }
        if band.min_units > band.units {
            return Err(EngineError::validation("minUnits cannot exceed units"));
        }
        let config = &self.deps.config;
        if band.expiration_seconds < config.min_expiration_secs
            || band.expiration_seconds > config.max_expiration_secs
        {
            return Err(EngineError::validation(format!(
                "expirationSeconds must be within {}..={}",
                config.min_expiration_secs, config.max_expiration_secs
            )));
        }

        Ok(self.deps.bands.create(band).await?)
    }

    /// Run one reconciliation cycle for a band
    ///
    /// Re-entrant calls for the same band are silently dropped. Only a
    /// missing market is an error; every transient failure is logged to the
    /// band's audit trail and aborts the cycle cleanly for retry next tick.
    pub async fn cycle(&self, band: &Band) -> Result<(), EngineError> {
        let _guard = match self.try_acquire(band.id) {
            Some(guard) => guard,
            None => {
                debug!("band {} cycle already in flight - dropping", band.id);
                return Ok(());
            }
        };

        let market = self
            .deps
            .markets
            .find_one(&MarketFilter::by_id(band.market_id))
            .await?
            .ok_or(EngineError::MarketNotFound(band.market_id))?;

        // a stopped market's bound orders are retired by the stop flow, not here
        if !market.active {
            return Ok(());
        }

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
                    .add_band_log(
                        Severity::Critical,
                        band.id,
                        format!("failed to resolve token pair: {err:#}"),
                    )
                    .await;
                return Ok(());
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
                    .add_band_log(
                        Severity::Critical,
                        band.id,
                        format!("failed to get price: {err:#}"),
                    )
                    .await;
                return Ok(());
            }
        };

        let mut valid_orders = Vec::new();

        let bound_orders = self
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

        for order in bound_orders {
            let order = match self.lifecycle.validate(order).await.into_valid() {
                Some(order) => order,
                None => continue,
            };

            let status = match containment_status(price, &order, band, &pair) {
                Some(status) => status,
                None => {
                    self.deps
                        .logs
                        .add_band_log(
                            Severity::Error,
                            band.id,
                            format!("order {} has no computable price - skipping", order.id),
                        )
                        .await;
                    continue;
                }
            };

            if status == ContainmentStatus::Contained {
                valid_orders.push(order);
                continue;
            }

            if self.migrate_to_sibling(price, order.clone(), band, &pair).await? {
                continue;
            }

            let retired = match status {
                ContainmentStatus::LossRisk => {
                    // priced in the counterparty's favor - pull immediately
                    self.lifecycle.cancel(order, None).await
                }
                ContainmentStatus::NoLossRisk => {
                    // stale but harmless; rest it off-book so it stops
                    // double-counting reserve
                    self.lifecycle.soft_cancel(order).await
                }
                ContainmentStatus::Contained => unreachable!(),
            };
            // a failed retirement leaves the order live and bound; sizing a
            // replacement now would double the band's exposure
            if retired.state == OrderState::Open {
                return Ok(());
            }
        }

        // adopt orphaned open orders that happen to fit this band
        let orphans = self
            .deps
            .orders
            .find(
                &OrderFilter {
                    market_id: Some(market.id),
                    side: Some(band.side),
                    orphaned: Some(true),
                    state: Some(OrderState::Open),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await?;
        for orphan in orphans {
            let mut order = match self.lifecycle.validate(orphan).await.into_valid() {
                Some(order) => order,
                None => continue,
            };
            if containment_status(price, &order, band, &pair)
                == Some(ContainmentStatus::Contained)
            {
                order.band_id = Some(band.id);
                self.lifecycle.update(&order).await;
                self.deps
                    .logs
                    .add_band_log(
                        Severity::Info,
                        band.id,
                        format!("adopted orphaned order {}", order.id),
                    )
                    .await;
                valid_orders.push(order);
            }
        }

        self.refill(&market, band, &pair, price, valid_orders).await
    }

    /// Try to rebind a drifted order into a sibling band that contains it.
    /// Pure bookkeeping: the remote order is untouched.
    async fn migrate_to_sibling(
        &self,
        price: Decimal,
        mut order: Order,
        band: &Band,
        pair: &TokenPair,
    ) -> Result<bool, EngineError> {
        let siblings = self
            .deps
            .bands
            .find(
                &BandFilter {
                    market_id: Some(band.market_id),
                    side: Some(band.side),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await?;

        for sibling in sibling_bands(siblings, band) {
            if containment_status(price, &order, &sibling, pair)
                == Some(ContainmentStatus::Contained)
            {
                order.band_id = Some(sibling.id);
                self.lifecycle.update(&order).await;
                self.deps
                    .logs
                    .add_band_log(
                        Severity::Info,
                        band.id,
                        format!("moving order {} into adjacent band {}", order.id, sibling.id),
                    )
                    .await;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Open a new order if the band's covered quantity fell below its
    /// threshold share of the available reserve
    async fn refill(
        &self,
        market: &Market,
        band: &Band,
        pair: &TokenPair,
        price: Decimal,
        valid_orders: Vec<Order>,
    ) -> Result<(), EngineError> {
        let side_bands = self
            .deps
            .bands
            .find(
                &BandFilter {
                    market_id: Some(market.id),
                    side: Some(band.side),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await?;
        let total_units: u64 = side_bands.iter().map(|b| u64::from(b.units)).sum();
        if total_units == 0 {
            // guarded at band creation (units >= 1); never divide by zero here
            self.deps
                .logs
                .add_band_log(
                    Severity::Critical,
                    band.id,
                    "no units configured for this side - cannot size order",
                )
                .await;
            return Ok(());
        }

        let available = match self.available_balance(band.side, pair, market).await {
            Ok(available) => available,
            Err(err) => {
                self.deps
                    .logs
                    .add_band_log(Severity::Critical, band.id, format!("{err:#}"))
                    .await;
                return Ok(());
            }
        };

        let remaining_quantity: Decimal = valid_orders
            .iter()
            .map(|order| order.remaining_maker_amount())
            .sum();

        let total_units = Decimal::from(total_units);
        let threshold = available * Decimal::from(band.min_units) / total_units;
        if remaining_quantity > threshold {
            // sufficiently covered
            return Ok(());
        }

        let target = pricing::target_price(price, band.side, band.spread_bps);

        let mut quantity =
            available * Decimal::from(band.units) / total_units - remaining_quantity;
        if band.side == Side::Buy {
            // reserve is quote-denominated, order quantity is base-denominated
            quantity = pricing::quote_to_base(
                quantity,
                target,
                pair.base.decimals,
                pair.quote.decimals,
            );
        } else {
            quantity = quantity.round();
        }
        if quantity <= Decimal::ZERO {
            return Ok(());
        }

        let request = CreateLimitOrder {
            account: market.account.clone(),
            base_token_symbol: market.base_token_symbol.clone(),
            quote_token_symbol: market.quote_token_symbol.clone(),
            side: band.side,
            price: target,
            quantity,
            expiration_unix: now_unix() + band.expiration_seconds,
        };

        match self.deps.trading.create_limit_order(request).await {
            Ok(mut order) => {
                order.market_id = market.id;
                order.band_id = Some(band.id);
                order.state = OrderState::Open;
                order.soft_canceled = false;
                self.deps.orders.create(order.clone()).await?;
                self.deps
                    .logs
                    .add_band_log(
                        Severity::Info,
                        band.id,
                        format!("opened order of {} at {}", quantity, target),
                    )
                    .await;
                self.deps
                    .logs
                    .add_band_log(Severity::Success, band.id, format!("band {} refreshed", band.id))
                    .await;
            }
            Err(err) => {
                self.deps
                    .logs
                    .add_band_log(
                        Severity::Critical,
                        band.id,
                        format!("error creating limit order: {err:#}"),
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Wallet balance this band's side may commit, clamped by the market's
    /// reserve ceiling; errors when below the configured minimum.
    pub async fn available_balance(
        &self,
        side: Side,
        pair: &TokenPair,
        market: &Market,
    ) -> anyhow::Result<Decimal> {
        match side {
            Side::Buy => {
                let balance = self
                    .deps
                    .wallet
                    .get_balance(&market.account, &pair.quote.address)
                    .await?;
                if balance < market.min_quote_amount {
                    anyhow::bail!(
                        "balance is lower than minimum quote token amount: {}/{}",
                        balance,
                        market.min_quote_amount
                    );
                }
                Ok(balance.min(market.max_quote_amount))
            }
            Side::Sell => {
                let balance = self
                    .deps
                    .wallet
                    .get_balance(&market.account, &pair.base.address)
                    .await?;
                if balance < market.min_base_amount {
                    anyhow::bail!(
                        "balance is lower than minimum base token amount: {}/{}",
                        balance,
                        market.min_base_amount
                    );
                }
                Ok(balance.min(market.max_base_amount))
            }
        }
    }

    /// The safety-net band: numerically largest spread for a market+side
    pub async fn bottom_band(
        &self,
        market_id: u64,
        side: Side,
    ) -> Result<Option<Band>, EngineError> {
        let bands = self
            .deps
            .bands
            .find(
                &BandFilter {
                    market_id: Some(market_id),
                    side: Some(side),
                    ..Default::default()
                },
                FindOptions::default(),
            )
            .await?;
        Ok(bands.into_iter().max_by_key(|b| b.spread_bps))
    }

    /// Retire a band's bound orders: hard-cancel when `immediate`, otherwise
    /// unbind them into the orphan pool.
    pub async fn stop(&self, band: &Band, immediate: bool) -> Result<(), EngineError> {
        let bound_orders = self
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

        for mut order in bound_orders {
            if immediate {
                order = self.lifecycle.cancel(order, None).await;
            }
            order.band_id = None;
            self.lifecycle.update(&order).await;
        }

        self.deps
            .logs
            .add_band_log(Severity::Success, band.id, format!("band {} stopped", band.id))
            .await;
        Ok(())
    }

    /// Whether removing the band would leave active orders behind
    pub async fn validate_remove(&self, band_id: BandId) -> Result<bool, EngineError> {
        let active = self
            .deps
            .orders
            .count(&OrderFilter {
                band_id: Some(band_id),
                state: Some(OrderState::Open),
                ..Default::default()
            })
            .await?;
        Ok(active > 0)
    }

    /// Remove a band, first retiring any order bound to it
    pub async fn remove(&self, band_id: BandId, immediate_cancellation: bool) -> Result<(), EngineError> {
        let band = self
            .deps
            .bands
            .find_one(&BandFilter::by_id(band_id))
            .await?
            .ok_or(EngineError::BandNotFound(band_id))?;

        self.stop(&band, immediate_cancellation).await?;
        self.deps.bands.delete(&BandFilter::by_id(band_id)).await?;
        self.deps
            .logs
            .add_market_log(
                Severity::Success,
                band.market_id,
                format!("band {} removed from market", band_id),
            )
            .await;
        Ok(())
    }

    fn try_acquire(&self, band_id: BandId) -> Option<CycleGuard<'_>> {
        match self.in_flight.entry(band_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(CycleGuard {
                    map: &self.in_flight,
                    band_id,
                })
            }
        }
    }
}

/// Releases the per-band cycle slot on drop, even when a cycle errors out
struct CycleGuard<'a> {
    map: &'a DashMap<BandId, ()>,
    band_id: BandId,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.band_id);
    }
}

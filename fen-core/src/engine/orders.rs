//! Order lifecycle manager
//!
//! Owns every transition of a single order record. All mutation of orders
//! anywhere in the system goes through here: the band engine and both
//! reconcilers call in, nothing touches order records directly.

use crate::core::types::{now_unix, OrderState, Severity};
use crate::engine::EngineDeps;
use crate::store::entities::Order;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, warn};

/// Outcome of validating a local order against the remote exchange
#[derive(Debug)]
pub enum Validation {
    /// Still open remotely; carries the refreshed record
    Valid(Order),
    /// Fully filled (remaining taker amount reached zero)
    Filled,
    /// Expired, canceled, removed or otherwise no longer usable
    Gone,
}

impl Validation {
    pub fn into_valid(self) -> Option<Order> {
        match self {
            Validation::Valid(order) => Some(order),
            _ => None,
        }
    }
}

pub struct OrderLifecycle {
    deps: Arc<EngineDeps>,
}

impl OrderLifecycle {
    pub fn new(deps: Arc<EngineDeps>) -> Self {
        Self { deps }
    }

    /// Check an order against the clock and the remote exchange
    ///
    /// Expired orders are marked and persisted before returning `Gone`.
    /// A failed remote lookup returns the order as still valid: treating a
    /// possibly-live order as dead risks opening a duplicate and
    /// over-committing capital, so the safe failure direction is to
    /// under-react.
    pub async fn validate(&self, mut order: Order) -> Validation {
        if order.is_expired(now_unix()) {
            order.state = OrderState::Expired;
            order.soft_canceled = false;
            self.update(&order).await;
            if let Some(band_id) = order.band_id {
                self.deps
                    .logs
                    .add_band_log(Severity::Error, band_id, format!("order {} expired", order.id))
                    .await;
            }
            return Validation::Gone;
        }

        let remote = match self.deps.remote_orders.get_by_id(order.id).await {
            Ok(remote) => remote,
            Err(err) => {
                warn!("failed to get order {} by id: {err:#}", order.id);
                if let Some(band_id) = order.band_id {
                    self.deps
                        .logs
                        .add_band_log(
                            Severity::Error,
                            band_id,
                            format!(
                                "failed to get order {} by id: {err:#} - treating as still valid",
                                order.id
                            ),
                        )
                        .await;
                }
                // fail open
                return Validation::Valid(order);
            }
        };

        if remote.state != 0 {
            order.state = OrderState::from_remote_code(remote.state).unwrap_or(OrderState::Removed);
            if let Some(band_id) = order.band_id {
                self.deps
                    .logs
                    .add_band_log(
                        Severity::Error,
                        band_id,
                        format!(
                            "order {} no longer open remotely ({}) - dropping, band will refresh",
                            order.id, order.state
                        ),
                    )
                    .await;
            }
            self.update(&order).await;
            return Validation::Gone;
        }

        order.remaining_taker_amount = remote.remaining_taker_amount;
        if order.remaining_taker_amount.is_zero() {
            order.state = OrderState::Filled;
            self.update(&order).await;
            return Validation::Filled;
        }

        self.update(&order).await;
        Validation::Valid(order)
    }

    /// Request a hard on-chain cancellation
    ///
    /// On success a cancel audit entry is written with its gas still mining
    /// and the order becomes `Canceled` with `soft_canceled` cleared. On
    /// failure the state is left unchanged. The record is persisted either
    /// way.
    pub async fn cancel(&self, mut order: Order, gas_price: Option<Decimal>) -> Order {
        match self
            .deps
            .trading
            .cancel_order(&order.order_hash, gas_price)
            .await
        {
            Ok(tx_hash) => {
                order.state = OrderState::Canceled;
                order.soft_canceled = false;
                self.deps
                    .logs
                    .add_cancel_log(
                        tx_hash.clone(),
                        order.clone(),
                        format!("canceled order {} w/ tx {}", order.id, tx_hash),
                    )
                    .await;
            }
            Err(err) => {
                self.log_failure(&order, format!("failed to cancel order {}: {err:#}", order.id))
                    .await;
            }
        }
        self.update(&order).await;
        order
    }

    /// Remove an order from the visible book without a chain transaction
    pub async fn soft_cancel(&self, mut order: Order) -> Order {
        match self.deps.trading.soft_cancel_order(&order.order_hash).await {
            Ok(()) => {
                order.state = OrderState::Canceled;
                order.soft_canceled = true;
            }
            Err(err) => {
                self.log_failure(
                    &order,
                    format!("failed to soft-cancel order {}: {err:#}", order.id),
                )
                .await;
            }
        }
        self.update(&order).await;
        order
    }

    /// Unconditional persistence, keyed by the order's remote id
    pub async fn update(&self, order: &Order) {
        if let Err(err) = self.deps.orders.update(order).await {
            error!("failed to persist order {}: {err:#}", order.id);
        }
    }

    async fn log_failure(&self, order: &Order, message: String) {
        match order.band_id {
            Some(band_id) => {
                self.deps
                    .logs
                    .add_band_log(Severity::Critical, band_id, message)
                    .await
            }
            None => {
                self.deps
                    .logs
                    .add_market_log(Severity::Critical, order.market_id, message)
                    .await
            }
        }
    }
}

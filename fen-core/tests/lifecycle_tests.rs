//! Order lifecycle manager integration tests

mod common;

use common::Rig;
use fen_core::prelude::*;
use fen_core::store::entities::Order;
use rust_decimal_macros::dec;

fn lifecycle(rig: &Rig) -> OrderLifecycle {
    OrderLifecycle::new(rig.deps.clone())
}

async fn bound_order(rig: &Rig) -> Order {
    let market = rig.market(CancellationMode::Soft).await;
    let band = rig.band(market.id, Side::Sell, 50, 100).await;
    rig.open_order(&market, Some(band.id), Side::Sell, dec!(100.5), dec!(1000))
        .await
}

/// Round-trip: a partially filled remote order comes back from `validate`
/// with the remote's remaining amount, and the store reflects it
#[tokio::test]
async fn test_validate_refreshes_remaining_from_remote() {
    let rig = Rig::new();
    let order = bound_order(&rig).await;
    let filled = order.taker_token_amount / dec!(4);
    rig.exchange.fill(order.id, filled);

    let validated = lifecycle(&rig).validate(order.clone()).await;
    let refreshed = validated.into_valid().unwrap();
    assert_eq!(
        refreshed.remaining_taker_amount,
        order.taker_token_amount - filled
    );
    assert_eq!(
        rig.get_order(order.id).await.remaining_taker_amount,
        order.taker_token_amount - filled
    );
}

#[tokio::test]
async fn test_validate_marks_expired_order() {
    let rig = Rig::new();
    let mut order = bound_order(&rig).await;
    order.expiration_unix = 1;
    rig.deps.orders.update(&order).await.unwrap();

    let validated = lifecycle(&rig).validate(order.clone()).await;
    assert!(validated.into_valid().is_none());
    assert_eq!(rig.get_order(order.id).await.state, OrderState::Expired);
}

/// Fail-open: an unreachable exchange must not retire a possibly-live order
#[tokio::test]
async fn test_validate_fails_open_on_lookup_error() {
    let rig = Rig::new();
    let order = bound_order(&rig).await;
    rig.exchange.set_fail_lookups(true);

    let validated = lifecycle(&rig).validate(order.clone()).await;
    assert!(validated.into_valid().is_some());
    assert_eq!(rig.get_order(order.id).await.state, OrderState::Open);

    let logs = rig.deps.logs.band_logs(order.band_id.unwrap()).await;
    assert!(logs.iter().any(|l| l.message.contains("treating as still valid")));
}

#[tokio::test]
async fn test_validate_adopts_remote_terminal_state() {
    let rig = Rig::new();
    let order = bound_order(&rig).await;
    // removed by the exchange
    rig.exchange.set_remote_state(order.id, 4);

    let validated = lifecycle(&rig).validate(order.clone()).await;
    assert!(validated.into_valid().is_none());
    assert_eq!(rig.get_order(order.id).await.state, OrderState::Removed);
}

#[tokio::test]
async fn test_validate_marks_fully_filled_order() {
    let rig = Rig::new();
    let order = bound_order(&rig).await;
    rig.exchange.fill(order.id, order.taker_token_amount);

    let validated = lifecycle(&rig).validate(order.clone()).await;
    assert!(matches!(validated, Validation::Filled));
    assert_eq!(rig.get_order(order.id).await.state, OrderState::Filled);
}

#[tokio::test]
async fn test_cancel_writes_mining_log_and_persists() {
    let rig = Rig::new();
    let order = bound_order(&rig).await;

    let canceled = lifecycle(&rig).cancel(order.clone(), None).await;
    assert_eq!(canceled.state, OrderState::Canceled);
    assert!(!canceled.soft_canceled);
    assert_eq!(rig.exchange.get_by_id(order.id).await.unwrap().state, 1);

    let pending = rig.deps.logs.get_pending_cancel_logs().await;
    assert_eq!(pending.len(), 1);
    assert!(matches!(
        &pending[0].kind,
        fen_core::store::entities::LogKind::Cancel { gas: GasAmount::Mining, .. }
    ));
}

/// A failed cancellation leaves the order state untouched and logs critical
#[tokio::test]
async fn test_cancel_failure_leaves_state_unchanged() {
    let rig = Rig::new();
    let mut order = bound_order(&rig).await;
    // hash the exchange has never seen
    order.order_hash = "0xunknown".into();
    rig.deps.orders.update(&order).await.unwrap();

    let result = lifecycle(&rig).cancel(order.clone(), None).await;
    assert_eq!(result.state, OrderState::Open);
    assert!(rig.deps.logs.get_pending_cancel_logs().await.is_empty());

    let logs = rig.deps.logs.band_logs(order.band_id.unwrap()).await;
    assert!(logs
        .iter()
        .any(|l| l.severity == Severity::Critical && l.message.contains("failed to cancel")));
}

#[tokio::test]
async fn test_soft_cancel_sets_flag_and_keeps_chain_validity() {
    let rig = Rig::new();
    let order = bound_order(&rig).await;

    let soft = lifecycle(&rig).soft_cancel(order.clone()).await;
    assert_eq!(soft.state, OrderState::Canceled);
    assert!(soft.soft_canceled);
    // no chain transaction: remote record still open
    assert_eq!(rig.exchange.get_by_id(order.id).await.unwrap().state, 0);
    assert!(rig.deps.logs.get_pending_cancel_logs().await.is_empty());
}

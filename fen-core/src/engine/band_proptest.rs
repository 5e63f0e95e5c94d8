//! Property-based tests for band containment classification
//!
//! Randomized inputs check the invariants the band engine relies on: an
//! order at the target is always contained, side symmetry holds, and as the
//! reference price sweeps, the status passes through the tolerance boundary
//! instead of jumping across it.

#[cfg(test)]
mod tests {
    use crate::core::pricing;
    use crate::core::types::{ContainmentStatus, OrderState, Side};
    use crate::engine::band::containment_status;
    use crate::services::{TokenInfo, TokenPair};
    use crate::store::entities::{Band, Order};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn pair() -> TokenPair {
        TokenPair {
            base: TokenInfo {
                symbol: "ZRX".into(),
                address: "0xbase".into(),
                decimals: 18,
            },
            quote: TokenInfo {
                symbol: "WETH".into(),
                address: "0xquote".into(),
                decimals: 18,
            },
        }
    }

    fn band(side: Side, spread_bps: u32, tolerance_bps: u32) -> Band {
        Band {
            id: 1,
            market_id: 1,
            side,
            spread_bps,
            tolerance_bps,
            units: 100,
            min_units: 50,
            expiration_seconds: 600,
        }
    }

    fn order_at(side: Side, price: Decimal) -> Order {
        let (maker, taker) = pricing::order_amounts(side, Decimal::from(1_000_000u64), price, 18, 18);
        Order {
            id: 1,
            order_hash: "0xorder".into(),
            source: "fen".into(),
            maker_token_amount: maker,
            taker_token_amount: taker,
            remaining_taker_amount: taker,
            expiration_unix: u64::MAX,
            state: OrderState::Open,
            side,
            market_id: 1,
            band_id: Some(1),
            soft_canceled: false,
        }
    }

    /// Property: an order priced exactly at the band's target is contained
    /// at every price/spread/tolerance combination
    #[test]
    fn prop_order_at_target_is_contained() {
        proptest!(|(price in 1u32..1_000_000, spread in 2u32..500, tol_frac in 0u32..100)| {
            let price = Decimal::from(price);
            let tolerance = 1 + tol_frac * (spread - 1) / 100;
            prop_assume!(tolerance < spread);

            for side in [Side::Buy, Side::Sell] {
                let band = band(side, spread, tolerance);
                let order = order_at(side, pricing::target_price(price, side, spread));
                prop_assert_eq!(
                    containment_status(price, &order, &band, &pair()),
                    Some(ContainmentStatus::Contained)
                );
            }
        });
    }

    /// Property: buy and sell classifications mirror each other for orders
    /// displaced the same relative distance from their targets
    #[test]
    fn prop_side_symmetry() {
        proptest!(|(price in 100u32..1_000_000, spread in 2u32..400, shift_bps in 1u32..2000)| {
            let price = Decimal::from(price);
            let tolerance = spread / 2;
            prop_assume!(tolerance >= 1);
            // exactly on the tolerance boundary, amount rounding could tip
            // the two sides differently
            prop_assume!(shift_bps != tolerance);

            let shift = pricing::absolute_offset(price, shift_bps);

            let buy_band = band(Side::Buy, spread, tolerance);
            let buy_low = order_at(Side::Buy, pricing::target_price(price, Side::Buy, spread) - shift);
            let sell_band = band(Side::Sell, spread, tolerance);
            let sell_high = order_at(Side::Sell, pricing::target_price(price, Side::Sell, spread) + shift);

            // equal displacement away from midprice is harmless on both sides
            let buy_status = containment_status(price, &buy_low, &buy_band, &pair());
            let sell_status = containment_status(price, &sell_high, &sell_band, &pair());
            prop_assert_eq!(buy_status, sell_status);
            prop_assert_ne!(buy_status, Some(ContainmentStatus::LossRisk));
        });
    }

    /// Property: sweeping the reference price upward moves a fixed buy order
    /// monotonically loss-risk -> contained -> no-loss-risk, never skipping
    /// back
    #[test]
    fn prop_buy_status_sweep_is_monotonic() {
        proptest!(|(order_price in 1000u32..100_000, spread in 2u32..400, steps in 10usize..40)| {
            let order_price = Decimal::from(order_price);
            let tolerance = spread / 2;
            prop_assume!(tolerance >= 1);

            let band = band(Side::Buy, spread, tolerance);
            let order = order_at(Side::Buy, order_price);

            // sweep from well below to well above the order's price
            let lo = order_price / Decimal::from(2u32);
            let hi = order_price * Decimal::from(2u32);
            let step = (hi - lo) / Decimal::from(steps as u32);

            let mut rank_seen = 0u8;
            let mut reference = lo;
            for _ in 0..=steps {
                let status = containment_status(reference, &order, &band, &pair()).unwrap();
                let rank = match status {
                    ContainmentStatus::LossRisk => 0,
                    ContainmentStatus::Contained => 1,
                    ContainmentStatus::NoLossRisk => 2,
                };
                prop_assert!(rank >= rank_seen, "status regressed at reference {}", reference);
                rank_seen = rank;
                reference += step;
            }
        });
    }
}

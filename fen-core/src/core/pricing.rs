//! Band price math
//!
//! All prices are unit prices (quote per base). Token amounts on orders are
//! carried in base-unit ("wei") scale, so converting between an order's
//! maker/taker amounts and a unit price has to account for the two tokens'
//! decimals. Exact decimal arithmetic throughout - a rounding error here is a
//! mispriced order.

use crate::core::types::Side;
use rust_decimal::Decimal;

const BPS_DENOMINATOR: u32 = 10_000;

/// 10^exp as an exact Decimal; negative exponents are exact too
/// (Decimal scales go down to 1e-28, far below any token's precision).
pub fn pow10(exp: i32) -> Decimal {
    if exp >= 0 {
        Decimal::from_i128_with_scale(10i128.pow(exp as u32), 0)
    } else {
        Decimal::new(1, (-exp) as u32)
    }
}

/// Absolute price offset for a basis-point value: `price * bps / 10000`
pub fn absolute_offset(price: Decimal, bps: u32) -> Decimal {
    price * Decimal::from(bps) / Decimal::from(BPS_DENOMINATOR)
}

/// The price a band targets at the given reference price
///
/// Buy bands rest below the reference, sell bands above.
pub fn target_price(price: Decimal, side: Side, spread_bps: u32) -> Decimal {
    let spread = absolute_offset(price, spread_bps);
    match side {
        Side::Buy => price - spread,
        Side::Sell => price + spread,
    }
}

/// Unit price of an existing order from its wei-scale maker/taker amounts
///
/// A buy order makes quote token and takes base token; a sell order is the
/// reverse. Returns `None` when the divisor amount is zero (a malformed
/// remote order, not a price).
pub fn order_price(
    side: Side,
    maker_amount: Decimal,
    taker_amount: Decimal,
    base_decimals: u32,
    quote_decimals: u32,
) -> Option<Decimal> {
    let raw = match side {
        Side::Buy => {
            if taker_amount.is_zero() {
                return None;
            }
            maker_amount / taker_amount
        }
        Side::Sell => {
            if maker_amount.is_zero() {
                return None;
            }
            taker_amount / maker_amount
        }
    };
    // raw is quote-wei per base-wei; rescale to a unit price
    Some(raw * pow10(base_decimals as i32 - quote_decimals as i32))
}

/// Maker/taker wei amounts for a new limit order
///
/// `quantity` is in base-token wei for both sides; the counter-amount is
/// derived from the unit price, rounded to a whole wei.
pub fn order_amounts(
    side: Side,
    quantity: Decimal,
    price: Decimal,
    base_decimals: u32,
    quote_decimals: u32,
) -> (Decimal, Decimal) {
    // unit price -> quote-wei per base-wei
    let wei_price = price * pow10(quote_decimals as i32 - base_decimals as i32);
    match side {
        Side::Buy => {
            let taker = quantity;
            let maker = (taker * wei_price).round();
            (maker, taker)
        }
        Side::Sell => {
            let maker = quantity;
            let taker = (maker * wei_price).round();
            (maker, taker)
        }
    }
}

/// Convert a quote-wei quantity into base-wei at the given unit price
///
/// Used when sizing buy orders: the reserve is denominated in quote token but
/// the order quantity parameter is denominated in base token.
pub fn quote_to_base(
    quote_amount: Decimal,
    price: Decimal,
    base_decimals: u32,
    quote_decimals: u32,
) -> Decimal {
    (quote_amount / price * pow10(base_decimals as i32 - quote_decimals as i32)).round()
}

/// Remaining quantity of an order in maker-token wei
///
/// Normalizes the remaining taker amount through the order's own price ratio.
pub fn remaining_maker_amount(
    remaining_taker: Decimal,
    maker_amount: Decimal,
    taker_amount: Decimal,
) -> Decimal {
    if taker_amount.is_zero() {
        return Decimal::ZERO;
    }
    remaining_taker * maker_amount / taker_amount
}

/// Wei-scale value -> whole-unit value for a token with the given decimals
pub fn to_unit_amount(value: Decimal, decimals: u32) -> Decimal {
    value * pow10(-(decimals as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pow10() {
        assert_eq!(pow10(0), dec!(1));
        assert_eq!(pow10(3), dec!(1000));
        assert_eq!(pow10(-2), dec!(0.01));
    }

    #[test]
    fn test_absolute_offset() {
        // 50 bps of 100 is 0.5
        assert_eq!(absolute_offset(dec!(100), 50), dec!(0.5));
        assert_eq!(absolute_offset(dec!(100), 0), dec!(0));
    }

    #[test]
    fn test_target_price_by_side() {
        assert_eq!(target_price(dec!(100), Side::Buy, 50), dec!(99.5));
        assert_eq!(target_price(dec!(100), Side::Sell, 50), dec!(100.5));
    }

    #[test]
    fn test_order_price_buy() {
        // buy: makes 995 quote-wei for 10 base-wei, both tokens 18 decimals
        let price = order_price(Side::Buy, dec!(995), dec!(10), 18, 18).unwrap();
        assert_eq!(price, dec!(99.5));
    }

    #[test]
    fn test_order_price_sell() {
        let price = order_price(Side::Sell, dec!(10), dec!(1005), 18, 18).unwrap();
        assert_eq!(price, dec!(100.5));
    }

    #[test]
    fn test_order_price_decimal_mismatch() {
        // base has 8 decimals, quote 18: 1 base unit = 1e8 wei
        // selling 1e8 base-wei for 100e18 quote-wei is a unit price of 100
        let price = order_price(Side::Sell, dec!(100000000), dec!(100000000000000000000), 8, 18)
            .unwrap();
        assert_eq!(price, dec!(100));
    }

    #[test]
    fn test_order_price_zero_divisor() {
        assert!(order_price(Side::Buy, dec!(1), dec!(0), 18, 18).is_none());
        assert!(order_price(Side::Sell, dec!(0), dec!(1), 18, 18).is_none());
    }

    #[test]
    fn test_order_amounts_round_trip() {
        let (maker, taker) = order_amounts(Side::Sell, dec!(1000), dec!(99.5), 18, 18);
        assert_eq!(maker, dec!(1000));
        assert_eq!(taker, dec!(99500));
        let price = order_price(Side::Sell, maker, taker, 18, 18).unwrap();
        assert_eq!(price, dec!(99.5));
    }

    #[test]
    fn test_quote_to_base() {
        // 199 quote-wei at price 99.5 buys 2 base-wei (same decimals)
        assert_eq!(quote_to_base(dec!(199), dec!(99.5), 18, 18), dec!(2));
    }

    #[test]
    fn test_remaining_maker_amount() {
        // half the taker amount remains -> half the maker amount remains
        let remaining = remaining_maker_amount(dec!(50), dec!(1000), dec!(100));
        assert_eq!(remaining, dec!(500));
        assert_eq!(remaining_maker_amount(dec!(1), dec!(1), dec!(0)), dec!(0));
    }

    #[test]
    fn test_to_unit_amount() {
        assert_eq!(to_unit_amount(dec!(1500000000000000000), 18), dec!(1.5));
    }
}

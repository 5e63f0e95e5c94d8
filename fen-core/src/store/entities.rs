//! Persisted entities and their typed query filters
//!
//! The store has plain document semantics: each entity type lives in its own
//! collection, mutations target single records keyed by id, and queries are
//! expressed with per-entity filter structs (every field optional, `None`
//! matches everything). No cross-collection transactions exist or are needed.

use crate::core::pricing;
use crate::core::types::{
    BandId, CancellationMode, GasAmount, LogId, MarketId, OrderId, OrderState, Severity, Side,
};
use crate::store::repository::Entity;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A configured trading pair
///
/// At most one market may exist per (base, quote) pair. The reserve fields
/// bound how much capital the engine will commit (`max_*`) and how far the
/// wallet may be drawn down before the watchdog halts a side or the whole
/// market (`min_*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub label: String,
    /// Wallet account the market trades from
    pub account: String,
    pub base_token_symbol: String,
    pub quote_token_symbol: String,
    pub min_base_amount: Decimal,
    pub max_base_amount: Decimal,
    pub min_quote_amount: Decimal,
    pub max_quote_amount: Decimal,
    pub min_eth_amount: Decimal,
    pub active: bool,
    pub cancellation_mode: CancellationMode,
}

#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    pub id: Option<MarketId>,
    pub active: Option<bool>,
    /// (base symbol, quote symbol)
    pub pair: Option<(String, String)>,
}

impl MarketFilter {
    pub fn by_id(id: MarketId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

impl Entity for Market {
    type Filter = MarketFilter;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn matches(&self, filter: &MarketFilter) -> bool {
        if let Some(id) = filter.id {
            if self.id != id {
                return false;
            }
        }
        if let Some(active) = filter.active {
            if self.active != active {
                return false;
            }
        }
        if let Some((base, quote)) = &filter.pair {
            if &self.base_token_symbol != base || &self.quote_token_symbol != quote {
                return false;
            }
        }
        true
    }
}

/// One price layer of the ladder for one side of one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub id: BandId,
    pub market_id: MarketId,
    pub side: Side,
    /// Target offset from the reference price, in basis points
    pub spread_bps: u32,
    /// Allowed drift before reaction; strictly less than `spread_bps`
    pub tolerance_bps: u32,
    /// Relative capital weight vs sibling bands of the same side
    pub units: u32,
    /// Minimum fill threshold before an additional order is opened
    pub min_units: u32,
    pub expiration_seconds: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BandFilter {
    pub id: Option<BandId>,
    pub market_id: Option<MarketId>,
    pub side: Option<Side>,
}

impl BandFilter {
    pub fn by_id(id: BandId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

impl Entity for Band {
    type Filter = BandFilter;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn matches(&self, filter: &BandFilter) -> bool {
        if let Some(id) = filter.id {
            if self.id != id {
                return false;
            }
        }
        if let Some(market_id) = filter.market_id {
            if self.market_id != market_id {
                return false;
            }
        }
        if let Some(side) = filter.side {
            if self.side != side {
                return false;
            }
        }
        true
    }
}

/// Local mirror of a remote limit order
///
/// Owned exclusively by the order lifecycle manager and the band engine;
/// nothing else mutates these records. `band_id == None` means the order is
/// orphaned - open and chain-valid, but not currently bound to any band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Assigned by the remote exchange upon creation
    pub id: OrderId,
    pub order_hash: String,
    pub source: String,
    /// Wei-scale amount the maker committed
    pub maker_token_amount: Decimal,
    /// Wei-scale amount the maker asks for
    pub taker_token_amount: Decimal,
    pub remaining_taker_amount: Decimal,
    pub expiration_unix: u64,
    pub state: OrderState,
    pub side: Side,
    pub market_id: MarketId,
    pub band_id: Option<BandId>,
    /// True while the order is off the visible book but still chain-valid
    pub soft_canceled: bool,
}

impl Order {
    pub fn is_expired(&self, now_unix: u64) -> bool {
        self.expiration_unix <= now_unix
    }

    /// Remaining quantity in maker-token wei, via the order's own price ratio
    pub fn remaining_maker_amount(&self) -> Decimal {
        pricing::remaining_maker_amount(
            self.remaining_taker_amount,
            self.maker_token_amount,
            self.taker_token_amount,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub market_id: Option<MarketId>,
    pub band_id: Option<BandId>,
    /// `Some(true)` matches only orders bound to no band
    pub orphaned: Option<bool>,
    pub state: Option<OrderState>,
    pub side: Option<Side>,
    pub soft_canceled: Option<bool>,
}

impl Entity for Order {
    type Filter = OrderFilter;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn matches(&self, filter: &OrderFilter) -> bool {
        if let Some(market_id) = filter.market_id {
            if self.market_id != market_id {
                return false;
            }
        }
        if let Some(band_id) = filter.band_id {
            if self.band_id != Some(band_id) {
                return false;
            }
        }
        if let Some(orphaned) = filter.orphaned {
            if self.band_id.is_none() != orphaned {
                return false;
            }
        }
        if let Some(state) = filter.state {
            if self.state != state {
                return false;
            }
        }
        if let Some(side) = filter.side {
            if self.side != side {
                return false;
            }
        }
        if let Some(soft_canceled) = filter.soft_canceled {
            if self.soft_canceled != soft_canceled {
                return false;
            }
        }
        true
    }
}

/// What an audit entry correlates to
///
/// Cancel entries carry a snapshot of the order at cancellation time plus the
/// gas accounting state; the snapshot is immutable, the gas transitions from
/// `Mining` to a settled value or `Unknown`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Market {
        market_id: MarketId,
    },
    Band {
        band_id: BandId,
    },
    Cancel {
        tx_hash: String,
        order: Order,
        gas: GasAmount,
    },
}

/// Append-only audit entry
///
/// Operators observe failures exclusively through these records; background
/// loops never throw past their tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogId,
    pub created_at: u64,
    pub severity: Severity,
    pub message: String,
    pub kind: LogKind,
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub market_id: Option<MarketId>,
    pub band_id: Option<BandId>,
    /// Matches only cancel entries
    pub cancels_only: bool,
    /// Matches only cancel entries whose gas is still mining
    pub pending_cancels_only: bool,
}

impl Entity for LogEntry {
    type Filter = LogFilter;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn matches(&self, filter: &LogFilter) -> bool {
        if let Some(market_id) = filter.market_id {
            if !matches!(&self.kind, LogKind::Market { market_id: m } if *m == market_id) {
                return false;
            }
        }
        if let Some(band_id) = filter.band_id {
            if !matches!(&self.kind, LogKind::Band { band_id: b } if *b == band_id) {
                return false;
            }
        }
        if filter.cancels_only && !matches!(&self.kind, LogKind::Cancel { .. }) {
            return false;
        }
        if filter.pending_cancels_only {
            if !matches!(&self.kind, LogKind::Cancel { gas, .. } if gas.is_pending()) {
                return false;
            }
        }
        true
    }
}

/// Point-in-time balance snapshot for a market
///
/// Appended by the reserve watchdog only when it differs from the latest
/// stored snapshot, so a no-op steady state does not grow history unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub id: u64,
    pub market_id: MarketId,
    pub base_balance: Decimal,
    pub base_usd_balance: Decimal,
    pub quote_balance: Decimal,
    pub quote_usd_balance: Decimal,
    pub eth_balance: Decimal,
    pub eth_usd_balance: Decimal,
    /// Open maker amounts aggregated from currently open orders, by side
    pub open_base_amount: Decimal,
    pub open_quote_amount: Decimal,
    pub created_at: u64,
}

impl MarketStats {
    /// Whether two snapshots describe the same balances (USD equivalents and
    /// timestamps excluded - a pure price move should not append history).
    pub fn same_balances(&self, other: &MarketStats) -> bool {
        self.base_balance == other.base_balance
            && self.quote_balance == other.quote_balance
            && self.eth_balance == other.eth_balance
            && self.open_base_amount == other.open_base_amount
            && self.open_quote_amount == other.open_quote_amount
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketStatsFilter {
    pub market_id: Option<MarketId>,
}

impl Entity for MarketStats {
    type Filter = MarketStatsFilter;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn matches(&self, filter: &MarketStatsFilter) -> bool {
        match filter.market_id {
            Some(market_id) => self.market_id == market_id,
            None => true,
        }
    }
}

//! Core domain types for the band market maker
//!
//! Everything that crosses a component boundary lives here: sides, order
//! states, cancellation modes and the gas accounting of hard cancellations.
//! All monetary values are `rust_decimal::Decimal` - native floats are never
//! used for prices or token amounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a configured market (store-assigned)
pub type MarketId = u64;

/// Identifier of a band (store-assigned)
pub type BandId = u64;

/// Identifier of an order (assigned by the remote exchange on creation)
pub type OrderId = u64;

/// Identifier of a log entry (store-assigned)
pub type LogId = u64;

/// Order side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The opposite side
    pub fn flip(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Local mirror of the remote order lifecycle
///
/// Closed variant set; the remote exchange reports these as small integers
/// (see [`OrderState::from_remote_code`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    /// Active in the remote book (or soft-canceled but still chain-valid)
    Open,
    /// Canceled (hard or soft - see `Order::soft_canceled`)
    Canceled,
    /// Fully filled
    Filled,
    /// Expired by its own timestamp
    Expired,
    /// Removed by the remote exchange
    Removed,
    /// A hard cancellation has been broadcast but not yet mined
    PendingCancel,
}

impl OrderState {
    /// Map a remote state code to a local state
    ///
    /// Code 0 is "open"; everything else is a terminal or in-flight state.
    pub fn from_remote_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(OrderState::Open),
            1 => Some(OrderState::Canceled),
            2 => Some(OrderState::Filled),
            3 => Some(OrderState::Expired),
            4 => Some(OrderState::Removed),
            5 => Some(OrderState::PendingCancel),
            _ => None,
        }
    }

    /// Whether this state means the order can no longer be filled
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderState::Open)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderState::Open => "open",
            OrderState::Canceled => "canceled",
            OrderState::Filled => "filled",
            OrderState::Expired => "expired",
            OrderState::Removed => "removed",
            OrderState::PendingCancel => "pending-cancel",
        };
        write!(f, "{}", s)
    }
}

/// How a market retires orders that are no longer wanted but not losing money
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellationMode {
    /// On-chain cancellation; costs gas, guarantees unfillability once mined
    Hard,
    /// Off-book removal only; the order stays chain-valid until it expires
    Soft,
}

/// Severity of an audit log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Success,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Success => "success",
            Severity::Info => "info",
        };
        write!(f, "{}", s)
    }
}

/// Gas accounting state of a hard cancellation
///
/// Starts at `Mining` when the transaction is broadcast; the receipt watcher
/// settles it to `Settled(cost)` once mined, or `Unknown` after the staleness
/// timeout. `Unknown` and `Settled` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasAmount {
    Mining,
    Unknown,
    Settled(Decimal),
}

impl GasAmount {
    pub fn is_pending(&self) -> bool {
        matches!(self, GasAmount::Mining)
    }
}

impl fmt::Display for GasAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasAmount::Mining => write!(f, "mining"),
            GasAmount::Unknown => write!(f, "unknown"),
            GasAmount::Settled(cost) => write!(f, "{}", cost),
        }
    }
}

/// Containment of an existing order's price relative to a band's target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainmentStatus {
    /// Within target +/- tolerance; keep resting
    Contained,
    /// Drifted to the counterparty's favor; must be pulled immediately
    LossRisk,
    /// Drifted the harmless direction; stale but not dangerous
    NoLossRisk,
}

/// Current unix time in whole seconds
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

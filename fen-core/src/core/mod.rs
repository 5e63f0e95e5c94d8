//! Core domain types, errors and price math

pub mod errors;
pub mod pricing;
pub mod types;

pub use errors::EngineError;
pub use types::{
    BandId, CancellationMode, ContainmentStatus, GasAmount, LogId, MarketId, OrderId, OrderState,
    Severity, Side,
};

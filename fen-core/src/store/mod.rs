//! Entity records and the persistence contract

pub mod entities;
pub mod repository;

pub use entities::{
    Band, BandFilter, LogEntry, LogFilter, LogKind, Market, MarketFilter, MarketStats,
    MarketStatsFilter, Order, OrderFilter,
};
pub use repository::{Entity, FindOptions, MemoryRepository, Repository, SortFn};

//! Persistence contract and the in-memory document store
//!
//! The engine only ever talks to [`Repository<T>`]; every read goes back to
//! the store so it stays the single source of truth across ticks. The bundled
//! [`MemoryRepository`] backs tests and paper trading; a real deployment
//! plugs a document database behind the same trait.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// A persisted record with an id and a typed query filter
pub trait Entity: Clone + Send + Sync + 'static {
    type Filter: Send + Sync;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
    fn matches(&self, filter: &Self::Filter) -> bool;
}

/// Comparator used to order query results
pub type SortFn<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Query modifiers: sort, pagination
pub struct FindOptions<T> {
    pub sort: Option<SortFn<T>>,
    pub limit: Option<usize>,
    pub skip: usize,
}

impl<T> Default for FindOptions<T> {
    fn default() -> Self {
        Self {
            sort: None,
            limit: None,
            skip: 0,
        }
    }
}

impl<T> FindOptions<T> {
    /// Sorted query, no pagination
    pub fn sorted(cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static) -> Self {
        Self {
            sort: Some(Box::new(cmp)),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document-store persistence, one instance per entity type
///
/// Each mutation targets a single record; no transactions span repositories.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Insert a record, assigning an id if the record carries none (id 0).
    /// Records that already carry an id (e.g. orders keyed by their remote
    /// exchange id) keep it.
    async fn create(&self, item: T) -> Result<T>;

    async fn find(&self, filter: &T::Filter, options: FindOptions<T>) -> Result<Vec<T>>;

    async fn find_one(&self, filter: &T::Filter) -> Result<Option<T>>;

    /// Replace the record with the same id
    async fn update(&self, item: &T) -> Result<()>;

    async fn count(&self, filter: &T::Filter) -> Result<u64>;

    /// Remove all matching records, returning how many were removed
    async fn delete(&self, filter: &T::Filter) -> Result<u64>;
}

/// In-memory repository with document-store semantics
pub struct MemoryRepository<T> {
    items: RwLock<Vec<T>>,
    next_id: AtomicU64,
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn create(&self, mut item: T) -> Result<T> {
        if item.id() == 0 {
            item.set_id(self.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        }
        let mut items = self.items.write();
        if items.iter().any(|existing| existing.id() == item.id()) {
            return Err(anyhow!("duplicate id {}", item.id()));
        }
        items.push(item.clone());
        Ok(item)
    }

    async fn find(&self, filter: &T::Filter, options: FindOptions<T>) -> Result<Vec<T>> {
        let items = self.items.read();
        let mut matched: Vec<T> = items
            .iter()
            .filter(|item| item.matches(filter))
            .cloned()
            .collect();
        drop(items);

        if let Some(cmp) = &options.sort {
            matched.sort_by(|a, b| cmp(a, b));
        }
        let matched: Vec<T> = matched
            .into_iter()
            .skip(options.skip)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(matched)
    }

    async fn find_one(&self, filter: &T::Filter) -> Result<Option<T>> {
        let items = self.items.read();
        Ok(items.iter().find(|item| item.matches(filter)).cloned())
    }

    async fn update(&self, item: &T) -> Result<()> {
        let mut items = self.items.write();
        match items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => Err(anyhow!("no record with id {}", item.id())),
        }
    }

    async fn count(&self, filter: &T::Filter) -> Result<u64> {
        let items = self.items.read();
        Ok(items.iter().filter(|item| item.matches(filter)).count() as u64)
    }

    async fn delete(&self, filter: &T::Filter) -> Result<u64> {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|item| !item.matches(filter));
        Ok((before - items.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Side;
    use crate::store::entities::{Band, BandFilter};

    fn band(id: u64, market_id: u64, side: Side, spread_bps: u32) -> Band {
        Band {
            id,
            market_id,
            side,
            spread_bps,
            tolerance_bps: spread_bps / 2,
            units: 100,
            min_units: 50,
            expiration_seconds: 600,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let repo = MemoryRepository::<Band>::new();
        let a = repo.create(band(0, 1, Side::Buy, 50)).await.unwrap();
        let b = repo.create(band(0, 1, Side::Buy, 100)).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn test_create_keeps_existing_id() {
        let repo = MemoryRepository::<Band>::new();
        let a = repo.create(band(42, 1, Side::Buy, 50)).await.unwrap();
        assert_eq!(a.id, 42);
        assert!(repo.create(band(42, 1, Side::Buy, 60)).await.is_err());
    }

    #[tokio::test]
    async fn test_find_filter_and_sort() {
        let repo = MemoryRepository::<Band>::new();
        repo.create(band(0, 1, Side::Buy, 100)).await.unwrap();
        repo.create(band(0, 1, Side::Buy, 50)).await.unwrap();
        repo.create(band(0, 1, Side::Sell, 75)).await.unwrap();
        repo.create(band(0, 2, Side::Buy, 25)).await.unwrap();

        let filter = BandFilter {
            market_id: Some(1),
            side: Some(Side::Buy),
            ..Default::default()
        };
        let found = repo
            .find(&filter, FindOptions::sorted(|a: &Band, b: &Band| {
                a.spread_bps.cmp(&b.spread_bps)
            }))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].spread_bps, 50);
        assert_eq!(found[1].spread_bps, 100);
    }

    #[tokio::test]
    async fn test_limit_and_skip() {
        let repo = MemoryRepository::<Band>::new();
        for spread in [10, 20, 30, 40] {
            repo.create(band(0, 1, Side::Buy, spread)).await.unwrap();
        }
        let mut options = FindOptions::sorted(|a: &Band, b: &Band| a.spread_bps.cmp(&b.spread_bps))
            .with_limit(2);
        options.skip = 1;
        let found = repo.find(&BandFilter::default(), options).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].spread_bps, 20);
        assert_eq!(found[1].spread_bps, 30);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = MemoryRepository::<Band>::new();
        let mut stored = repo.create(band(0, 1, Side::Buy, 50)).await.unwrap();
        stored.units = 300;
        repo.update(&stored).await.unwrap();

        let found = repo
            .find_one(&BandFilter::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.units, 300);

        let removed = repo
            .delete(&BandFilter {
                market_id: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(repo.count(&BandFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_record_fails() {
        let repo = MemoryRepository::<Band>::new();
        let ghost = band(9, 1, Side::Buy, 50);
        assert!(repo.update(&ghost).await.is_err());
    }
}

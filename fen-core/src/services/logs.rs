//! Operator-facing audit log
//!
//! Operators observe every failure through these records, not through
//! exceptions: background loops degrade to "do nothing more this tick" and
//! leave a log entry behind. A failed log write is reported on the developer
//! trace and otherwise dropped - the audit trail must never take down a tick.

use crate::core::types::{now_unix, BandId, GasAmount, MarketId, Severity};
use crate::store::entities::{LogEntry, LogFilter, LogKind, Order};
use crate::store::repository::{FindOptions, Repository};
use std::sync::Arc;
use tracing::error;

/// Most recent entries returned by the per-market/per-band getters
const LOG_PAGE_SIZE: usize = 100;

pub struct LogService {
    repo: Arc<dyn Repository<LogEntry>>,
}

impl LogService {
    pub fn new(repo: Arc<dyn Repository<LogEntry>>) -> Self {
        Self { repo }
    }

    pub async fn add_market_log(&self, severity: Severity, market_id: MarketId, message: impl Into<String>) {
        self.add(severity, message.into(), LogKind::Market { market_id })
            .await;
    }

    pub async fn add_band_log(&self, severity: Severity, band_id: BandId, message: impl Into<String>) {
        self.add(severity, message.into(), LogKind::Band { band_id })
            .await;
    }

    /// Record a broadcast hard cancellation; gas starts in `Mining` and is
    /// settled later by the receipt watcher.
    pub async fn add_cancel_log(&self, tx_hash: impl Into<String>, order: Order, message: impl Into<String>) {
        self.add(
            Severity::Info,
            message.into(),
            LogKind::Cancel {
                tx_hash: tx_hash.into(),
                order,
                gas: GasAmount::Mining,
            },
        )
        .await;
    }

    async fn add(&self, severity: Severity, message: String, kind: LogKind) {
        let entry = LogEntry {
            id: 0,
            created_at: now_unix(),
            severity,
            message,
            kind,
        };
        if let Err(err) = self.repo.create(entry).await {
            error!("failed to write audit log: {err:#}");
        }
    }

    /// Settle or give up on a cancel entry's gas accounting. The only
    /// permitted mutation of a written log.
    pub async fn set_cancel_gas(&self, entry: &LogEntry, gas: GasAmount) {
        let mut updated = entry.clone();
        match &mut updated.kind {
            LogKind::Cancel { gas: slot, .. } => *slot = gas,
            _ => {
                error!("attempted to set gas on a non-cancel log {}", entry.id);
                return;
            }
        }
        if let Err(err) = self.repo.update(&updated).await {
            error!("failed to update cancel log {}: {err:#}", entry.id);
        }
    }

    /// Cancel entries whose gas is still mining
    pub async fn get_pending_cancel_logs(&self) -> Vec<LogEntry> {
        let filter = LogFilter {
            pending_cancels_only: true,
            ..Default::default()
        };
        self.repo
            .find(&filter, FindOptions::default())
            .await
            .unwrap_or_else(|err| {
                error!("failed to read pending cancel logs: {err:#}");
                Vec::new()
            })
    }

    pub async fn get_all_cancel_logs(&self) -> Vec<LogEntry> {
        let filter = LogFilter {
            cancels_only: true,
            ..Default::default()
        };
        self.repo
            .find(&filter, Self::newest_first())
            .await
            .unwrap_or_else(|err| {
                error!("failed to read cancel logs: {err:#}");
                Vec::new()
            })
    }

    pub async fn market_logs(&self, market_id: MarketId) -> Vec<LogEntry> {
        let filter = LogFilter {
            market_id: Some(market_id),
            ..Default::default()
        };
        self.repo
            .find(&filter, Self::newest_first().with_limit(LOG_PAGE_SIZE))
            .await
            .unwrap_or_default()
    }

    pub async fn band_logs(&self, band_id: BandId) -> Vec<LogEntry> {
        let filter = LogFilter {
            band_id: Some(band_id),
            ..Default::default()
        };
        self.repo
            .find(&filter, Self::newest_first().with_limit(LOG_PAGE_SIZE))
            .await
            .unwrap_or_default()
    }

    fn newest_first() -> FindOptions<LogEntry> {
        // timestamps are whole seconds; ids break ties between entries
        // written within the same second
        FindOptions::sorted(|a: &LogEntry, b: &LogEntry| {
            b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
        })
    }
}

//! Cancellation receipt reconciler
//!
//! Hard cancellations are broadcast chain transactions: the cancel log is
//! written with its gas still mining, and this loop polls for the mined
//! receipt to settle the cost. A receipt that has not appeared within the
//! staleness threshold is recorded as unknown and never retried; the
//! transaction cannot be un-sent, only its accounting given up on.

use crate::core::types::{now_unix, GasAmount};
use crate::engine::EngineDeps;
use crate::store::entities::LogKind;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub struct CancellationWatcher {
    deps: Arc<EngineDeps>,
}

impl CancellationWatcher {
    pub fn new(deps: Arc<EngineDeps>) -> Self {
        Self { deps }
    }

    pub async fn run(self: Arc<Self>, shutdown: Arc<AtomicBool>) {
        let period = Duration::from_secs(self.deps.config.cancellation_tick_secs);
        let watcher = self.clone();
        super::run_ticks(period, shutdown, move || {
            let watcher = watcher.clone();
            async move { watcher.tick().await }
        })
        .await;
    }

    /// Settle or expire every cancel log whose gas is still mining
    pub async fn tick(&self) {
        let timeout = self.deps.config.cancel_receipt_timeout_secs;
        let now = now_unix();

        for entry in self.deps.logs.get_pending_cancel_logs().await {
            let tx_hash = match &entry.kind {
                LogKind::Cancel { tx_hash, .. } => tx_hash.clone(),
                _ => continue,
            };

            match self.deps.trading.get_cancel_receipt(&tx_hash).await {
                Ok(receipt) => {
                    self.deps
                        .logs
                        .set_cancel_gas(&entry, GasAmount::Settled(receipt.gas_cost))
                        .await;
                }
                Err(_) => {
                    // not yet mined (or lookup failed); give up once stale
                    if entry.created_at + timeout < now {
                        self.deps.logs.set_cancel_gas(&entry, GasAmount::Unknown).await;
                    }
                }
            }
        }
    }
}

//! Background polling loops
//!
//! Each watcher runs on its own independent timer; nothing is event-driven.
//! A tick that fails internally logs and returns cleanly so the loop always
//! reaches the next tick. Loops exit when the shared shutdown flag flips.

pub mod cancellations;
pub mod market_watcher;
pub mod soft_cancellations;

pub use cancellations::CancellationWatcher;
pub use market_watcher::MarketWatcher;
pub use soft_cancellations::SoftCancellationWatcher;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Drive a watcher tick on a fixed interval until shutdown is requested
pub(crate) async fn run_ticks<F, Fut>(
    period: Duration,
    shutdown: Arc<AtomicBool>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if shutdown.load(Ordering::Acquire) {
            return;
        }
        tick().await;
    }
}

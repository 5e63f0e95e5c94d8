//! Fen - PAPER TRADING ONLY
//!
//! Wires the in-memory store and the simulated exchange, wallet and price
//! feed into a runnable paper-trading loop: one demo market with a two-band
//! ladder per side, all three watchers on their timers. No real orders are
//! placed and no funds are at risk.

use anyhow::Result;
use clap::Parser;
use fen_bins::common::{init_logging, CommonArgs};
use fen_core::core::pricing;
use fen_core::prelude::*;
use fen_core::services::{TokenInfo, TokenPair};
use fen_core::sim::{FixedPriceFeed, SimExchange, SimWallet, StaticTokenRegistry};
use fen_core::store::entities::{Band, LogEntry, Market, MarketStats, Order};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const ACCOUNT: &str = "0x00000000000000000000000000000000000f3n00";

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    init_logging(&args.log_level, args.json_logs)?;
    let config = args.engine_config()?;

    info!("=== Fen: band market maker, PAPER TRADING ===");
    warn!("PAPER TRADING MODE - no real orders will be placed");

    let pair = TokenPair {
        base: TokenInfo {
            symbol: "ZRX".into(),
            address: "0x0000000000000000000000000000000000002eb8".into(),
            decimals: 18,
        },
        quote: TokenInfo {
            symbol: "WETH".into(),
            address: "0x000000000000000000000000000000000000e286".into(),
            decimals: 18,
        },
    };

    let tokens: Arc<StaticTokenRegistry> = Arc::new(StaticTokenRegistry::new(vec![pair.clone()]));
    let feed = Arc::new(FixedPriceFeed::new());
    feed.set_price("ZRX", "WETH", dec!(0.00025));
    feed.set_price("ZRX", "USD", dec!(0.85));
    feed.set_price("WETH", "USD", dec!(3400));
    feed.set_price("ETH", "USD", dec!(3400));

    let wallet = Arc::new(SimWallet::new());
    // wei-scale balances: 40k ZRX, 10 WETH, 1 ETH for gas
    wallet.set_balance(ACCOUNT, &pair.base.address, dec!(40000) * pricing::pow10(18));
    wallet.set_balance(ACCOUNT, &pair.quote.address, dec!(10) * pricing::pow10(18));
    wallet.set_eth_balance(ACCOUNT, pricing::pow10(18));

    let exchange = Arc::new(SimExchange::new(tokens.clone(), config.order_source.clone()));

    let log_entries: Arc<MemoryRepository<LogEntry>> = Arc::new(MemoryRepository::new());
    let deps = Arc::new(EngineDeps {
        markets: Arc::new(MemoryRepository::<Market>::new()),
        bands: Arc::new(MemoryRepository::<Band>::new()),
        orders: Arc::new(MemoryRepository::<Order>::new()),
        stats: Arc::new(MemoryRepository::<MarketStats>::new()),
        log_entries: log_entries.clone(),
        logs: Arc::new(LogService::new(log_entries.clone())),
        price_feed: feed.clone(),
        trading: exchange.clone(),
        remote_orders: exchange.clone(),
        wallet: wallet.clone(),
        tokens: tokens.clone(),
        config,
    });

    let bands = Arc::new(BandEngine::new(deps.clone()));
    let markets = Arc::new(MarketService::new(deps.clone(), bands.clone()));

    let market = markets
        .create(Market {
            id: 0,
            label: "ZRX/WETH paper".into(),
            account: ACCOUNT.into(),
            base_token_symbol: "ZRX".into(),
            quote_token_symbol: "WETH".into(),
            min_base_amount: dec!(100) * pricing::pow10(18),
            max_base_amount: dec!(40000) * pricing::pow10(18),
            min_quote_amount: pricing::pow10(17),
            max_quote_amount: dec!(10) * pricing::pow10(18),
            min_eth_amount: pricing::pow10(16),
            active: false,
            cancellation_mode: CancellationMode::Soft,
        })
        .await?;
    info!("created market {} '{}'", market.id, market.label);

    for (side, spread_bps) in [
        (Side::Buy, 50),
        (Side::Buy, 100),
        (Side::Sell, 50),
        (Side::Sell, 100),
    ] {
        let band = bands
            .create(Band {
                id: 0,
                market_id: market.id,
                side,
                spread_bps,
                tolerance_bps: spread_bps / 2,
                units: 100,
                min_units: 50,
                expiration_seconds: 1200,
            })
            .await?;
        info!("created {} band {} at {} bps", side, band.id, spread_bps);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_ctrlc = shutdown.clone();
    ctrlc::set_handler(move || {
        warn!("received Ctrl+C, shutting down after the current tick");
        shutdown_ctrlc.store(true, Ordering::Release);
    })?;

    let market_watcher = Arc::new(MarketWatcher::new(deps.clone(), bands.clone(), markets.clone()));
    let cancel_watcher = Arc::new(CancellationWatcher::new(deps.clone()));
    let soft_watcher = Arc::new(SoftCancellationWatcher::new(deps.clone(), bands.clone()));

    let mut watchers = tokio::task::JoinSet::new();
    watchers.spawn(market_watcher.run(shutdown.clone()));
    watchers.spawn(cancel_watcher.run(shutdown.clone()));
    watchers.spawn(soft_watcher.run(shutdown.clone()));

    // the watchdog deactivates all markets at boot; activate after it starts
    tokio::time::sleep(Duration::from_millis(100)).await;
    markets.start(market.id).await?;
    info!("market {} started; ladder will build on the next tick", market.id);

    let mut status = tokio::time::interval(Duration::from_secs(30));
    status.tick().await;
    while !shutdown.load(Ordering::Acquire) {
        tokio::select! {
            _ = status.tick() => {
                if let Ok(Some(stats)) = markets.latest_stats(market.id).await {
                    info!(
                        "stats: base={} quote={} open_base={} open_quote={} ({} open sim orders)",
                        stats.base_balance,
                        stats.quote_balance,
                        stats.open_base_amount,
                        stats.open_quote_amount,
                        exchange.open_order_count(),
                    );
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
        }
    }

    info!("waiting for watchers to finish their ticks");
    while watchers.join_next().await.is_some() {}
    info!("paper trading session ended");
    Ok(())
}

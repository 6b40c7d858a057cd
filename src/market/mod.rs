//! Market data module
//!
//! Snapshots consumed by the execution simulator and position ledger.
//! The engine never produces market data; it only reads it through
//! [`MarketDataSource`].

mod cache;
mod snapshot;

pub use cache::SnapshotCache;
pub use snapshot::MarketSnapshot;

use async_trait::async_trait;

/// Trait for market data providers
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Latest usable snapshot for a symbol, `None` when absent or stale
    async fn snapshot(&self, symbol: &str) -> Option<MarketSnapshot>;
}

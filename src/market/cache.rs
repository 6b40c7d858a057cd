//! In-memory snapshot cache with staleness cutoff

use super::{MarketDataSource, MarketSnapshot};
use crate::clock::Clock;
use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Holds the most recent pushed snapshot per symbol
pub struct SnapshotCache {
    max_age: Duration,
    clock: Arc<dyn Clock>,
    snapshots: Arc<RwLock<HashMap<String, MarketSnapshot>>>,
}

impl SnapshotCache {
    /// Create a cache that treats snapshots older than `max_age` as absent
    pub fn new(max_age: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_age,
            clock,
            snapshots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a snapshot, replacing any older one for the same symbol
    pub async fn update(&self, snapshot: MarketSnapshot) {
        let mut snapshots = self.snapshots.write().await;
        match snapshots.get(&snapshot.symbol) {
            Some(existing) if existing.timestamp > snapshot.timestamp => {
                tracing::debug!(symbol = %snapshot.symbol, "Ignoring out-of-order snapshot");
            }
            _ => {
                snapshots.insert(snapshot.symbol.clone(), snapshot);
            }
        }
    }

    /// Drop the snapshot for a symbol
    pub async fn remove(&self, symbol: &str) {
        self.snapshots.write().await.remove(symbol);
    }
}

#[async_trait]
impl MarketDataSource for SnapshotCache {
    async fn snapshot(&self, symbol: &str) -> Option<MarketSnapshot> {
        let snapshots = self.snapshots.read().await;
        let snapshot = snapshots.get(symbol)?;
        if snapshot.age(self.clock.now()) > self.max_age {
            tracing::debug!(symbol, "Snapshot stale");
            return None;
        }
        Some(snapshot.clone())
    }
}

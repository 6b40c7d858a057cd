//! In-memory position store

use super::PositionStore;
use crate::execution::{SimulatedTrade, TradeId, TradeStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct PauseState {
    global: Option<String>,
    users: HashMap<String, String>,
}

/// Position store kept in process memory
#[derive(Default)]
pub struct InMemoryPositionStore {
    trades: Arc<RwLock<HashMap<TradeId, SimulatedTrade>>>,
    paused: Arc<RwLock<PauseState>>,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored record for a trade
    pub async fn get(&self, id: TradeId) -> Option<SimulatedTrade> {
        self.trades.read().await.get(&id).cloned()
    }

    /// Persisted pause reason affecting `user_id`, global pause first
    pub async fn paused_reason(&self, user_id: &str) -> Option<String> {
        let paused = self.paused.read().await;
        paused
            .global
            .clone()
            .or_else(|| paused.users.get(user_id).cloned())
    }

    pub async fn len(&self) -> usize {
        self.trades.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trades.read().await.is_empty()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn count_open_positions(&self, user_id: &str) -> anyhow::Result<usize> {
        let trades = self.trades.read().await;
        Ok(trades
            .values()
            .filter(|t| t.user_id == user_id && t.is_open())
            .count())
    }

    async fn save_position(&self, trade: &SimulatedTrade) -> anyhow::Result<()> {
        let mut trades = self.trades.write().await;
        trades.insert(trade.id, trade.clone());
        Ok(())
    }

    async fn update_positions_status(
        &self,
        user_id: Option<&str>,
        status: TradeStatus,
    ) -> anyhow::Result<usize> {
        let mut trades = self.trades.write().await;
        let mut updated = 0;
        for trade in trades.values_mut() {
            let owned = user_id.map_or(true, |u| trade.user_id == u);
            if owned && trade.is_open() {
                trade.status = status;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn set_trading_paused(&self, user_id: Option<&str>, reason: &str) -> anyhow::Result<()> {
        let mut paused = self.paused.write().await;
        match user_id {
            Some(user) => {
                paused.users.insert(user.to_string(), reason.to_string());
            }
            None => paused.global = Some(reason.to_string()),
        }
        Ok(())
    }
}

//! Persistence collaborator
//!
//! The engine issues requests against a keyed position store and never
//! manages its schema.

mod memory;

pub use memory::InMemoryPositionStore;

use crate::execution::{SimulatedTrade, TradeStatus};
use async_trait::async_trait;

/// Trait for position store implementations
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Number of open positions held by a user
    async fn count_open_positions(&self, user_id: &str) -> anyhow::Result<usize>;
    /// Insert or replace a trade record
    async fn save_position(&self, trade: &SimulatedTrade) -> anyhow::Result<()>;
    /// Move every open position of `user_id` (or of everyone) to `status`
    async fn update_positions_status(
        &self,
        user_id: Option<&str>,
        status: TradeStatus,
    ) -> anyhow::Result<usize>;
    /// Persist a trading pause for `user_id` (or globally)
    async fn set_trading_paused(&self, user_id: Option<&str>, reason: &str) -> anyhow::Result<()>;
}

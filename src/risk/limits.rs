//! Risk limits configuration

use super::RiskError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Deployment-wide admission limits
///
/// Any subset of fields may be supplied; the rest fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum realized loss per local day, USD
    #[serde(default = "default_max_daily_loss_usd")]
    pub max_daily_loss_usd: Decimal,

    /// Maximum drawdown of cumulative P&L from its peak, percent
    #[serde(default = "default_max_drawdown_percent")]
    pub max_drawdown_percent: Decimal,

    /// Maximum notional of a single position, USD
    #[serde(default = "default_max_position_size_usd")]
    pub max_position_size_usd: Decimal,

    /// Maximum concurrent open positions per user
    #[serde(default = "default_max_positions_per_user")]
    pub max_positions_per_user: usize,

    /// Maximum recorded trades in any trailing minute
    #[serde(default = "default_max_trades_per_minute")]
    pub max_trades_per_minute: usize,

    /// Losing streak length that blocks new trades
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,

    /// Minimum gap between two recorded trades, milliseconds
    #[serde(default = "default_min_time_between_trades_ms")]
    pub min_time_between_trades_ms: u64,
}

fn default_max_daily_loss_usd() -> Decimal {
    dec!(500)
}
fn default_max_drawdown_percent() -> Decimal {
    dec!(20)
}
fn default_max_position_size_usd() -> Decimal {
    dec!(1000)
}
fn default_max_positions_per_user() -> usize {
    10
}
fn default_max_trades_per_minute() -> usize {
    10
}
fn default_max_consecutive_losses() -> u32 {
    5
}
fn default_min_time_between_trades_ms() -> u64 {
    5_000
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_loss_usd: default_max_daily_loss_usd(),
            max_drawdown_percent: default_max_drawdown_percent(),
            max_position_size_usd: default_max_position_size_usd(),
            max_positions_per_user: default_max_positions_per_user(),
            max_trades_per_minute: default_max_trades_per_minute(),
            max_consecutive_losses: default_max_consecutive_losses(),
            min_time_between_trades_ms: default_min_time_between_trades_ms(),
        }
    }
}

impl RiskLimits {
    /// Check that every limit is strictly positive
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.max_daily_loss_usd <= Decimal::ZERO {
            return Err(RiskError::InvalidLimit("max_daily_loss_usd"));
        }
        if self.max_drawdown_percent <= Decimal::ZERO {
            return Err(RiskError::InvalidLimit("max_drawdown_percent"));
        }
        if self.max_position_size_usd <= Decimal::ZERO {
            return Err(RiskError::InvalidLimit("max_position_size_usd"));
        }
        if self.max_positions_per_user == 0 {
            return Err(RiskError::InvalidLimit("max_positions_per_user"));
        }
        if self.max_trades_per_minute == 0 {
            return Err(RiskError::InvalidLimit("max_trades_per_minute"));
        }
        if self.max_consecutive_losses == 0 {
            return Err(RiskError::InvalidLimit("max_consecutive_losses"));
        }
        if self.min_time_between_trades_ms == 0 {
            return Err(RiskError::InvalidLimit("min_time_between_trades_ms"));
        }
        Ok(())
    }
}

//! Risk management types

use super::RiskLimits;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Risk configuration errors
#[derive(Debug, Error)]
pub enum RiskError {
    /// A limit is zero or negative
    #[error("Invalid risk limit: {0} must be positive")]
    InvalidLimit(&'static str),
}

/// Reason a trade was refused admission
///
/// `Display` yields the user-facing reason; `code()` a stable identifier.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Denial {
    #[error("Trading paused: {reason}")]
    TradingPaused { reason: String },
    #[error("Daily loss limit reached (${daily_loss:.2})")]
    DailyLossLimit { daily_loss: Decimal },
    #[error("Position too large (max ${max:.2})")]
    PositionTooLarge { size: Decimal, max: Decimal },
    #[error("Unable to verify open positions")]
    PositionCheckUnavailable,
    #[error("Maximum positions reached ({max})")]
    MaxPositions { open: usize, max: usize },
    #[error("Trade rate limit exceeded ({max}/min)")]
    RateLimit { max: usize },
    #[error("Cooldown: wait {wait_secs}s")]
    Cooldown { wait_secs: u64 },
    #[error("Too many consecutive losses ({count})")]
    ConsecutiveLosses { count: u32 },
    #[error("Max drawdown reached ({percent:.1}%)")]
    MaxDrawdown { percent: Decimal },
}

impl Denial {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Denial::TradingPaused { .. } => "trading_paused",
            Denial::DailyLossLimit { .. } => "daily_loss_limit",
            Denial::PositionTooLarge { .. } => "position_too_large",
            Denial::PositionCheckUnavailable => "position_check_unavailable",
            Denial::MaxPositions { .. } => "max_positions",
            Denial::RateLimit { .. } => "rate_limit",
            Denial::Cooldown { .. } => "cooldown",
            Denial::ConsecutiveLosses { .. } => "consecutive_losses",
            Denial::MaxDrawdown { .. } => "max_drawdown",
        }
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Allowed,
    Denied(Denial),
}

impl RiskDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RiskDecision::Allowed)
    }

    /// Human-readable reason, `None` when allowed
    pub fn reason(&self) -> Option<String> {
        match self {
            RiskDecision::Allowed => None,
            RiskDecision::Denied(denial) => Some(denial.to_string()),
        }
    }
}

/// Read-only view of a user's risk state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskStatus {
    pub user_id: String,
    pub daily_loss: Decimal,
    pub daily_loss_limit: Decimal,
    pub consecutive_losses: u32,
    pub trades_last_minute: usize,
    pub trades_last_hour: usize,
    pub last_trade_ms: Option<i64>,
    pub drawdown_peak: Decimal,
    pub drawdown_current: Decimal,
    /// `None` until the P&L peak is positive
    pub drawdown_percent: Option<Decimal>,
    pub paused: Option<String>,
    pub limits: RiskLimits,
}

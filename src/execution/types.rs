//! Execution types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Trade identifier
pub type TradeId = Uuid;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Long: buy at the ask
    Buy,
    /// Short: sell at the bid
    Sell,
}

impl Side {
    /// Side that flattens a position opened on `self`
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Lifecycle state of a simulated trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    /// Exited manually or by take-profit
    Closed,
    /// Exited by stop-loss or emergency stop
    Stopped,
}

impl TradeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TradeStatus::Open)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
            TradeStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// A request to open a simulated position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub user_id: String,
    pub symbol: String,
    pub side: Side,
    /// Quantity in base units
    pub amount: Decimal,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profit: Option<Decimal>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
}

impl TradeRequest {
    /// Market request without exit levels
    pub fn market(
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        amount: Decimal,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            symbol: symbol.into(),
            side,
            amount,
            stop_loss: None,
            take_profit: None,
            agent: None,
            strategy: None,
        }
    }

    pub fn with_stop_loss(mut self, price: Decimal) -> Self {
        self.stop_loss = Some(price);
        self
    }

    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.take_profit = Some(price);
        self
    }

    pub fn with_strategy(mut self, agent: impl Into<String>, strategy: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self.strategy = Some(strategy.into());
        self
    }
}

/// A simulated fill
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Price after slippage
    pub execution_price: Decimal,
    /// Applied slippage in basis points, never negative
    pub slippage_bps: Decimal,
}

/// A paper trade, open or closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTrade {
    pub id: TradeId,
    /// Owner of the position
    pub user_id: String,
    /// Entry time
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    /// Quantity in base units
    pub amount: Decimal,
    /// Entry slippage in basis points
    pub slippage_bps: Decimal,
    pub status: TradeStatus,
    pub pnl: Option<Decimal>,
    pub pnl_percent: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Agent that requested the trade, if any
    pub agent: Option<String>,
    /// Strategy tag, if any
    pub strategy: Option<String>,
    /// Exit time, set together with `exit_price`
    pub closed_at: Option<DateTime<Utc>>,
}

impl SimulatedTrade {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Entry notional (`amount × entry_price`), saturating at the Decimal range
    pub fn notional(&self) -> Decimal {
        self.amount.saturating_mul(self.entry_price)
    }

    /// Signed per-unit price move in the position's favour
    pub fn price_diff(&self, exit_price: Decimal) -> Decimal {
        match self.side {
            Side::Buy => exit_price - self.entry_price,
            Side::Sell => self.entry_price - exit_price,
        }
    }

    /// Realized P&L and P&L percent for an exit at `exit_price`
    ///
    /// Both saturate instead of overflowing.
    pub fn pnl_at(&self, exit_price: Decimal) -> (Decimal, Decimal) {
        let diff = self.price_diff(exit_price);
        let pnl = diff.saturating_mul(self.amount);
        let pnl_percent = if self.entry_price > Decimal::ZERO {
            diff.checked_div(self.entry_price)
                .map(|ratio| ratio.saturating_mul(dec!(100)))
                .unwrap_or(if diff.is_sign_negative() { Decimal::MIN } else { Decimal::MAX })
        } else {
            Decimal::ZERO
        };
        (pnl, pnl_percent)
    }
}

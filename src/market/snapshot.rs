//! Market data snapshot

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Top-of-book view of a symbol at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Trading symbol (e.g., "SOL/USDC")
    pub symbol: String,
    /// Best bid price
    pub best_bid: Decimal,
    /// Best ask price
    pub best_ask: Decimal,
    /// Mid price
    pub mid: Decimal,
    /// Bid/ask spread in basis points of mid
    pub spread_bps: Decimal,
    /// One-hour volatility, in percent
    pub volatility_1h: Decimal,
    /// Time the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Build a snapshot from best quotes, deriving mid and spread
    pub fn from_quotes(
        symbol: impl Into<String>,
        best_bid: Decimal,
        best_ask: Decimal,
        volatility_1h: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mid = (best_bid + best_ask) / Decimal::TWO;
        let spread_bps = if mid > Decimal::ZERO {
            (best_ask - best_bid) / mid * dec!(10000)
        } else {
            Decimal::ZERO
        };

        Self {
            symbol: symbol.into(),
            best_bid,
            best_ask,
            mid,
            spread_bps,
            volatility_1h,
            timestamp,
        }
    }

    /// Age of the snapshot relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}

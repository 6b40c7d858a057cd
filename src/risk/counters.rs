//! Per-user risk counters

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;

/// Window used for the trade-rate check
pub const RATE_WINDOW_MS: i64 = 60_000;
/// Trade timestamps older than this are pruned
pub const RETENTION_WINDOW_MS: i64 = 3_600_000;

/// Running peak of cumulative realized P&L
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Drawdown {
    /// Highest cumulative P&L seen so far
    pub peak: Decimal,
    /// Cumulative realized P&L
    pub current: Decimal,
}

impl Drawdown {
    /// Apply a realized P&L
    pub fn apply(&mut self, pnl: Decimal) {
        self.current = self.current.saturating_add(pnl);
        if self.current > self.peak {
            self.peak = self.current;
        }
    }

    /// Decline from peak in percent; `None` until the peak is positive
    pub fn percent(&self) -> Option<Decimal> {
        if self.peak <= Decimal::ZERO {
            return None;
        }
        Some(
            (self.peak.saturating_sub(self.current) / self.peak).saturating_mul(dec!(100)),
        )
    }
}

/// Mutable risk state for one user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskCounters {
    /// Realized losses since local midnight, USD, never negative
    pub daily_loss: Decimal,
    /// Current losing streak
    pub consecutive_losses: u32,
    /// Epoch-ms timestamps of recorded trades, oldest first
    pub trade_timestamps: VecDeque<i64>,
    pub drawdown: Drawdown,
}

impl RiskCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one closed trade's P&L into the counters
    pub fn record(&mut self, pnl: Decimal, now_ms: i64) {
        if pnl < Decimal::ZERO {
            self.daily_loss = self.daily_loss.saturating_add(pnl.abs());
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }

        self.trade_timestamps.push_back(now_ms);
        self.prune(now_ms);

        self.drawdown.apply(pnl);
    }

    /// Drop timestamps outside the retention window
    pub fn prune(&mut self, now_ms: i64) {
        let cutoff = now_ms.saturating_sub(RETENTION_WINDOW_MS);
        while let Some(&ts) = self.trade_timestamps.front() {
            if ts < cutoff {
                self.trade_timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Trades recorded within the trailing `window_ms`
    pub fn trades_within(&self, now_ms: i64, window_ms: i64) -> usize {
        self.trade_timestamps
            .iter()
            .rev()
            .take_while(|&&ts| now_ms.saturating_sub(ts) < window_ms)
            .count()
    }

    pub fn last_trade_ms(&self) -> Option<i64> {
        self.trade_timestamps.back().copied()
    }

    pub fn reset_daily(&mut self) {
        self.daily_loss = Decimal::ZERO;
    }
}

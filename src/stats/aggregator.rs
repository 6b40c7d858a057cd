//! Incremental trading statistics

use crate::execution::SimulatedTrade;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Aggregate performance of a user's simulated trades
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradingStats {
    /// Trades opened, including those still open
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Sum of realized P&L
    pub total_pnl: Decimal,
    /// Largest decline of total P&L from its running peak, USD
    pub max_drawdown: Decimal,
    /// Current decline of total P&L from its running peak, USD
    pub current_drawdown: Decimal,
    /// Percent of decided trades that won, 0 when none decided
    pub win_rate: Decimal,
    pub avg_win: Decimal,
    /// Average loss magnitude (positive)
    pub avg_loss: Decimal,
    /// Gross wins over gross losses, 0 without losses
    pub profit_factor: Decimal,
    /// Mean over sample standard deviation of per-trade P&L percent
    pub sharpe_ratio: Decimal,
    /// Entry notional traded, USD
    pub total_volume: Decimal,
    pub best_trade: Decimal,
    pub worst_trade: Decimal,
    /// Positive for a winning run, negative for a losing run
    pub streak: i32,
}

impl TradingStats {
    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        format!(
            r#"
══════════════════════════════════════════════════════
               PAPER TRADING RESULTS
══════════════════════════════════════════════════════

PERFORMANCE
───────────────────────────────────────────────────────
Total P&L:        {:+.2}
Win Rate:         {:.1}%
Avg Win / Loss:   {:.2} / {:.2}
Profit Factor:    {:.2}
Sharpe Ratio:     {:.2}
Max Drawdown:     {:.2} (current {:.2})
Best / Worst:     {:+.2} / {:+.2}
Streak:           {:+}

ACTIVITY
───────────────────────────────────────────────────────
Total Trades:     {} ({} won, {} lost)
Volume:           {:.2}
══════════════════════════════════════════════════════
"#,
            self.total_pnl,
            self.win_rate,
            self.avg_win,
            self.avg_loss,
            self.profit_factor,
            self.sharpe_ratio,
            self.max_drawdown,
            self.current_drawdown,
            self.best_trade,
            self.worst_trade,
            self.streak,
            self.total_trades,
            self.winning_trades,
            self.losing_trades,
            self.total_volume,
        )
    }
}

/// Updates [`TradingStats`] one trade at a time without keeping history
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    stats: TradingStats,
    closed_trades: usize,
    peak_pnl: Decimal,
    // Welford accumulators over pnl_percent
    return_mean: f64,
    return_m2: f64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &TradingStats {
        &self.stats
    }

    /// Count a newly opened trade
    pub fn on_trade_opened(&mut self, trade: &SimulatedTrade) {
        self.stats.total_trades += 1;
        self.stats.total_volume = self.stats.total_volume.saturating_add(trade.notional());
    }

    /// Fold a closed trade into the statistics
    ///
    /// Trades without realized P&L are ignored.
    pub fn on_trade_closed(&mut self, trade: &SimulatedTrade) {
        let Some(pnl) = trade.pnl else {
            tracing::warn!(trade_id = %trade.id, "Closed trade without pnl ignored by stats");
            return;
        };
        let s = &mut self.stats;

        if pnl > Decimal::ZERO {
            s.winning_trades += 1;
            let n = Decimal::from(s.winning_trades);
            s.avg_win = s.avg_win.saturating_mul(n - Decimal::ONE).saturating_add(pnl) / n;
            s.streak = if s.streak > 0 { s.streak + 1 } else { 1 };
        } else if pnl < Decimal::ZERO {
            s.losing_trades += 1;
            let n = Decimal::from(s.losing_trades);
            s.avg_loss = s.avg_loss.saturating_mul(n - Decimal::ONE).saturating_add(pnl.abs()) / n;
            s.streak = if s.streak < 0 { s.streak - 1 } else { -1 };
        }

        let decided = s.winning_trades + s.losing_trades;
        s.win_rate = if decided > 0 {
            Decimal::from(s.winning_trades) / Decimal::from(decided) * dec!(100)
        } else {
            Decimal::ZERO
        };

        let gross_loss = s.avg_loss.saturating_mul(Decimal::from(s.losing_trades));
        s.profit_factor = if s.losing_trades > 0 && gross_loss > Decimal::ZERO {
            s.avg_win
                .saturating_mul(Decimal::from(s.winning_trades))
                .checked_div(gross_loss)
                .unwrap_or(Decimal::MAX)
        } else {
            Decimal::ZERO
        };

        self.closed_trades += 1;
        if self.closed_trades == 1 {
            s.best_trade = pnl;
            s.worst_trade = pnl;
        } else {
            s.best_trade = s.best_trade.max(pnl);
            s.worst_trade = s.worst_trade.min(pnl);
        }

        s.total_pnl = s.total_pnl.saturating_add(pnl);
        if s.total_pnl > self.peak_pnl {
            self.peak_pnl = s.total_pnl;
        }
        s.current_drawdown = self.peak_pnl.saturating_sub(s.total_pnl);
        s.max_drawdown = s.max_drawdown.max(s.current_drawdown);

        let ret: f64 = trade
            .pnl_percent
            .and_then(|p| p.try_into().ok())
            .unwrap_or(0.0);
        let n = self.closed_trades as f64;
        let delta = ret - self.return_mean;
        self.return_mean += delta / n;
        self.return_m2 += delta * (ret - self.return_mean);

        let sharpe = self.sharpe();
        self.stats.sharpe_ratio = sharpe;
    }

    fn sharpe(&self) -> Decimal {
        if self.closed_trades < 2 {
            return Decimal::ZERO;
        }
        let variance = self.return_m2 / (self.closed_trades - 1) as f64;
        let std_dev = variance.sqrt();
        if !std_dev.is_finite() || std_dev <= f64::EPSILON {
            return Decimal::ZERO;
        }
        Decimal::try_from(self.return_mean / std_dev)
            .map(|d| d.round_dp(4))
            .unwrap_or(Decimal::ZERO)
    }
}

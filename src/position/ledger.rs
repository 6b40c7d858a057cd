//! Position ledger

use crate::execution::{Fill, Side, SimulatedTrade, TradeId, TradeRequest, TradeStatus};
use crate::market::MarketSnapshot;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Ledger errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Cash balance cannot cover the entry notional
    #[error("Insufficient balance: required ${required:.2}, available ${available:.2}")]
    InsufficientBalance { required: Decimal, available: Decimal },
    /// `amount × price` does not fit in a Decimal
    #[error("Notional overflow: {amount} at {price}")]
    NotionalOverflow { amount: Decimal, price: Decimal },
}

/// Which exit level a tick crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    StopLoss,
    TakeProfit,
}

impl ExitTrigger {
    /// Terminal status a trigger moves the position to
    pub fn status(self) -> TradeStatus {
        match self {
            ExitTrigger::StopLoss => TradeStatus::Stopped,
            ExitTrigger::TakeProfit => TradeStatus::Closed,
        }
    }
}

/// Tracks simulated positions and per-user paper balances
///
/// Closed trades stay in the ledger as immutable records.
pub struct PositionLedger {
    initial_balance: Decimal,
    balances: HashMap<String, Decimal>,
    trades: HashMap<TradeId, SimulatedTrade>,
    /// Last observed mid per symbol
    marks: HashMap<String, Decimal>,
}

impl PositionLedger {
    /// Create a ledger where every user starts with `initial_balance`
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            balances: HashMap::new(),
            trades: HashMap::new(),
            marks: HashMap::new(),
        }
    }

    /// Cash available to a user
    pub fn balance(&self, user_id: &str) -> Decimal {
        self.balances
            .get(user_id)
            .copied()
            .unwrap_or(self.initial_balance)
    }

    /// Open a position from a fill, locking its notional
    ///
    /// Nothing is written when the balance is insufficient.
    pub fn open(
        &mut self,
        request: &TradeRequest,
        fill: Fill,
        now: DateTime<Utc>,
    ) -> Result<SimulatedTrade, LedgerError> {
        let required = request.amount.checked_mul(fill.execution_price).ok_or(
            LedgerError::NotionalOverflow {
                amount: request.amount,
                price: fill.execution_price,
            },
        )?;
        let available = self.balance(&request.user_id);
        if required > available {
            return Err(LedgerError::InsufficientBalance {
                required,
                available,
            });
        }

        let trade = SimulatedTrade {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            timestamp: now,
            symbol: request.symbol.clone(),
            side: request.side,
            entry_price: fill.execution_price,
            exit_price: None,
            amount: request.amount,
            slippage_bps: fill.slippage_bps,
            status: TradeStatus::Open,
            pnl: None,
            pnl_percent: None,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            agent: request.agent.clone(),
            strategy: request.strategy.clone(),
            closed_at: None,
        };

        self.balances
            .insert(request.user_id.clone(), available - required);
        self.trades.insert(trade.id, trade.clone());
        Ok(trade)
    }

    /// Close an open position at `exit_price`
    ///
    /// Returns `None` for an unknown id.
    ///
    /// # Panics
    ///
    /// Panics if the trade is already closed or stopped: realizing its P&L
    /// twice would corrupt every downstream counter.
    pub fn close(
        &mut self,
        id: TradeId,
        exit_price: Decimal,
        status: TradeStatus,
        now: DateTime<Utc>,
    ) -> Option<SimulatedTrade> {
        assert!(status.is_terminal(), "cannot close trade {id} into status {status}");
        let trade = self.trades.get_mut(&id)?;
        assert!(
            trade.is_open(),
            "trade {id} is already {}; refusing to realize its P&L twice",
            trade.status
        );

        let (pnl, pnl_percent) = trade.pnl_at(exit_price);
        trade.exit_price = Some(exit_price);
        trade.pnl = Some(pnl);
        trade.pnl_percent = Some(pnl_percent);
        trade.status = status;
        trade.closed_at = Some(now);

        let returned = trade.notional().saturating_add(pnl);
        let user_id = trade.user_id.clone();
        let closed = trade.clone();

        let balance = self.balance(&user_id);
        self.balances.insert(user_id, balance.saturating_add(returned));
        Some(closed)
    }

    pub fn get(&self, id: TradeId) -> Option<&SimulatedTrade> {
        self.trades.get(&id)
    }

    /// Open positions, of one user or everyone, oldest first
    pub fn open_positions(&self, user_id: Option<&str>) -> Vec<SimulatedTrade> {
        let mut open: Vec<SimulatedTrade> = self
            .trades
            .values()
            .filter(|t| t.is_open() && user_id.map_or(true, |u| t.user_id == u))
            .cloned()
            .collect();
        open.sort_by_key(|t| t.timestamp);
        open
    }

    /// Closed or stopped trades of one user, oldest exit first
    pub fn closed_trades(&self, user_id: &str) -> Vec<SimulatedTrade> {
        let mut closed: Vec<SimulatedTrade> = self
            .trades
            .values()
            .filter(|t| !t.is_open() && t.user_id == user_id)
            .cloned()
            .collect();
        closed.sort_by_key(|t| t.closed_at);
        closed
    }

    pub fn open_count(&self) -> usize {
        self.trades.values().filter(|t| t.is_open()).count()
    }

    /// Symbols with at least one open position
    pub fn open_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .trades
            .values()
            .filter(|t| t.is_open())
            .map(|t| t.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    /// Remember the latest mid for a symbol
    pub fn record_mark(&mut self, symbol: &str, mid: Decimal) {
        self.marks.insert(symbol.to_string(), mid);
    }

    pub fn last_mark(&self, symbol: &str) -> Option<Decimal> {
        self.marks.get(symbol).copied()
    }

    /// Open positions on the snapshot's symbol whose stop or target the mid crossed
    pub fn triggered(&self, snapshot: &MarketSnapshot) -> Vec<(TradeId, ExitTrigger)> {
        let mut hits: Vec<(DateTime<Utc>, TradeId, ExitTrigger)> = self
            .trades
            .values()
            .filter(|t| t.is_open() && t.symbol == snapshot.symbol)
            .filter_map(|t| hit_test(t, snapshot.mid).map(|trigger| (t.timestamp, t.id, trigger)))
            .collect();
        hits.sort_by_key(|(ts, _, _)| *ts);
        hits.into_iter().map(|(_, id, trigger)| (id, trigger)).collect()
    }
}

/// Stop-loss wins when both levels are crossed
fn hit_test(trade: &SimulatedTrade, price: Decimal) -> Option<ExitTrigger> {
    let (stop_hit, target_hit) = match trade.side {
        Side::Buy => (
            trade.stop_loss.is_some_and(|sl| price <= sl),
            trade.take_profit.is_some_and(|tp| price >= tp),
        ),
        Side::Sell => (
            trade.stop_loss.is_some_and(|sl| price >= sl),
            trade.take_profit.is_some_and(|tp| price <= tp),
        ),
    };

    if stop_hit {
        Some(ExitTrigger::StopLoss)
    } else if target_hit {
        Some(ExitTrigger::TakeProfit)
    } else {
        None
    }
}

//! Simulated position tracking
//!
//! Open positions, stop-loss/take-profit hit testing and paper balances

mod ledger;

pub use ledger::{ExitTrigger, LedgerError, PositionLedger};

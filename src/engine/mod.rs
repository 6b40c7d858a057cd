//! Trading engine module
//!
//! Wires the risk gate, execution simulator, position ledger and stats
//! together:
//!
//! 1. a trade request passes the [`RiskGate`](crate::risk::RiskGate)
//! 2. the simulator fills it against the current market snapshot
//! 3. the fill becomes an open position in the ledger
//! 4. every market tick re-evaluates stops and targets; closed positions
//!    feed the risk counters and the statistics exactly once

mod scheduler;
mod trading;
mod types;

pub use scheduler::{until_next_midnight, EngineTasks};
pub use trading::{EngineBuilder, TradingEngine};
pub use types::TradeRejection;

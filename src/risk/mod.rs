//! Risk management module
//!
//! Admission limits, per-user counters and the trade gate

mod counters;
mod gate;
mod limits;
mod types;

pub use counters::{Drawdown, RiskCounters, RATE_WINDOW_MS, RETENTION_WINDOW_MS};
pub use gate::RiskGate;
pub use limits::RiskLimits;
pub use types::{Denial, RiskDecision, RiskError, RiskStatus};

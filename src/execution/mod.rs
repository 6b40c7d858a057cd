//! Execution simulation module
//!
//! Paper fills with modelled slippage; nothing here talks to a venue.

mod simulator;
mod types;

pub use simulator::{ExecutionSimulator, FixedNoise, NoiseSource, ThreadRngNoise};
pub use types::{Fill, Side, SimulatedTrade, TradeId, TradeRequest, TradeStatus};

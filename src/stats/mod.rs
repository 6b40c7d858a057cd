//! Performance statistics module
//!
//! Rolling trade statistics updated as simulated positions open and close

mod aggregator;

pub use aggregator::{StatsAggregator, TradingStats};

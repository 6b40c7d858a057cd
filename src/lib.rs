//! paper-risk: Risk gate and paper execution simulator for automated trading
//!
//! This library provides the core components for:
//! - Multi-rule trade admission with per-user risk counters
//! - Slippage-aware fill simulation against market snapshots
//! - Stop-loss / take-profit monitoring and emergency stops
//! - Incremental per-user trading statistics
//! - Event-log replay for offline evaluation
//! - Structured logging, Prometheus metrics and alerts

pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod execution;
pub mod market;
pub mod persistence;
pub mod position;
pub mod risk;
pub mod stats;
pub mod telemetry;

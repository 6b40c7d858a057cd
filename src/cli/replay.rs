//! Replay command implementation
//!
//! Feeds a JSON-lines event log through a paper engine running on a manual
//! clock. One event per line:
//!
//! ```text
//! {"type":"tick","at":"2024-03-05T10:00:00Z","symbol":"SOL","bid":"99.9","ask":"100.1","volatility_1h":"1.5"}
//! {"type":"trade","at":"2024-03-05T10:00:01Z","request":{"user_id":"alice","symbol":"SOL","side":"buy","amount":"2","stop_loss":"95"}}
//! {"type":"close","at":"2024-03-05T10:05:00Z","user_id":"alice","trade_index":0}
//! {"type":"emergency_stop","at":"2024-03-05T11:00:00Z","user_id":"alice","reason":"manual"}
//! {"type":"resume","at":"2024-03-05T12:00:00Z","user_id":"alice"}
//! ```
//!
//! `trade_index` counts accepted trades in file order, starting at 0.
//! Omitting `user_id` on `emergency_stop` or `resume` applies it globally.

use crate::clock::{Clock, ManualClock};
use crate::config::Config;
use crate::engine::TradingEngine;
use crate::execution::{FixedNoise, TradeId, TradeRequest};
use crate::market::{MarketSnapshot, SnapshotCache};
use crate::persistence::InMemoryPositionStore;
use crate::stats::TradingStats;
use anyhow::Context;
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines event file
    pub events: PathBuf,

    /// Pin slippage noise to this many bps for reproducible runs
    #[arg(long)]
    pub fixed_noise: Option<f64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

impl ReplayArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let content = std::fs::read_to_string(&self.events)
            .with_context(|| format!("Failed to read {}", self.events.display()))?;
        let events = parse_events(&content)?;
        tracing::info!(events = events.len(), path = %self.events.display(), "Replaying events");

        let mut replay = Replay::new(config, self.fixed_noise)?;
        for event in events {
            replay.apply(event).await?;
        }
        let report = replay.report().await;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Table => {
                for (user, result) in &report.users {
                    println!("USER {user} (balance {:.2})", result.balance);
                    println!("{}", result.stats.format_table());
                }
                println!(
                    "Events: {}  Opened: {}  Closed: {}",
                    report.summary.events, report.summary.trades_opened, report.summary.trades_closed
                );
                for (code, count) in &report.summary.rejections {
                    println!("Rejected ({code}): {count}");
                }
            }
        }
        Ok(())
    }
}

/// One line of a replay file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEvent {
    Tick {
        at: DateTime<Utc>,
        symbol: String,
        bid: Decimal,
        ask: Decimal,
        #[serde(default)]
        volatility_1h: Decimal,
    },
    Trade {
        at: DateTime<Utc>,
        request: TradeRequest,
    },
    Close {
        at: DateTime<Utc>,
        user_id: String,
        trade_index: usize,
    },
    EmergencyStop {
        at: DateTime<Utc>,
        #[serde(default)]
        user_id: Option<String>,
        reason: String,
    },
    Resume {
        at: DateTime<Utc>,
        #[serde(default)]
        user_id: Option<String>,
    },
}

impl ReplayEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            ReplayEvent::Tick { at, .. }
            | ReplayEvent::Trade { at, .. }
            | ReplayEvent::Close { at, .. }
            | ReplayEvent::EmergencyStop { at, .. }
            | ReplayEvent::Resume { at, .. } => *at,
        }
    }
}

/// Parse a JSON-lines log, skipping blank lines
pub fn parse_events(content: &str) -> anyhow::Result<Vec<ReplayEvent>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid event on line {}", n + 1))
        })
        .collect()
}

/// Counts gathered while replaying
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub events: usize,
    pub trades_opened: usize,
    pub trades_closed: usize,
    /// Rejections keyed by rejection code
    pub rejections: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub balance: Decimal,
    pub stats: TradingStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub summary: ReplaySummary,
    pub users: BTreeMap<String, UserReport>,
}

/// Engine plus the manual clock and snapshot cache driving it
pub struct Replay {
    engine: TradingEngine,
    cache: Arc<SnapshotCache>,
    clock: Arc<ManualClock>,
    accepted: Vec<TradeId>,
    current_date: Option<NaiveDate>,
    summary: ReplaySummary,
}

impl Replay {
    pub fn new(config: &Config, fixed_noise: Option<f64>) -> anyhow::Result<Self> {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(SnapshotCache::new(
            config.simulation.max_snapshot_age(),
            clock.clone(),
        ));

        let mut builder = TradingEngine::builder(cache.clone(), Arc::new(InMemoryPositionStore::new()))
            .limits(config.risk.clone())
            .simulation(config.simulation.clone())
            .clock(clock.clone());
        if let Some(bps) = fixed_noise {
            builder = builder.noise(Box::new(FixedNoise(bps)));
        }

        Ok(Self {
            engine: builder.build()?,
            cache,
            clock,
            accepted: Vec::new(),
            current_date: None,
            summary: ReplaySummary::default(),
        })
    }

    pub fn engine(&self) -> &TradingEngine {
        &self.engine
    }

    pub fn summary(&self) -> &ReplaySummary {
        &self.summary
    }

    /// Advance the clock to the event's time and apply it
    pub async fn apply(&mut self, event: ReplayEvent) -> anyhow::Result<()> {
        self.advance_to(event.at()).await;
        self.summary.events += 1;

        match event {
            ReplayEvent::Tick {
                at,
                symbol,
                bid,
                ask,
                volatility_1h,
            } => {
                let snapshot = MarketSnapshot::from_quotes(symbol, bid, ask, volatility_1h, at);
                self.cache.update(snapshot.clone()).await;
                let closed = self.engine.on_market_tick(&snapshot).await;
                self.summary.trades_closed += closed.len();
            }
            ReplayEvent::Trade { request, .. } => {
                match self.engine.submit_trade(request).await {
                    Ok(trade) => {
                        self.accepted.push(trade.id);
                        self.summary.trades_opened += 1;
                    }
                    Err(rejection) => {
                        tracing::info!(code = rejection.code(), reason = %rejection, "Trade rejected");
                        *self
                            .summary
                            .rejections
                            .entry(rejection.code().to_string())
                            .or_default() += 1;
                    }
                }
            }
            ReplayEvent::Close {
                user_id,
                trade_index,
                ..
            } => {
                let trade_id = *self.accepted.get(trade_index).with_context(|| {
                    format!(
                        "trade_index {trade_index} out of range ({} accepted)",
                        self.accepted.len()
                    )
                })?;
                match self.engine.close_position(&user_id, trade_id).await {
                    Ok(_) => self.summary.trades_closed += 1,
                    Err(rejection) => {
                        tracing::warn!(%user_id, %trade_id, reason = %rejection, "Close rejected")
                    }
                }
            }
            ReplayEvent::EmergencyStop { user_id, reason, .. } => {
                let stopped = match user_id {
                    Some(user_id) => self.engine.emergency_stop(&user_id, &reason).await,
                    None => self.engine.global_emergency_stop(&reason).await,
                };
                self.summary.trades_closed += stopped.len();
            }
            ReplayEvent::Resume { user_id, .. } => match user_id {
                Some(user_id) => self.engine.resume_trading(&user_id).await,
                None => self.engine.resume_all().await,
            },
        }
        Ok(())
    }

    /// Move the clock forward; daily losses reset when the local date rolls
    async fn advance_to(&mut self, at: DateTime<Utc>) {
        let at_ms = at.timestamp_millis();
        if at_ms < self.clock.now_ms() {
            tracing::warn!(%at, "Out-of-order event, clock not moved");
        } else {
            self.clock.set_ms(at_ms);
        }

        let date = self.clock.now().with_timezone(&Local).date_naive();
        if self.current_date.is_some_and(|current| current != date) {
            self.engine.reset_daily_losses().await;
        }
        self.current_date = Some(date);
    }

    pub async fn report(&self) -> ReplayReport {
        let mut users = BTreeMap::new();
        for user in self.engine.users().await {
            let report = UserReport {
                balance: self.engine.balance(&user).await,
                stats: self.engine.get_stats(&user).await,
            };
            users.insert(user, report);
        }
        ReplayReport {
            summary: self.summary.clone(),
            users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const LOG: &str = r#"
{"type":"tick","at":"2024-03-05T10:00:00Z","symbol":"SOL","bid":"100","ask":"100"}
{"type":"trade","at":"2024-03-05T10:00:01Z","request":{"user_id":"alice","symbol":"SOL","side":"buy","amount":"1","stop_loss":"90"}}
{"type":"tick","at":"2024-03-05T10:00:02Z","symbol":"SOL","bid":"89","ask":"89"}
{"type":"trade","at":"2024-03-05T10:00:03Z","request":{"user_id":"alice","symbol":"SOL","side":"buy","amount":"1"}}
{"type":"trade","at":"2024-03-05T10:00:10Z","request":{"user_id":"alice","symbol":"SOL","side":"buy","amount":"1"}}
{"type":"close","at":"2024-03-05T10:00:20Z","user_id":"alice","trade_index":1}
"#;

    #[test]
    fn test_parse_events() {
        let events = parse_events(LOG).unwrap();
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], ReplayEvent::Tick { ref symbol, .. } if symbol == "SOL"));
        assert!(matches!(events[5], ReplayEvent::Close { trade_index: 1, .. }));
    }

    #[test]
    fn test_parse_reports_line() {
        let err = parse_events("\n{\"type\":\"nope\"}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_replay_log() {
        let mut replay = Replay::new(&Config::default(), Some(0.0)).unwrap();
        for event in parse_events(LOG).unwrap() {
            replay.apply(event).await.unwrap();
        }

        let summary = replay.summary();
        assert_eq!(summary.events, 6);
        assert_eq!(summary.trades_opened, 2);
        assert_eq!(summary.trades_closed, 2);
        assert_eq!(summary.rejections.get("cooldown"), Some(&1));

        let report = replay.report().await;
        let alice = &report.users["alice"];
        assert_eq!(alice.stats.total_trades, 2);
        assert_eq!(alice.stats.losing_trades, 2);
        assert!(alice.balance < dec!(10000));
    }

    #[tokio::test]
    async fn test_daily_reset_on_date_change() {
        let mut replay = Replay::new(&Config::default(), Some(0.0)).unwrap();
        for event in parse_events(LOG).unwrap() {
            replay.apply(event).await.unwrap();
        }
        assert!(replay.engine().get_risk_status("alice").await.daily_loss > dec!(0));

        let next_day = r#"{"type":"resume","at":"2024-03-07T10:00:00Z"}"#;
        for event in parse_events(next_day).unwrap() {
            replay.apply(event).await.unwrap();
        }
        assert_eq!(replay.engine().get_risk_status("alice").await.daily_loss, dec!(0));
    }

    #[tokio::test]
    async fn test_close_out_of_range() {
        let mut replay = Replay::new(&Config::default(), Some(0.0)).unwrap();
        let event = ReplayEvent::Close {
            at: Utc::now(),
            user_id: "alice".to_string(),
            trade_index: 3,
        };
        assert!(replay.apply(event).await.is_err());
    }
}

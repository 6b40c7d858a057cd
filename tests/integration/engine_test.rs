//! End-to-end tests through the trading engine

use chrono::{Duration, Utc};
use paper_risk::clock::{Clock, ManualClock};
use paper_risk::config::SimulationConfig;
use paper_risk::engine::{TradeRejection, TradingEngine};
use paper_risk::execution::{Fill, FixedNoise, Side, TradeRequest, TradeStatus};
use paper_risk::market::{MarketSnapshot, SnapshotCache};
use paper_risk::persistence::InMemoryPositionStore;
use paper_risk::position::PositionLedger;
use paper_risk::risk::{Denial, RiskLimits};
use paper_risk::telemetry::{MemoryAlertSink, Severity};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const T0: i64 = 1_700_000_000_000;

struct TestEngine {
    engine: TradingEngine,
    cache: Arc<SnapshotCache>,
    store: Arc<InMemoryPositionStore>,
    alerts: Arc<MemoryAlertSink>,
    clock: Arc<ManualClock>,
}

impl TestEngine {
    fn new(limits: RiskLimits, simulation: SimulationConfig) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let cache = Arc::new(SnapshotCache::new(Duration::seconds(30), clock.clone()));
        let store = Arc::new(InMemoryPositionStore::new());
        let alerts = Arc::new(MemoryAlertSink::new());
        let engine = TradingEngine::builder(cache.clone(), store.clone())
            .limits(limits)
            .simulation(simulation)
            .alerts(alerts.clone())
            .clock(clock.clone())
            .noise(Box::new(FixedNoise(0.0)))
            .build()
            .unwrap();
        Self {
            engine,
            cache,
            store,
            alerts,
            clock,
        }
    }

    fn with_defaults() -> Self {
        Self::new(RiskLimits::default(), SimulationConfig::default())
    }

    async fn quote(&self, symbol: &str, mid: Decimal) -> MarketSnapshot {
        let snapshot = MarketSnapshot::from_quotes(symbol, mid, mid, dec!(0), self.clock.now());
        self.cache.update(snapshot.clone()).await;
        snapshot
    }

    fn wait_cooldown(&self) {
        self.clock.advance_ms(6_000);
    }
}

fn bracket(user: &str) -> TradeRequest {
    TradeRequest::market(user, "SOL", Side::Buy, dec!(1))
        .with_stop_loss(dec!(90))
        .with_take_profit(dec!(110))
}

#[tokio::test]
async fn test_stop_loss_closes_as_stopped() {
    let t = TestEngine::with_defaults();
    t.quote("SOL", dec!(100)).await;
    let trade = t.engine.submit_trade(bracket("alice")).await.unwrap();

    let tick = t.quote("SOL", dec!(89)).await;
    let closed = t.engine.on_market_tick(&tick).await;

    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, trade.id);
    assert_eq!(closed[0].status, TradeStatus::Stopped);
    assert!(closed[0].pnl.unwrap() < Decimal::ZERO);

    let stored = t.store.get(trade.id).await.unwrap();
    assert_eq!(stored.status, TradeStatus::Stopped);
}

#[tokio::test]
async fn test_take_profit_closes_as_closed() {
    let t = TestEngine::with_defaults();
    t.quote("SOL", dec!(100)).await;
    t.engine.submit_trade(bracket("alice")).await.unwrap();

    let tick = t.quote("SOL", dec!(111)).await;
    let closed = t.engine.on_market_tick(&tick).await;

    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].status, TradeStatus::Closed);
    assert!(closed[0].pnl.unwrap() > Decimal::ZERO);

    let stats = t.engine.get_stats("alice").await;
    assert_eq!(stats.winning_trades, 1);
    assert_eq!(stats.win_rate, dec!(100));
}

#[tokio::test]
async fn test_tick_between_levels_keeps_position_open() {
    let t = TestEngine::with_defaults();
    t.quote("SOL", dec!(100)).await;
    t.engine.submit_trade(bracket("alice")).await.unwrap();

    let tick = t.quote("SOL", dec!(105)).await;
    assert!(t.engine.on_market_tick(&tick).await.is_empty());
    assert_eq!(t.engine.open_positions(Some("alice")).await.len(), 1);
}

#[tokio::test]
async fn test_short_levels_are_inverted() {
    let t = TestEngine::with_defaults();
    t.quote("SOL", dec!(100)).await;
    t.engine
        .submit_trade(
            TradeRequest::market("alice", "SOL", Side::Sell, dec!(1))
                .with_stop_loss(dec!(110))
                .with_take_profit(dec!(90)),
        )
        .await
        .unwrap();

    let tick = t.quote("SOL", dec!(89)).await;
    let closed = t.engine.on_market_tick(&tick).await;
    assert_eq!(closed[0].status, TradeStatus::Closed);
    assert!(closed[0].pnl.unwrap() > Decimal::ZERO);
}

#[tokio::test]
async fn test_pnl_round_trip() {
    let t = TestEngine::with_defaults();
    t.quote("SOL", dec!(100)).await;
    let trade = t
        .engine
        .submit_trade(TradeRequest::market("alice", "SOL", Side::Buy, dec!(3)))
        .await
        .unwrap();

    t.quote("SOL", dec!(104)).await;
    let closed = t.engine.close_position("alice", trade.id).await.unwrap();

    let exit = closed.exit_price.unwrap();
    assert_eq!(closed.pnl, Some((exit - trade.entry_price) * dec!(3)));
    assert_eq!(
        t.engine.balance("alice").await,
        dec!(10000) + closed.pnl.unwrap()
    );
}

#[tokio::test]
async fn test_losses_flow_into_daily_limit() {
    let t = TestEngine::new(
        RiskLimits {
            max_daily_loss_usd: dec!(15),
            ..Default::default()
        },
        SimulationConfig::default(),
    );
    t.quote("SOL", dec!(100)).await;
    t.engine
        .submit_trade(
            TradeRequest::market("alice", "SOL", Side::Buy, dec!(2)).with_stop_loss(dec!(92)),
        )
        .await
        .unwrap();

    let tick = t.quote("SOL", dec!(90)).await;
    t.engine.on_market_tick(&tick).await;

    let err = t
        .engine
        .submit_trade(TradeRequest::market("alice", "SOL", Side::Buy, dec!(1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TradeRejection::PolicyDenied(Denial::DailyLossLimit { .. })
    ));
    assert!(err.to_string().starts_with("Daily loss limit reached ($20."));
}

#[tokio::test]
async fn test_max_positions_per_user() {
    let t = TestEngine::new(
        RiskLimits {
            max_positions_per_user: 2,
            ..Default::default()
        },
        SimulationConfig::default(),
    );
    t.quote("SOL", dec!(100)).await;

    for _ in 0..2 {
        t.engine
            .submit_trade(TradeRequest::market("alice", "SOL", Side::Buy, dec!(1)))
            .await
            .unwrap();
    }
    let err = t
        .engine
        .submit_trade(TradeRequest::market("alice", "SOL", Side::Buy, dec!(1)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TradeRejection::PolicyDenied(Denial::MaxPositions { open: 2, max: 2 })
    );

    // Other users are unaffected
    assert!(t
        .engine
        .submit_trade(TradeRequest::market("bob", "SOL", Side::Buy, dec!(1)))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_insufficient_balance() {
    let t = TestEngine::new(
        RiskLimits::default(),
        SimulationConfig {
            initial_balance_usd: dec!(150),
            ..Default::default()
        },
    );
    t.quote("SOL", dec!(100)).await;

    let err = t
        .engine
        .submit_trade(TradeRequest::market("alice", "SOL", Side::Buy, dec!(2)))
        .await
        .unwrap_err();
    assert!(matches!(err, TradeRejection::InsufficientBalance { .. }));
    assert_eq!(t.engine.balance("alice").await, dec!(150));
    assert!(t.store.is_empty().await);
}

#[tokio::test]
async fn test_stale_snapshot_is_unavailable() {
    let t = TestEngine::with_defaults();
    t.quote("SOL", dec!(100)).await;
    t.clock.advance_ms(31_000);

    let err = t
        .engine
        .submit_trade(TradeRequest::market("alice", "SOL", Side::Buy, dec!(1)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "data_unavailable");
}

#[tokio::test]
async fn test_emergency_stop_is_idempotent() {
    let t = TestEngine::with_defaults();
    t.quote("SOL", dec!(100)).await;
    t.engine.submit_trade(bracket("alice")).await.unwrap();
    t.wait_cooldown();
    t.quote("ETH", dec!(100)).await;
    t.engine
        .submit_trade(TradeRequest::market("alice", "ETH", Side::Sell, dec!(1)))
        .await
        .unwrap();

    let first = t.engine.emergency_stop("alice", "risk breach").await;
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|trade| trade.status == TradeStatus::Stopped));

    let second = t.engine.emergency_stop("alice", "risk breach").await;
    assert!(second.is_empty());

    assert_eq!(t.engine.get_stats("alice").await.total_trades, 2);
    assert_eq!(t.alerts.with_severity(Severity::Critical).len(), 2);
    assert_eq!(
        t.engine.get_risk_status("alice").await.paused.as_deref(),
        Some("risk breach")
    );
}

#[tokio::test]
async fn test_emergency_stop_leaves_other_users() {
    let t = TestEngine::with_defaults();
    t.quote("SOL", dec!(100)).await;
    t.engine.submit_trade(bracket("alice")).await.unwrap();
    t.engine.submit_trade(bracket("bob")).await.unwrap();

    t.engine.emergency_stop("alice", "halt").await;

    assert!(t.engine.open_positions(Some("alice")).await.is_empty());
    assert_eq!(t.engine.open_positions(Some("bob")).await.len(), 1);
    assert!(t.engine.get_risk_status("bob").await.paused.is_none());
}

#[tokio::test]
async fn test_concurrent_submits_respect_position_cap() {
    let t = Arc::new(TestEngine::new(
        RiskLimits {
            max_positions_per_user: 1,
            ..Default::default()
        },
        SimulationConfig::default(),
    ));
    t.quote("SOL", dec!(100)).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let t = t.clone();
        handles.push(tokio::spawn(async move {
            t.engine
                .submit_trade(TradeRequest::market("alice", "SOL", Side::Buy, dec!(1)))
                .await
                .is_ok()
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}

#[test]
#[should_panic(expected = "already closed")]
fn test_double_close_panics() {
    let mut ledger = PositionLedger::new(dec!(1000));
    let fill = Fill {
        execution_price: dec!(100),
        slippage_bps: dec!(0),
    };
    let trade = ledger
        .open(
            &TradeRequest::market("alice", "SOL", Side::Buy, dec!(1)),
            fill,
            Utc::now(),
        )
        .unwrap();

    ledger.close(trade.id, dec!(101), TradeStatus::Closed, Utc::now());
    ledger.close(trade.id, dec!(101), TradeStatus::Closed, Utc::now());
}

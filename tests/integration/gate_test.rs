//! Risk gate integration tests

use paper_risk::clock::ManualClock;
use paper_risk::persistence::InMemoryPositionStore;
use paper_risk::risk::{Denial, RiskDecision, RiskGate, RiskLimits};
use paper_risk::telemetry::{MemoryAlertSink, Severity};
use rust_decimal_macros::dec;
use std::sync::Arc;

const T0: i64 = 1_700_000_000_000;

fn gate_with(limits: RiskLimits) -> (RiskGate, Arc<ManualClock>, Arc<MemoryAlertSink>) {
    let clock = Arc::new(ManualClock::new(T0));
    let alerts = Arc::new(MemoryAlertSink::new());
    let gate = RiskGate::new(
        limits,
        Arc::new(InMemoryPositionStore::new()),
        alerts.clone(),
        clock.clone(),
    )
    .unwrap();
    (gate, clock, alerts)
}

fn gate() -> (RiskGate, Arc<ManualClock>, Arc<MemoryAlertSink>) {
    gate_with(RiskLimits::default())
}

#[tokio::test]
async fn test_daily_loss_scenario() {
    let (gate, _clock, _alerts) = gate();

    assert_eq!(gate.can_execute_trade("u", dec!(200)).await, RiskDecision::Allowed);

    gate.record_trade_result("u", dec!(-600)).await;
    assert_eq!(gate.get_risk_status("u").await.daily_loss, dec!(600));

    let decision = gate.can_execute_trade("u", dec!(10)).await;
    assert_eq!(
        decision.reason().as_deref(),
        Some("Daily loss limit reached ($600.00)")
    );
}

#[tokio::test]
async fn test_daily_loss_boundary() {
    let (gate, clock, _alerts) = gate();
    gate.record_trade_result("at_limit", dec!(-500.00)).await;
    gate.record_trade_result("below", dec!(-499.99)).await;
    clock.advance_ms(6_000);

    assert!(matches!(
        gate.can_execute_trade("at_limit", dec!(10)).await,
        RiskDecision::Denied(Denial::DailyLossLimit { .. })
    ));
    assert!(gate.can_execute_trade("below", dec!(10)).await.is_allowed());
}

#[tokio::test]
async fn test_consecutive_losses_scenario() {
    let (gate, clock, alerts) = gate();

    for _ in 0..5 {
        gate.record_trade_result("u", dec!(-10)).await;
        clock.advance_ms(6_000);
    }

    let decision = gate.can_execute_trade("u", dec!(10)).await;
    assert_eq!(
        decision,
        RiskDecision::Denied(Denial::ConsecutiveLosses { count: 5 })
    );
    assert_eq!(alerts.with_severity(Severity::High).len(), 1);
}

#[tokio::test]
async fn test_win_resets_losing_streak() {
    let (gate, clock, _alerts) = gate();

    for pnl in [dec!(-10), dec!(-10), dec!(-10), dec!(-10), dec!(25)] {
        gate.record_trade_result("u", pnl).await;
        clock.advance_ms(6_000);
    }
    assert_eq!(gate.get_risk_status("u").await.consecutive_losses, 0);

    gate.record_trade_result("u", dec!(-10)).await;
    clock.advance_ms(6_000);
    assert!(gate.can_execute_trade("u", dec!(10)).await.is_allowed());
}

#[tokio::test]
async fn test_first_violation_wins() {
    let (gate, _clock, _alerts) = gate();

    // Daily loss, cooldown and oversize all violated: daily loss reported
    gate.record_trade_result("u", dec!(-700)).await;
    assert!(matches!(
        gate.can_execute_trade("u", dec!(5000)).await,
        RiskDecision::Denied(Denial::DailyLossLimit { .. })
    ));

    // A pause outranks everything
    gate.pause("u", "halt").await;
    assert_eq!(
        gate.can_execute_trade("u", dec!(5000)).await,
        RiskDecision::Denied(Denial::TradingPaused {
            reason: "halt".to_string()
        })
    );

    // Oversize outranks cooldown
    gate.record_trade_result("v", dec!(5)).await;
    assert!(matches!(
        gate.can_execute_trade("v", dec!(5000)).await,
        RiskDecision::Denied(Denial::PositionTooLarge { .. })
    ));
    assert!(matches!(
        gate.can_execute_trade("v", dec!(50)).await,
        RiskDecision::Denied(Denial::Cooldown { wait_secs: 5 })
    ));
}

#[tokio::test]
async fn test_risk_status_is_idempotent() {
    let (gate, _clock, _alerts) = gate();
    gate.record_trade_result("u", dec!(-42)).await;

    let first = gate.get_risk_status("u").await;
    for _ in 0..5 {
        assert_eq!(gate.get_risk_status("u").await, first);
    }
}

#[tokio::test]
async fn test_drawdown_alert_then_denial() {
    let (gate, clock, alerts) = gate();

    gate.record_trade_result("u", dec!(100)).await;
    gate.record_trade_result("u", dec!(-30)).await;

    let critical = alerts.with_severity(Severity::Critical);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].context["drawdown_percent"], "30.00");

    clock.advance_ms(6_000);
    assert!(matches!(
        gate.can_execute_trade("u", dec!(10)).await,
        RiskDecision::Denied(Denial::MaxDrawdown { .. })
    ));
}

#[tokio::test]
async fn test_rate_limit() {
    let (gate, clock, _alerts) = gate_with(RiskLimits {
        max_trades_per_minute: 3,
        min_time_between_trades_ms: 1_000,
        ..Default::default()
    });

    for _ in 0..3 {
        gate.record_trade_result("u", dec!(1)).await;
        clock.advance_ms(2_000);
    }
    assert_eq!(
        gate.can_execute_trade("u", dec!(10)).await,
        RiskDecision::Denied(Denial::RateLimit { max: 3 })
    );

    clock.advance_ms(60_000);
    assert!(gate.can_execute_trade("u", dec!(10)).await.is_allowed());
}

#[tokio::test]
async fn test_reset_daily_losses_keeps_streak() {
    let (gate, clock, _alerts) = gate();
    gate.record_trade_result("u", dec!(-600)).await;
    gate.reset_daily_losses().await;
    clock.advance_ms(6_000);

    let status = gate.get_risk_status("u").await;
    assert_eq!(status.daily_loss, dec!(0));
    assert_eq!(status.consecutive_losses, 1);
    assert!(gate.can_execute_trade("u", dec!(10)).await.is_allowed());
}

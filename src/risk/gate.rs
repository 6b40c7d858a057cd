//! Multi-rule trade admission gate

use super::counters::{RATE_WINDOW_MS, RETENTION_WINDOW_MS};
use super::{Denial, RiskCounters, RiskDecision, RiskError, RiskLimits, RiskStatus};
use crate::clock::Clock;
use crate::persistence::PositionStore;
use crate::telemetry::{self, AlertSink, LatencyMetric, Severity};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Default)]
struct Pauses {
    global: Option<String>,
    users: HashMap<String, String>,
}

/// Decides whether a proposed trade may execute
///
/// Rules are evaluated in a fixed order and the first violation wins:
/// trading pause, daily loss, position size, open positions, trade rate,
/// cooldown, losing streak, drawdown. Counters change only through
/// [`RiskGate::record_trade_result`].
pub struct RiskGate {
    limits: RwLock<RiskLimits>,
    counters: Mutex<HashMap<String, RiskCounters>>,
    pauses: RwLock<Pauses>,
    store: Arc<dyn PositionStore>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
}

impl RiskGate {
    /// Create a gate; fails if any limit is not positive
    pub fn new(
        limits: RiskLimits,
        store: Arc<dyn PositionStore>,
        alerts: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RiskError> {
        limits.validate()?;
        Ok(Self {
            limits: RwLock::new(limits),
            counters: Mutex::new(HashMap::new()),
            pauses: RwLock::new(Pauses::default()),
            store,
            alerts,
            clock,
        })
    }

    /// Limits currently in force
    pub async fn limits(&self) -> RiskLimits {
        self.limits.read().await.clone()
    }

    /// Swap limits; applies to subsequent evaluations only
    pub async fn update_limits(&self, limits: RiskLimits) -> Result<(), RiskError> {
        limits.validate()?;
        tracing::info!(?limits, "Risk limits updated");
        *self.limits.write().await = limits;
        Ok(())
    }

    /// Evaluate every admission rule for a trade of `position_size_usd`
    pub async fn can_execute_trade(&self, user_id: &str, position_size_usd: Decimal) -> RiskDecision {
        let started = Instant::now();
        let decision = self.evaluate(user_id, position_size_usd).await;
        telemetry::record_latency(LatencyMetric::GateEvaluation, started.elapsed());

        if let RiskDecision::Denied(denial) = &decision {
            telemetry::record_denial(denial.code());
            tracing::info!(user_id, %position_size_usd, reason = %denial, "Trade denied");
        }
        decision
    }

    async fn evaluate(&self, user_id: &str, position_size_usd: Decimal) -> RiskDecision {
        if let Some(reason) = self.paused_reason(user_id).await {
            return RiskDecision::Denied(Denial::TradingPaused { reason });
        }

        let limits = self.limits.read().await.clone();
        let counters = {
            let mut all = self.counters.lock().await;
            all.entry(user_id.to_string()).or_default().clone()
        };

        if counters.daily_loss >= limits.max_daily_loss_usd {
            return RiskDecision::Denied(Denial::DailyLossLimit {
                daily_loss: counters.daily_loss,
            });
        }

        if position_size_usd > limits.max_position_size_usd {
            return RiskDecision::Denied(Denial::PositionTooLarge {
                size: position_size_usd,
                max: limits.max_position_size_usd,
            });
        }

        match self.store.count_open_positions(user_id).await {
            Ok(open) if open >= limits.max_positions_per_user => {
                return RiskDecision::Denied(Denial::MaxPositions {
                    open,
                    max: limits.max_positions_per_user,
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Open position lookup failed");
                return RiskDecision::Denied(Denial::PositionCheckUnavailable);
            }
        }

        let now_ms = self.clock.now_ms();
        if counters.trades_within(now_ms, RATE_WINDOW_MS) >= limits.max_trades_per_minute {
            return RiskDecision::Denied(Denial::RateLimit {
                max: limits.max_trades_per_minute,
            });
        }

        if let Some(last_ms) = counters.last_trade_ms() {
            let min_gap = i64::try_from(limits.min_time_between_trades_ms).unwrap_or(i64::MAX);
            // A clock stepping backwards counts as no time elapsed
            let elapsed = now_ms.saturating_sub(last_ms).max(0);
            if elapsed < min_gap {
                let remaining = min_gap.saturating_sub(elapsed).unsigned_abs();
                return RiskDecision::Denied(Denial::Cooldown {
                    wait_secs: remaining.div_ceil(1000),
                });
            }
        }

        if counters.consecutive_losses >= limits.max_consecutive_losses {
            return RiskDecision::Denied(Denial::ConsecutiveLosses {
                count: counters.consecutive_losses,
            });
        }

        if let Some(percent) = counters.drawdown.percent() {
            if percent >= limits.max_drawdown_percent {
                return RiskDecision::Denied(Denial::MaxDrawdown { percent });
            }
        }

        RiskDecision::Allowed
    }

    /// Fold a closed trade's P&L into the user's counters
    ///
    /// Emits a high-severity alert when the losing streak reaches its limit
    /// and a critical alert when drawdown reaches its limit. Neither blocks
    /// anything by itself; the next admission check does.
    pub async fn record_trade_result(&self, user_id: &str, pnl: Decimal) {
        let limits = self.limits.read().await.clone();
        let now_ms = self.clock.now_ms();

        let counters = {
            let mut all = self.counters.lock().await;
            let counters = all.entry(user_id.to_string()).or_default();
            counters.record(pnl, now_ms);
            counters.clone()
        };

        tracing::debug!(
            user_id,
            %pnl,
            daily_loss = %counters.daily_loss,
            consecutive_losses = counters.consecutive_losses,
            "Trade result recorded"
        );

        if pnl < Decimal::ZERO && counters.consecutive_losses >= limits.max_consecutive_losses {
            self.alerts.emit(
                Severity::High,
                "Consecutive loss limit reached",
                json!({
                    "user_id": user_id,
                    "consecutive_losses": counters.consecutive_losses,
                    "limit": limits.max_consecutive_losses,
                }),
            );
        }

        if let Some(percent) = counters.drawdown.percent() {
            if percent >= limits.max_drawdown_percent {
                self.alerts.emit(
                    Severity::Critical,
                    "Max drawdown reached",
                    json!({
                        "user_id": user_id,
                        "drawdown_percent": format!("{percent:.2}"),
                        "peak": counters.drawdown.peak.to_string(),
                        "current": counters.drawdown.current.to_string(),
                    }),
                );
            }
        }
    }

    /// Derived view of a user's counters; never creates or mutates state
    pub async fn get_risk_status(&self, user_id: &str) -> RiskStatus {
        let limits = self.limits.read().await.clone();
        let counters = self
            .counters
            .lock()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        let paused = self.paused_reason(user_id).await;
        let now_ms = self.clock.now_ms();

        RiskStatus {
            user_id: user_id.to_string(),
            daily_loss: counters.daily_loss,
            daily_loss_limit: limits.max_daily_loss_usd,
            consecutive_losses: counters.consecutive_losses,
            trades_last_minute: counters.trades_within(now_ms, RATE_WINDOW_MS),
            trades_last_hour: counters.trades_within(now_ms, RETENTION_WINDOW_MS),
            last_trade_ms: counters.last_trade_ms(),
            drawdown_peak: counters.drawdown.peak,
            drawdown_current: counters.drawdown.current,
            drawdown_percent: counters.drawdown.percent(),
            paused,
            limits,
        }
    }

    /// Forget all counters for one user
    pub async fn reset_user(&self, user_id: &str) {
        self.counters.lock().await.remove(user_id);
        tracing::info!(user_id, "Risk counters reset");
    }

    /// Clear every user's daily loss
    pub async fn reset_daily_losses(&self) {
        let mut all = self.counters.lock().await;
        for counters in all.values_mut() {
            counters.reset_daily();
        }
        tracing::info!(users = all.len(), "Daily losses reset");
    }

    /// Pause one user's trading
    pub async fn pause(&self, user_id: &str, reason: &str) {
        let mut pauses = self.pauses.write().await;
        pauses.users.insert(user_id.to_string(), reason.to_string());
    }

    /// Pause trading for everyone
    pub async fn pause_all(&self, reason: &str) {
        self.pauses.write().await.global = Some(reason.to_string());
    }

    /// Lift one user's pause; a global pause still applies
    pub async fn resume(&self, user_id: &str) {
        self.pauses.write().await.users.remove(user_id);
    }

    /// Lift the global pause and every user pause
    pub async fn resume_all(&self) {
        let mut pauses = self.pauses.write().await;
        pauses.global = None;
        pauses.users.clear();
    }

    /// Active pause reason for a user, global pause first
    pub async fn paused_reason(&self, user_id: &str) -> Option<String> {
        let pauses = self.pauses.read().await;
        pauses
            .global
            .clone()
            .or_else(|| pauses.users.get(user_id).cloned())
    }
}

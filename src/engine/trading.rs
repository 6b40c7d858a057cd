//! Trading engine

use super::TradeRejection;
use crate::clock::{Clock, SystemClock};
use crate::config::SimulationConfig;
use crate::execution::{
    ExecutionSimulator, NoiseSource, SimulatedTrade, ThreadRngNoise, TradeId, TradeRequest,
    TradeStatus,
};
use crate::market::{MarketDataSource, MarketSnapshot};
use crate::persistence::PositionStore;
use crate::position::PositionLedger;
use crate::risk::{Denial, RiskDecision, RiskError, RiskGate, RiskLimits, RiskStatus};
use crate::stats::{StatsAggregator, TradingStats};
use crate::telemetry::{
    self, AlertSink, CounterMetric, GaugeMetric, LatencyMetric, Severity, TracingAlertSink,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Builder for [`TradingEngine`]
///
/// Alerts default to tracing, the clock to wall time, and slippage noise
/// to the thread-local RNG.
pub struct EngineBuilder {
    limits: RiskLimits,
    simulation: SimulationConfig,
    market: Arc<dyn MarketDataSource>,
    store: Arc<dyn PositionStore>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    noise: Box<dyn NoiseSource>,
}

impl EngineBuilder {
    pub fn new(market: Arc<dyn MarketDataSource>, store: Arc<dyn PositionStore>) -> Self {
        Self {
            limits: RiskLimits::default(),
            simulation: SimulationConfig::default(),
            market,
            store,
            alerts: Arc::new(TracingAlertSink),
            clock: Arc::new(SystemClock),
            noise: Box::new(ThreadRngNoise),
        }
    }

    pub fn limits(mut self, limits: RiskLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn simulation(mut self, simulation: SimulationConfig) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn noise(mut self, noise: Box<dyn NoiseSource>) -> Self {
        self.noise = noise;
        self
    }

    /// Validate the limits and assemble the engine
    pub fn build(self) -> Result<TradingEngine, RiskError> {
        let gate = RiskGate::new(
            self.limits,
            self.store.clone(),
            self.alerts.clone(),
            self.clock.clone(),
        )?;

        Ok(TradingEngine {
            gate: Arc::new(gate),
            simulator: ExecutionSimulator::new(self.simulation.noise_bps, self.noise),
            ledger: Mutex::new(PositionLedger::new(self.simulation.initial_balance_usd)),
            stats: Mutex::new(HashMap::new()),
            market: self.market,
            store: self.store,
            alerts: self.alerts,
            clock: self.clock,
            admission: RwLock::new(()),
            user_locks: Mutex::new(HashMap::new()),
        })
    }
}

/// Paper trading engine
///
/// Every mutation for one user (submit, manual close, emergency stop) runs
/// under that user's lock, so admission checks and the state they guard
/// cannot interleave. Those paths also hold the admission lock shared; a
/// global emergency stop holds it exclusively, so a submit that already
/// passed the pause check lands before the stop sweeps positions.
/// Tick-driven exits take only the ledger lock.
///
/// Lock order: admission, then user, then ledger.
pub struct TradingEngine {
    gate: Arc<RiskGate>,
    simulator: ExecutionSimulator,
    ledger: Mutex<PositionLedger>,
    stats: Mutex<HashMap<String, StatsAggregator>>,
    market: Arc<dyn MarketDataSource>,
    store: Arc<dyn PositionStore>,
    alerts: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    admission: RwLock<()>,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TradingEngine {
    pub fn builder(
        market: Arc<dyn MarketDataSource>,
        store: Arc<dyn PositionStore>,
    ) -> EngineBuilder {
        EngineBuilder::new(market, store)
    }

    /// The risk gate guarding admissions
    pub fn gate(&self) -> &Arc<RiskGate> {
        &self.gate
    }

    async fn user_lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Admit, fill and open a simulated position
    pub async fn submit_trade(
        &self,
        request: TradeRequest,
    ) -> Result<SimulatedTrade, TradeRejection> {
        validate_request(&request)?;
        let _admission = self.admission.read().await;
        let _guard = self.user_lock(&request.user_id).await;

        let snapshot = self.market.snapshot(&request.symbol).await.ok_or_else(|| {
            TradeRejection::DataUnavailable {
                symbol: request.symbol.clone(),
            }
        })?;

        // A notional beyond the Decimal range is larger than any limit
        let Some(size_usd) = request.amount.checked_mul(snapshot.mid) else {
            let max = self.gate.limits().await.max_position_size_usd;
            return Err(TradeRejection::PolicyDenied(Denial::PositionTooLarge {
                size: Decimal::MAX,
                max,
            }));
        };
        if let RiskDecision::Denied(denial) = self
            .gate
            .can_execute_trade(&request.user_id, size_usd)
            .await
        {
            return Err(TradeRejection::PolicyDenied(denial));
        }

        let fill = self
            .simulator
            .simulate_fill(&snapshot, request.side, request.amount);

        let trade = {
            let mut ledger = self.ledger.lock().await;
            ledger.record_mark(&snapshot.symbol, snapshot.mid);
            let trade = ledger.open(&request, fill, self.clock.now())?;
            telemetry::set_gauge(GaugeMetric::OpenPositions, ledger.open_count() as f64);
            trade
        };

        self.stats
            .lock()
            .await
            .entry(trade.user_id.clone())
            .or_default()
            .on_trade_opened(&trade);
        self.persist(&trade).await;
        telemetry::increment(CounterMetric::TradesOpened);

        tracing::info!(
            trade_id = %trade.id,
            user_id = %trade.user_id,
            symbol = %trade.symbol,
            side = ?trade.side,
            amount = %trade.amount,
            entry_price = %trade.entry_price,
            slippage_bps = %trade.slippage_bps,
            "Paper trade opened"
        );

        Ok(trade)
    }

    /// Evaluate stops and targets against a fresh snapshot
    ///
    /// Returns the positions closed by this tick. Each is realized exactly
    /// once: closing happens under the ledger lock, which refuses to close
    /// a position twice.
    pub async fn on_market_tick(&self, snapshot: &MarketSnapshot) -> Vec<SimulatedTrade> {
        let started = Instant::now();

        let closed = {
            let mut ledger = self.ledger.lock().await;
            ledger.record_mark(&snapshot.symbol, snapshot.mid);

            let mut closed = Vec::new();
            for (id, trigger) in ledger.triggered(snapshot) {
                let Some(trade) = ledger.get(id) else {
                    continue;
                };
                let exit = self
                    .simulator
                    .simulate_fill(snapshot, trade.side.opposite(), trade.amount);
                if let Some(trade) =
                    ledger.close(id, exit.execution_price, trigger.status(), self.clock.now())
                {
                    closed.push(trade);
                }
            }
            if !closed.is_empty() {
                telemetry::set_gauge(GaugeMetric::OpenPositions, ledger.open_count() as f64);
            }
            closed
        };

        for trade in &closed {
            if trade.status == TradeStatus::Stopped {
                telemetry::increment(CounterMetric::StopsTriggered);
            }
            tracing::info!(
                trade_id = %trade.id,
                user_id = %trade.user_id,
                status = %trade.status,
                exit_price = ?trade.exit_price,
                pnl = ?trade.pnl,
                "Exit level hit"
            );
            self.realize(trade).await;
        }

        telemetry::record_latency(LatencyMetric::TickEvaluation, started.elapsed());
        closed
    }

    /// Pull a snapshot for every symbol with open positions and evaluate it
    pub async fn evaluate_open_positions(&self) -> Vec<SimulatedTrade> {
        let symbols = self.ledger.lock().await.open_symbols();
        let mut closed = Vec::new();
        for symbol in symbols {
            match self.market.snapshot(&symbol).await {
                Some(snapshot) => closed.extend(self.on_market_tick(&snapshot).await),
                None => tracing::debug!(%symbol, "No fresh snapshot, exits not evaluated"),
            }
        }
        closed
    }

    /// Close one of the user's open positions at the simulated market price
    pub async fn close_position(
        &self,
        user_id: &str,
        trade_id: TradeId,
    ) -> Result<SimulatedTrade, TradeRejection> {
        let _admission = self.admission.read().await;
        let _guard = self.user_lock(user_id).await;

        let (symbol, side, amount) = {
            let ledger = self.ledger.lock().await;
            let trade = ledger
                .get(trade_id)
                .filter(|t| t.user_id == user_id && t.is_open())
                .ok_or(TradeRejection::PositionNotFound(trade_id))?;
            (trade.symbol.clone(), trade.side, trade.amount)
        };

        let snapshot = self
            .market
            .snapshot(&symbol)
            .await
            .ok_or_else(|| TradeRejection::DataUnavailable {
                symbol: symbol.clone(),
            })?;
        let exit = self
            .simulator
            .simulate_fill(&snapshot, side.opposite(), amount);

        let closed = {
            let mut ledger = self.ledger.lock().await;
            ledger.record_mark(&snapshot.symbol, snapshot.mid);
            // A tick may have closed it while the snapshot was fetched
            if !ledger.get(trade_id).is_some_and(|t| t.is_open()) {
                return Err(TradeRejection::PositionNotFound(trade_id));
            }
            let closed = ledger
                .close(trade_id, exit.execution_price, TradeStatus::Closed, self.clock.now())
                .ok_or(TradeRejection::PositionNotFound(trade_id))?;
            telemetry::set_gauge(GaugeMetric::OpenPositions, ledger.open_count() as f64);
            closed
        };

        tracing::info!(
            trade_id = %closed.id,
            user_id,
            pnl = ?closed.pnl,
            "Position closed manually"
        );
        self.realize(&closed).await;
        Ok(closed)
    }

    /// Pause a user and stop out all of their open positions
    ///
    /// Calling it again is harmless: the pause is overwritten and there is
    /// nothing left to close.
    pub async fn emergency_stop(&self, user_id: &str, reason: &str) -> Vec<SimulatedTrade> {
        let _admission = self.admission.read().await;
        let _guard = self.user_lock(user_id).await;

        self.gate.pause(user_id, reason).await;
        let stopped = self.force_stop(Some(user_id)).await;

        if let Err(e) = self
            .store
            .update_positions_status(Some(user_id), TradeStatus::Stopped)
            .await
        {
            tracing::error!(user_id, error = %e, "Failed to mark positions stopped");
        }
        if let Err(e) = self.store.set_trading_paused(Some(user_id), reason).await {
            tracing::error!(user_id, error = %e, "Failed to persist trading pause");
        }

        self.alerts.emit(
            Severity::Critical,
            "Emergency stop",
            json!({
                "user_id": user_id,
                "reason": reason,
                "positions_stopped": stopped.len(),
            }),
        );
        telemetry::increment(CounterMetric::EmergencyStops);
        stopped
    }

    /// Pause everyone and stop out every open position
    ///
    /// Waits for in-flight submits and closes to finish; none can start
    /// until the pause is in place.
    pub async fn global_emergency_stop(&self, reason: &str) -> Vec<SimulatedTrade> {
        let _admission = self.admission.write().await;
        self.gate.pause_all(reason).await;
        let stopped = self.force_stop(None).await;

        if let Err(e) = self
            .store
            .update_positions_status(None, TradeStatus::Stopped)
            .await
        {
            tracing::error!(error = %e, "Failed to mark positions stopped");
        }
        if let Err(e) = self.store.set_trading_paused(None, reason).await {
            tracing::error!(error = %e, "Failed to persist global trading pause");
        }

        self.alerts.emit(
            Severity::Critical,
            "Global emergency stop",
            json!({
                "reason": reason,
                "positions_stopped": stopped.len(),
            }),
        );
        telemetry::increment(CounterMetric::EmergencyStops);
        stopped
    }

    /// Lift a user's pause
    pub async fn resume_trading(&self, user_id: &str) {
        self.gate.resume(user_id).await;
        tracing::info!(user_id, "Trading resumed");
    }

    /// Lift every pause
    pub async fn resume_all(&self) {
        self.gate.resume_all().await;
        tracing::info!("Trading resumed for all users");
    }

    /// Close open positions at the last observed mid, or at entry when the
    /// symbol has never ticked
    async fn force_stop(&self, user_id: Option<&str>) -> Vec<SimulatedTrade> {
        let stopped = {
            let mut ledger = self.ledger.lock().await;
            let now = self.clock.now();
            let mut stopped = Vec::new();
            for trade in ledger.open_positions(user_id) {
                let exit_price = ledger.last_mark(&trade.symbol).unwrap_or(trade.entry_price);
                if let Some(closed) = ledger.close(trade.id, exit_price, TradeStatus::Stopped, now)
                {
                    stopped.push(closed);
                }
            }
            telemetry::set_gauge(GaugeMetric::OpenPositions, ledger.open_count() as f64);
            stopped
        };

        for trade in &stopped {
            self.realize(trade).await;
        }
        stopped
    }

    /// Forward a closed trade to the risk counters, stats and store
    async fn realize(&self, trade: &SimulatedTrade) {
        let pnl = trade.pnl.unwrap_or(Decimal::ZERO);
        self.gate.record_trade_result(&trade.user_id, pnl).await;

        let realized = {
            let mut stats = self.stats.lock().await;
            stats
                .entry(trade.user_id.clone())
                .or_default()
                .on_trade_closed(trade);
            stats
                .values()
                .fold(Decimal::ZERO, |acc, s| acc.saturating_add(s.stats().total_pnl))
        };
        telemetry::set_gauge(
            GaugeMetric::RealizedPnl,
            realized.to_f64().unwrap_or_default(),
        );

        self.persist(trade).await;
        telemetry::increment(CounterMetric::TradesClosed);
    }

    async fn persist(&self, trade: &SimulatedTrade) {
        if let Err(e) = self.store.save_position(trade).await {
            tracing::error!(trade_id = %trade.id, error = %e, "Failed to persist position");
        }
    }

    /// Aggregated statistics for a user; empty when they never traded
    pub async fn get_stats(&self, user_id: &str) -> TradingStats {
        self.stats
            .lock()
            .await
            .get(user_id)
            .map(|s| s.stats().clone())
            .unwrap_or_default()
    }

    /// Users with recorded activity, sorted
    pub async fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.stats.lock().await.keys().cloned().collect();
        users.sort();
        users
    }

    pub async fn get_risk_status(&self, user_id: &str) -> RiskStatus {
        self.gate.get_risk_status(user_id).await
    }

    /// Paper cash available to a user
    pub async fn balance(&self, user_id: &str) -> Decimal {
        self.ledger.lock().await.balance(user_id)
    }

    /// Open positions, optionally for one user
    pub async fn open_positions(&self, user_id: Option<&str>) -> Vec<SimulatedTrade> {
        self.ledger.lock().await.open_positions(user_id)
    }

    pub async fn closed_trades(&self, user_id: &str) -> Vec<SimulatedTrade> {
        self.ledger.lock().await.closed_trades(user_id)
    }

    pub async fn open_symbols(&self) -> Vec<String> {
        self.ledger.lock().await.open_symbols()
    }

    pub async fn update_limits(&self, limits: RiskLimits) -> Result<(), RiskError> {
        self.gate.update_limits(limits).await
    }

    pub async fn reset_user(&self, user_id: &str) {
        self.gate.reset_user(user_id).await;
    }

    pub async fn reset_daily_losses(&self) {
        self.gate.reset_daily_losses().await;
    }
}

fn validate_request(request: &TradeRequest) -> Result<(), TradeRejection> {
    if request.user_id.is_empty() {
        return Err(TradeRejection::InvalidRequest("user_id is empty".to_string()));
    }
    if request.symbol.is_empty() {
        return Err(TradeRejection::InvalidRequest("symbol is empty".to_string()));
    }
    if request.amount <= Decimal::ZERO {
        return Err(TradeRejection::InvalidRequest(format!(
            "amount must be positive, got {}",
            request.amount
        )));
    }
    for (name, level) in [
        ("stop_loss", request.stop_loss),
        ("take_profit", request.take_profit),
    ] {
        if level.is_some_and(|price| price <= Decimal::ZERO) {
            return Err(TradeRejection::InvalidRequest(format!(
                "{name} must be positive"
            )));
        }
    }
    Ok(())
}

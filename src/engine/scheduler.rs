//! Background tasks: daily loss reset and periodic exit evaluation

use super::TradingEngine;
use crate::risk::RiskGate;
use chrono::{DateTime, Days, Local, LocalResult, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const MIN_RESET_WAIT: Duration = Duration::from_secs(1);

/// Time from `now` until the next local midnight in `now`'s timezone
///
/// When midnight does not exist (a DST jump at 00:00) the first valid
/// instant after it is used.
pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> chrono::Duration {
    let tz = now.timezone();
    let Some(tomorrow) = now.date_naive().checked_add_days(Days::new(1)) else {
        return chrono::Duration::days(1);
    };

    for hour in 0..3 {
        let Some(candidate) = tomorrow.and_hms_opt(hour, 0, 0) else {
            continue;
        };
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(at) | LocalResult::Ambiguous(at, _) => {
                return at.signed_duration_since(now.clone());
            }
            LocalResult::None => continue,
        }
    }
    chrono::Duration::days(1)
}

/// Handles to the engine's background tasks
///
/// Dropping the handle does not stop the tasks; call [`EngineTasks::shutdown`].
pub struct EngineTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl EngineTasks {
    /// Spawn the midnight reset and the exit-evaluation loop
    pub fn spawn(engine: Arc<TradingEngine>, tick_interval: Duration) -> Self {
        let (shutdown, rx) = watch::channel(false);

        let reset = tokio::spawn(daily_reset_loop(engine.gate().clone(), rx.clone()));
        let ticks = tokio::spawn(tick_loop(engine, tick_interval, rx));

        tracing::info!(tick_interval_ms = tick_interval.as_millis() as u64, "Engine tasks started");
        Self {
            shutdown,
            handles: vec![reset, ticks],
        }
    }

    /// Signal every task to stop and wait for them
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Engine task ended abnormally");
            }
        }
        tracing::info!("Engine tasks stopped");
    }
}

async fn daily_reset_loop(gate: Arc<RiskGate>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let wait = until_next_midnight(&Local::now())
            .to_std()
            .unwrap_or(MIN_RESET_WAIT)
            .max(MIN_RESET_WAIT);
        tracing::debug!(wait_secs = wait.as_secs(), "Next daily loss reset scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => gate.reset_daily_losses().await,
            _ = shutdown.changed() => break,
        }
    }
}

async fn tick_loop(
    engine: Arc<TradingEngine>,
    tick_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let closed = engine.evaluate_open_positions().await;
                if !closed.is_empty() {
                    tracing::debug!(closed = closed.len(), "Tick closed positions");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Admission check, including the open-position lookup
    GateEvaluation,
    /// Stop/target evaluation for one market tick
    TickEvaluation,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Open simulated positions across all users
    OpenPositions,
    /// Realized P&L across all users
    RealizedPnl,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    TradesOpened,
    TradesClosed,
    StopsTriggered,
    EmergencyStops,
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::GateEvaluation => "paper_risk_gate_evaluation_ms",
        LatencyMetric::TickEvaluation => "paper_risk_tick_evaluation_ms",
    };
    metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::OpenPositions => "paper_risk_open_positions",
        GaugeMetric::RealizedPnl => "paper_risk_realized_pnl_usd",
    };
    metrics::gauge!(metric_name).set(value);
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    let metric_name = match metric {
        CounterMetric::TradesOpened => "paper_risk_trades_opened_total",
        CounterMetric::TradesClosed => "paper_risk_trades_closed_total",
        CounterMetric::StopsTriggered => "paper_risk_stops_triggered_total",
        CounterMetric::EmergencyStops => "paper_risk_emergency_stops_total",
    };
    metrics::counter!(metric_name).increment(1);
}

/// Count a denied admission, labelled by denial code
pub fn record_denial(code: &'static str) {
    metrics::counter!("paper_risk_trades_denied_total", "reason" => code).increment(1);
}

//! One-way alert channel

use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

/// Destination for risk alerts; implementations must not block
pub trait AlertSink: Send + Sync {
    fn emit(&self, severity: Severity, message: &str, context: Value);
}

/// Routes alerts into the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn emit(&self, severity: Severity, message: &str, context: Value) {
        match severity {
            Severity::Info => tracing::info!(alert = true, %context, "{}", message),
            Severity::Warning => tracing::warn!(alert = true, %context, "{}", message),
            Severity::High | Severity::Critical => {
                tracing::error!(alert = true, ?severity, %context, "{}", message)
            }
        }
    }
}

/// An alert captured by [`MemoryAlertSink`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
    pub context: Value,
}

/// Keeps every alert in memory
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all alerts so far
    pub fn alerts(&self) -> Vec<Alert> {
        match self.alerts.lock() {
            Ok(alerts) => alerts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Alerts at exactly `severity`
    pub fn with_severity(&self, severity: Severity) -> Vec<Alert> {
        self.alerts()
            .into_iter()
            .filter(|a| a.severity == severity)
            .collect()
    }
}

impl AlertSink for MemoryAlertSink {
    fn emit(&self, severity: Severity, message: &str, context: Value) {
        let alert = Alert {
            severity,
            message: message.to_string(),
            context,
        };
        match self.alerts.lock() {
            Ok(mut alerts) => alerts.push(alert),
            Err(poisoned) => poisoned.into_inner().push(alert),
        }
    }
}

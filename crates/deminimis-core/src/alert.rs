//! Failure notifications. Delivery (mail, chat, ...) is up to the sink.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Timeout or selector-class failure: the page contract likely changed.
    ScrapingFailure,
    /// Calculation succeeded but the figures deserve a manual check.
    SuspiciousResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub tax_id: String,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, tax_id: impl Into<String>, message: impl Into<String>) -> Self {
        Alert {
            kind,
            tax_id: tax_id.into(),
            message: message.into(),
            context: BTreeMap::new(),
            raised_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

pub trait AlertSink {
    fn notify(&mut self, alert: &Alert);
}

impl<T: AlertSink + ?Sized> AlertSink for &mut T {
    fn notify(&mut self, alert: &Alert) {
        (**self).notify(alert)
    }
}

/// Logs alerts at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn notify(&mut self, alert: &Alert) {
        warn!(
            kind = ?alert.kind,
            tax_id = %alert.tax_id,
            context = ?alert.context,
            "ALERT: {}",
            alert.message
        );
    }
}

/// Keeps alerts in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingAlertSink {
    pub alerts: Vec<Alert>,
}

impl AlertSink for RecordingAlertSink {
    fn notify(&mut self, alert: &Alert) {
        self.alerts.push(alert.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send<S: AlertSink>(mut sink: S, alert: Alert) {
        sink.notify(&alert);
    }

    #[test]
    fn test_recording_through_mut_ref() {
        let mut sink = RecordingAlertSink::default();
        send(
            &mut sink,
            Alert::new(AlertKind::ScrapingFailure, "01392840417", "timeout").with_context("pages_visited", 2),
        );
        assert_eq!(sink.alerts.len(), 1);
        assert_eq!(sink.alerts[0].context["pages_visited"], "2");
    }
}

//! services/api/src/adapters/alerts.rs
//!
//! Alert sink that logs every alert and keeps the most recent ones so the
//! client can poll and display them.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use ully_core::ports::AlertSink;

const RECENT_ALERTS: usize = 20;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AlertRecord {
    pub title: String,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct TracingAlertSink {
    recent: Mutex<VecDeque<AlertRecord>>,
}

impl TracingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts raised so far, newest first.
    pub fn recent(&self) -> Vec<AlertRecord> {
        match self.recent.lock() {
            Ok(recent) => recent.iter().rev().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl AlertSink for TracingAlertSink {
    fn alert(&self, title: &str, message: &str) {
        warn!("Alert raised: {}: {}", title, message);
        if let Ok(mut recent) = self.recent.lock() {
            if recent.len() == RECENT_ALERTS {
                recent.pop_front();
            }
            recent.push_back(AlertRecord {
                title: title.to_string(),
                message: message.to_string(),
                raised_at: Utc::now(),
            });
        }
    }
}

//! Bounded log of recent error events, for operators.
//!
//! Components record failures they absorb (job errors, generation failures,
//! degraded lookups) so they stay visible after the log line scrolls away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
    /// Component that absorbed the error ("reflect", "conversation", ...)
    pub source: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

pub struct ErrorLog {
    capacity: usize,
    events: Mutex<VecDeque<ErrorEvent>>,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ErrorLog {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append an event, evicting the oldest once full.
    pub fn record(&self, source: &str, severity: Severity, message: impl Into<String>) {
        let event = ErrorEvent {
            message: message.into(),
            source: source.to_string(),
            severity,
            timestamp: Utc::now(),
        };
        let mut events = self.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ErrorEvent> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Events are only appended and cloned, so a poisoned lock still holds
    /// consistent data.
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ErrorEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

//! Shared state for the alert list, poll health and notification history

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::alert::{count_active, AlertRecord};
use crate::notifier::NotificationRecord;

/// Message recorded when no credential is available
pub const UNAUTHENTICATED_MESSAGE: &str = "Not authenticated";

/// Result of applying a fresh snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub previous_active_count: usize,
    pub active_count: usize,
}

impl Transition {
    /// The active count moved from zero to non-zero
    pub fn transitioned_to_active(&self) -> bool {
        self.previous_active_count == 0 && self.active_count > 0
    }
}

/// Serializable view of the monitor state for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub has_active: bool,
    pub active_count: usize,
    pub total_count: usize,
    pub is_loading: bool,
    pub unauthenticated: bool,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub poll_interval_ms: u64,
    pub last_poll_epoch_ms: u64,
    pub uptime_seconds: u64,
}

/// State of one monitor activation, shared by the poller and readers
#[derive(Debug)]
pub struct MonitorState {
    pub alerts: Vec<AlertRecord>,
    pub active_count: usize,
    pub previous_active_count: usize,
    pub poll_interval: Duration,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub unauthenticated: bool,
    pub is_loading: bool,
    pub last_poll_epoch_ms: u64,
    pub history: VecDeque<NotificationRecord>,
    pub history_max_size: usize,
    pub started_at: Instant,
}

impl MonitorState {
    pub fn new(initial_interval: Duration, history_max_size: usize) -> Self {
        Self {
            alerts: Vec::new(),
            active_count: 0,
            previous_active_count: 0,
            poll_interval: initial_interval,
            consecutive_failures: 0,
            last_error: None,
            unauthenticated: false,
            is_loading: true,
            last_poll_epoch_ms: 0,
            history: VecDeque::with_capacity(history_max_size),
            history_max_size,
            started_at: Instant::now(),
        }
    }

    pub fn has_active(&self) -> bool {
        self.active_count > 0
    }

    /// Replace the alert list with a fresh snapshot and report the transition.
    ///
    /// Clears the error and failure counter; the caller sets the interval.
    pub fn apply_snapshot(&mut self, alerts: Vec<AlertRecord>, now_ms: u64) -> Transition {
        let previous_active_count = self.active_count;
        let active_count = count_active(&alerts);

        self.alerts = alerts;
        self.previous_active_count = previous_active_count;
        self.active_count = active_count;
        self.consecutive_failures = 0;
        self.last_error = None;
        self.unauthenticated = false;
        self.is_loading = false;
        self.last_poll_epoch_ms = now_ms;

        Transition {
            previous_active_count,
            active_count,
        }
    }

    /// Record a failed fetch. The last-known alert list is kept.
    pub fn record_failure(&mut self, message: String, now_ms: u64) -> u32 {
        self.consecutive_failures += 1;
        self.last_error = Some(message);
        self.is_loading = false;
        self.last_poll_epoch_ms = now_ms;
        self.consecutive_failures
    }

    /// No credential: clear everything the operator could act on
    pub fn mark_unauthenticated(&mut self) {
        self.alerts.clear();
        self.active_count = 0;
        self.previous_active_count = 0;
        self.unauthenticated = true;
        self.last_error = Some(UNAUTHENTICATED_MESSAGE.to_string());
        self.is_loading = false;
    }

    /// Add a notification to history
    pub fn add_notification(&mut self, record: NotificationRecord) {
        if self.history_max_size == 0 {
            return;
        }
        if self.history.len() >= self.history_max_size {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            has_active: self.has_active(),
            active_count: self.active_count,
            total_count: self.alerts.len(),
            is_loading: self.is_loading,
            unauthenticated: self.unauthenticated,
            last_error: self.last_error.clone(),
            consecutive_failures: self.consecutive_failures,
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            last_poll_epoch_ms: self.last_poll_epoch_ms,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Thread-safe shared state handle
pub type StateHandle = Arc<RwLock<MonitorState>>;

pub fn new_state_handle(initial_interval: Duration, history_max_size: usize) -> StateHandle {
    Arc::new(RwLock::new(MonitorState::new(
        initial_interval,
        history_max_size,
    )))
}

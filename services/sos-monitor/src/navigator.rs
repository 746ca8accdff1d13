//! Operator view tracking and redirects

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Access to the operator's current view
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    /// Path of the view the operator is looking at
    fn current_path(&self) -> String;

    /// Move the operator to `path`, replacing the current history entry
    fn replace(&self, path: &str);
}

/// Snapshot of the tracked view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub path: String,
    /// Incremented on every redirect so clients can tell a new one apart
    pub redirect_seq: u64,
    pub pending_redirect: Option<String>,
}

/// In-process view tracker shared between the monitor and the dashboard.
///
/// The dashboard reports the page the operator is on; redirects replace
/// that path and stay pending until the client acknowledges them by
/// reporting its new path.
#[derive(Debug, Clone, Default)]
pub struct ViewTracker {
    inner: Arc<RwLock<ViewState>>,
}

impl ViewTracker {
    pub fn new(initial_path: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ViewState {
                path: initial_path.to_string(),
                ..Default::default()
            })),
        }
    }

    pub fn snapshot(&self) -> ViewState {
        self.inner
            .read()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// Record the path the client is showing, clearing any pending redirect
    pub fn report_path(&self, path: &str) {
        if let Ok(mut state) = self.inner.write() {
            state.path = path.to_string();
            state.pending_redirect = None;
        }
    }
}

impl Navigator for ViewTracker {
    fn current_path(&self) -> String {
        self.snapshot().path
    }

    fn replace(&self, path: &str) {
        if let Ok(mut state) = self.inner.write() {
            tracing::info!("Redirecting operator view from '{}' to '{}'", state.path, path);
            state.path = path.to_string();
            state.redirect_seq += 1;
            state.pending_redirect = Some(path.to_string());
        }
    }
}

/// Whether `current` is showing the alert list at `alert_list_path`
pub fn is_on_alert_list(current: &str, alert_list_path: &str) -> bool {
    let target = alert_list_path.trim_end_matches('/');
    if target.is_empty() {
        // a root list only matches the root itself, not every path
        let path = current.split(['?', '#']).next().unwrap_or_default();
        return path.trim_end_matches('/').is_empty();
    }
    current.contains(target)
}

//! Notifier trait for sending alerts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Whether a notifier may show notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Not decided yet; must be requested before showing anything
    Default,
    Granted,
    Denied,
}

/// A notification to be sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// The notification stays until the operator dismisses it
    pub require_interaction: bool,
}

impl Notification {
    /// Summary notification for `active_count` active alerts
    pub fn active_alerts(active_count: usize) -> Self {
        Self {
            title: "Active SOS Alert".to_string(),
            body: active_alerts_message(active_count),
            require_interaction: true,
        }
    }
}

/// "There is 1 active SOS alert ..." / "There are N active SOS alerts ..."
pub fn active_alerts_message(active_count: usize) -> String {
    if active_count == 1 {
        "There is 1 active SOS alert requiring attention.".to_string()
    } else {
        format!(
            "There are {} active SOS alerts requiring attention.",
            active_count
        )
    }
}

/// Record of a dispatched notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub notifier_type: String,
    pub message: String,
    pub active_count: usize,
    pub permission: Permission,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp_epoch_ms: u64,
}

/// Trait for sending notifications
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Get the notifier type name (e.g. "pushover")
    fn type_name(&self) -> &str;

    /// Current permission, without prompting
    fn permission(&self) -> Permission;

    /// Ask for permission. Only called while the permission is `Default`.
    async fn request_permission(&self) -> Permission;

    /// Send a notification
    async fn notify(&self, notification: &Notification) -> crate::Result<()>;
}

/// Writes notifications to the service log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn type_name(&self) -> &str {
        "log"
    }

    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        tracing::warn!("{}: {}", notification.title, notification.body);
        Ok(())
    }
}

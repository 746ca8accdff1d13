//! Side effects of active alerts: notifications and redirects

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::config::{AlertsConfig, RedirectPolicy};
use crate::navigator::{is_on_alert_list, Navigator};
use crate::notifier::{Notification, NotificationRecord, Notifier, Permission};
use crate::state::{StateHandle, Transition};

/// Sends notifications and redirects the operator when alerts become active
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
    navigator: Arc<dyn Navigator>,
    alert_list_path: String,
    redirect_policy: RedirectPolicy,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("notifiers", &self.notifiers)
            .field("alert_list_path", &self.alert_list_path)
            .field("redirect_policy", &self.redirect_policy)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        notifiers: Vec<Arc<dyn Notifier>>,
        navigator: Arc<dyn Navigator>,
        config: &AlertsConfig,
    ) -> Self {
        Self {
            notifiers,
            navigator,
            alert_list_path: config.alert_list_path.clone(),
            redirect_policy: config.redirect_policy,
        }
    }

    /// Whether this poll result calls for notifying and redirecting
    pub fn should_dispatch(&self, transition: &Transition) -> bool {
        if transition.transitioned_to_active() {
            return true;
        }
        match self.redirect_policy {
            RedirectPolicy::OnTransition => false,
            RedirectPolicy::WhileOffAlertList => {
                transition.active_count > 0
                    && !is_on_alert_list(&self.navigator.current_path(), &self.alert_list_path)
            }
        }
    }

    /// Run side effects for `transition`. Returns true if anything was dispatched.
    ///
    /// Once `cancel` fires, pending notifications are abandoned and the
    /// operator is not redirected.
    pub async fn handle(
        &self,
        transition: &Transition,
        state: &StateHandle,
        cancel: &CancellationToken,
    ) -> bool {
        if !self.should_dispatch(transition) {
            return false;
        }

        tracing::info!(
            "{} active SOS alert(s) (previously {})",
            transition.active_count,
            transition.previous_active_count
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = self.notify_all(transition.active_count, state) => {}
        }
        if cancel.is_cancelled() {
            tracing::debug!("Monitor deactivated during dispatch, skipping redirect");
            return false;
        }

        // Redirect does not depend on whether any notification went out
        self.navigator.replace(&self.alert_list_path);
        true
    }

    async fn notify_all(&self, active_count: usize, state: &StateHandle) {
        let notification = Notification::active_alerts(active_count);

        for notifier in &self.notifiers {
            let mut permission = notifier.permission();
            if permission == Permission::Default {
                permission = notifier.request_permission().await;
                tracing::debug!(
                    "Notification permission for '{}': {:?}",
                    notifier.type_name(),
                    permission
                );
            }

            if permission != Permission::Granted {
                tracing::debug!(
                    "Skipping '{}' notification, permission {:?}",
                    notifier.type_name(),
                    permission
                );
                continue;
            }

            let result = notifier.notify(&notification).await;
            if let Err(e) = &result {
                tracing::warn!(
                    "Notification via '{}' failed: {}",
                    notifier.type_name(),
                    e
                );
            }

            let record = NotificationRecord {
                notifier_type: notifier.type_name().to_string(),
                message: notification.body.clone(),
                active_count,
                permission,
                success: result.is_ok(),
                error: result.as_ref().err().map(|e| e.to_string()),
                timestamp_epoch_ms: current_epoch_ms(),
            };
            state.write().await.add_notification(record);
        }
    }
}

pub(crate) fn current_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

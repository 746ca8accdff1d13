//! Pushover notification client

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::NotifierConfig;
use crate::io::HttpClient;
use crate::notifier::{Notification, Notifier, Permission};

const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";
const PUSHOVER_VALIDATE_URL: &str = "https://api.pushover.net/1/users/validate.json";

/// Pushover priority that repeats until acknowledged
const EMERGENCY_PRIORITY: &str = "2";
const HIGH_PRIORITY: &str = "1";

/// Pushover notification sender.
///
/// Permission starts undecided and is settled by validating the user key
/// against the Pushover API.
pub struct PushoverNotifier {
    api_token: String,
    user_key: String,
    sound: String,
    emergency_retry_seconds: u32,
    emergency_expire_seconds: u32,
    permission: Mutex<Permission>,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for PushoverNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushoverNotifier")
            .field("sound", &self.sound)
            .field("permission", &self.permission())
            .finish()
    }
}

impl PushoverNotifier {
    pub fn new(config: &NotifierConfig, http: Arc<dyn HttpClient>) -> crate::Result<Self> {
        let NotifierConfig::Pushover {
            api_token,
            user_key,
            sound,
            emergency_retry_seconds,
            emergency_expire_seconds,
        } = config
        else {
            return Err(crate::SosMonitorError::Config(format!(
                "Expected pushover notifier config, got '{}'",
                config.type_name()
            )));
        };

        tracing::debug!("Created PushoverNotifier with sound '{}'", sound);

        Ok(Self {
            api_token: api_token.clone(),
            user_key: user_key.clone(),
            sound: sound.clone(),
            emergency_retry_seconds: *emergency_retry_seconds,
            emergency_expire_seconds: *emergency_expire_seconds,
            permission: Mutex::new(Permission::Default),
            http,
        })
    }

    fn set_permission(&self, permission: Permission) {
        if let Ok(mut guard) = self.permission.lock() {
            *guard = permission;
        }
    }
}

#[async_trait]
impl Notifier for PushoverNotifier {
    fn type_name(&self) -> &str {
        "pushover"
    }

    fn permission(&self) -> Permission {
        self.permission
            .lock()
            .map(|guard| *guard)
            .unwrap_or(Permission::Default)
    }

    async fn request_permission(&self) -> Permission {
        let params = [
            ("token", self.api_token.as_str()),
            ("user", self.user_key.as_str()),
        ];

        let permission = match self.http.post_form(PUSHOVER_VALIDATE_URL, &params).await {
            Ok(response) if response.status == 200 => Permission::Granted,
            Ok(response) if (400..500).contains(&response.status) => {
                tracing::warn!(
                    "Pushover rejected credentials ({}): {}",
                    response.status,
                    response.body
                );
                Permission::Denied
            }
            Ok(response) => {
                tracing::debug!("Pushover validation returned {}", response.status);
                Permission::Default
            }
            Err(e) => {
                // transient; ask again on the next dispatch
                tracing::debug!("Pushover validation failed: {}", e);
                Permission::Default
            }
        };

        self.set_permission(permission);
        permission
    }

    async fn notify(&self, notification: &Notification) -> crate::Result<()> {
        let retry = self.emergency_retry_seconds.to_string();
        let expire = self.emergency_expire_seconds.to_string();
        let mut params = vec![
            ("token", self.api_token.as_str()),
            ("user", self.user_key.as_str()),
            ("title", notification.title.as_str()),
            ("message", notification.body.as_str()),
            ("sound", self.sound.as_str()),
        ];
        if notification.require_interaction {
            params.push(("priority", EMERGENCY_PRIORITY));
            params.push(("retry", retry.as_str()));
            params.push(("expire", expire.as_str()));
        } else {
            params.push(("priority", HIGH_PRIORITY));
        }

        tracing::debug!(
            "Sending Pushover notification: title='{}', require_interaction={}",
            notification.title,
            notification.require_interaction
        );

        let response = self.http.post_form(PUSHOVER_API_URL, &params).await?;

        if response.status != 200 {
            return Err(crate::SosMonitorError::Notifier(format!(
                "Pushover API returned status {}: {}",
                response.status, response.body
            )));
        }

        tracing::debug!("Pushover notification sent successfully");
        Ok(())
    }
}

//! Configuration types for the SOS monitor service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix marking a secret that should be read from the environment
const ENV_SECRET_PREFIX: &str = "env:";

/// Largest accepted backoff multiplier
const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Largest accepted poll interval ceiling (one day)
const MAX_POLL_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default = "default_notifiers")]
    pub notifiers: Vec<NotifierConfig>,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            alerts: AlertsConfig::default(),
            notifiers: default_notifiers(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Config {
    /// Replace `env:NAME` secrets with the value of the named variable
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        for notifier in &mut self.notifiers {
            if let NotifierConfig::Pushover {
                api_token,
                user_key,
                ..
            } = notifier
            {
                resolve_secret(api_token)?;
                resolve_secret(user_key)?;
            }
        }
        if let CredentialConfig::Static { token } = &mut self.api.credential {
            resolve_secret(token)?;
        }
        Ok(())
    }

    /// Reject settings the poller cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.polling.initial_interval_ms == 0 {
            return Err(crate::SosMonitorError::Config(
                "polling.initial_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.polling.initial_interval_ms > self.polling.max_interval_ms {
            return Err(crate::SosMonitorError::Config(format!(
                "polling.initial_interval_ms ({}) exceeds polling.max_interval_ms ({})",
                self.polling.initial_interval_ms, self.polling.max_interval_ms
            )));
        }
        if self.polling.max_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(crate::SosMonitorError::Config(format!(
                "polling.max_interval_ms must be at most {}, got {}",
                MAX_POLL_INTERVAL_MS, self.polling.max_interval_ms
            )));
        }
        let multiplier = self.polling.backoff_multiplier;
        if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&multiplier) {
            return Err(crate::SosMonitorError::Config(format!(
                "polling.backoff_multiplier must be between 1.0 and {}, got {}",
                MAX_BACKOFF_MULTIPLIER, multiplier
            )));
        }
        if !self.alerts.alert_list_path.starts_with('/') {
            return Err(crate::SosMonitorError::Config(format!(
                "alerts.alert_list_path must be absolute, got '{}'",
                self.alerts.alert_list_path
            )));
        }
        if self.alerts.alert_list_path.trim_end_matches('/').is_empty() {
            return Err(crate::SosMonitorError::Config(
                "alerts.alert_list_path must name a page, not the root".to_string(),
            ));
        }
        Ok(())
    }
}

fn resolve_secret(value: &mut String) -> crate::Result<()> {
    if let Some(var) = value.strip_prefix(ENV_SECRET_PREFIX) {
        let resolved = std::env::var(var).map_err(|_| {
            crate::SosMonitorError::Config(format!("Environment variable {} is not set", var))
        })?;
        *value = resolved;
    }
    Ok(())
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub credential: CredentialConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            credential: CredentialConfig::default(),
        }
    }
}

/// Where the API bearer token comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialConfig {
    Env {
        #[serde(default = "default_token_env")]
        var: String,
    },
    File {
        path: PathBuf,
    },
    Static {
        token: String,
    },
}

impl Default for CredentialConfig {
    fn default() -> Self {
        CredentialConfig::Env {
            var: default_token_env(),
        }
    }
}

/// Poll interval bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval(),
            max_interval_ms: default_max_interval(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// When the operator's view is pulled to the alert list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectPolicy {
    /// Only when the active count goes from zero to non-zero
    #[default]
    OnTransition,
    /// Also on every poll while alerts are active and the view is elsewhere
    WhileOffAlertList,
}

/// Alert handling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_alert_list_path")]
    pub alert_list_path: String,
    #[serde(default)]
    pub redirect_policy: RedirectPolicy,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            alert_list_path: default_alert_list_path(),
            redirect_policy: RedirectPolicy::default(),
        }
    }
}

/// Notifier configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotifierConfig {
    #[serde(rename = "log")]
    Log,
    #[serde(rename = "pushover")]
    Pushover {
        api_token: String,
        user_key: String,
        #[serde(default = "default_pushover_sound")]
        sound: String,
        #[serde(default = "default_emergency_retry")]
        emergency_retry_seconds: u32,
        #[serde(default = "default_emergency_expire")]
        emergency_expire_seconds: u32,
    },
}

impl NotifierConfig {
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Log => "log",
            NotifierConfig::Pushover { .. } => "pushover",
        }
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
            history_size: default_history_size(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_token_env() -> String {
    "SOS_API_TOKEN".to_string()
}

fn default_initial_interval() -> u64 {
    5000
}

fn default_max_interval() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_alert_list_path() -> String {
    "/dashboard/sos-list".to_string()
}

fn default_notifiers() -> Vec<NotifierConfig> {
    vec![NotifierConfig::Log]
}

fn default_pushover_sound() -> String {
    "siren".to_string()
}

fn default_emergency_retry() -> u32 {
    60
}

fn default_emergency_expire() -> u32 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    11120
}

fn default_history_size() -> usize {
    100
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::SosMonitorError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

//! SOS Monitor - SOS alert monitoring and notification service
//!
//! Polls the operations backend for SOS alerts raised by field guards,
//! backs off while the backend is unreachable, and pulls the operator to the
//! alert list when alerts become active.

pub mod alert;
pub mod backoff;
pub mod config;
pub mod credentials;
pub mod dashboard;
pub mod dispatcher;
pub mod error;
pub mod io;
pub mod navigator;
pub mod notifier;
pub mod poller;
pub mod pushover;
pub mod sos_client;
pub mod state;

pub use alert::{AlertFilter, AlertRecord, AlertStatus};
pub use config::{load_config, Config};
pub use error::{Result, SosMonitorError};
pub use poller::{CycleOutcome, MonitorControl, MonitorHandle};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::config::NotifierConfig;
use crate::credentials::CredentialStore;
use crate::dispatcher::Dispatcher;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::navigator::{Navigator, ViewTracker};
use crate::notifier::{LogNotifier, Notifier};
use crate::poller::Poller;
use crate::pushover::PushoverNotifier;
use crate::sos_client::{AlertSource, SosApiClient};

/// Initial view of the operator before the dashboard reports one
const INITIAL_VIEW_PATH: &str = "/";

/// Builder for [`SosMonitor`]. Collaborators not supplied are built from
/// the configuration.
pub struct SosMonitorBuilder {
    config: Config,
    http: Option<Arc<dyn HttpClient>>,
    source: Option<Arc<dyn AlertSource>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    notifiers: Option<Vec<Arc<dyn Notifier>>>,
    view: Option<ViewTracker>,
}

impl SosMonitorBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: None,
            source: None,
            credentials: None,
            notifiers: None,
            view: None,
        }
    }

    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn AlertSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_notifiers(mut self, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        self.notifiers = Some(notifiers);
        self
    }

    pub fn with_view(mut self, view: ViewTracker) -> Self {
        self.view = Some(view);
        self
    }

    pub fn build(self) -> Result<SosMonitor> {
        self.config.validate()?;

        let http: Arc<dyn HttpClient> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(
                self.config.api.request_timeout_seconds,
            ))?),
        };

        let source = self.source.unwrap_or_else(|| {
            Arc::new(SosApiClient::new(
                &self.config.api.base_url,
                Arc::clone(&http),
            )) as Arc<dyn AlertSource>
        });
        let credentials = self
            .credentials
            .unwrap_or_else(|| credentials::from_config(&self.config.api.credential));
        let notifiers = match self.notifiers {
            Some(notifiers) => notifiers,
            None => build_notifiers(&self.config.notifiers, &http)?,
        };
        let view = self
            .view
            .unwrap_or_else(|| ViewTracker::new(INITIAL_VIEW_PATH));

        tracing::debug!(
            "Building SOS monitor: {} notifier(s), redirect policy {:?}",
            notifiers.len(),
            self.config.alerts.redirect_policy
        );

        let dispatcher = Dispatcher::new(
            notifiers,
            Arc::new(view.clone()) as Arc<dyn Navigator>,
            &self.config.alerts,
        );
        let poller = Poller::new(
            source,
            credentials,
            dispatcher,
            BackoffPolicy::from(&self.config.polling),
            self.config.dashboard.history_size,
        );

        Ok(SosMonitor {
            config: self.config,
            poller: Arc::new(poller),
            view,
        })
    }
}

/// Build notifiers from their configuration
pub fn build_notifiers(
    configs: &[NotifierConfig],
    http: &Arc<dyn HttpClient>,
) -> Result<Vec<Arc<dyn Notifier>>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    for notifier_config in configs {
        let notifier: Arc<dyn Notifier> = match notifier_config {
            NotifierConfig::Log => Arc::new(LogNotifier),
            NotifierConfig::Pushover { .. } => {
                Arc::new(PushoverNotifier::new(notifier_config, Arc::clone(http))?)
            }
        };
        notifiers.push(notifier);
    }
    Ok(notifiers)
}

/// A configured monitor that can be activated any number of times
pub struct SosMonitor {
    config: Config,
    poller: Arc<Poller>,
    view: ViewTracker,
}

impl SosMonitor {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn view(&self) -> ViewTracker {
        self.view.clone()
    }

    /// Start polling with fresh state
    pub fn activate(&self) -> MonitorHandle {
        self.poller.activate()
    }

    /// Run until ctrl-c, serving the dashboard if enabled
    pub async fn start(self) -> Result<()> {
        let handle = self.activate();
        let cancel = handle.cancellation_token();

        let cancel_for_signal = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown signal received"),
                Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
            }
            cancel_for_signal.cancel();
        });

        if self.config.dashboard.enabled {
            let dashboard_port = self.config.dashboard.port;
            let router = dashboard::build_router(dashboard::DashboardState {
                control: handle.control(),
                view: self.view.clone(),
                alert_list_path: self.config.alerts.alert_list_path.clone(),
            });
            let cancel_for_dashboard = cancel.clone();

            tokio::spawn(async move {
                let addr = SocketAddr::from(([0, 0, 0, 0], dashboard_port));
                tracing::info!("Dashboard listening on http://{}", addr);

                let listener = match tokio::net::TcpListener::bind(addr).await {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::error!(
                            "Failed to bind dashboard to port {}: {}. Continuing without dashboard.",
                            dashboard_port,
                            e
                        );
                        return;
                    }
                };

                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        cancel_for_dashboard.cancelled().await;
                    })
                    .await
                    .ok();

                tracing::debug!("Dashboard stopped");
            });
        }

        tracing::info!("SOS monitor started");

        // an unauthenticated activation has no loop; keep serving until ctrl-c
        handle.cancelled().await;
        handle.deactivate().await;

        tracing::info!("SOS monitor stopped");
        Ok(())
    }
}

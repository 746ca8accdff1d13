//! Poller: fetches the SOS list on an adaptive schedule
//!
//! Each activation owns a fresh [`MonitorState`](crate::state::MonitorState)
//! and a cancellation token. The loop fetches immediately, applies the
//! result, then waits for the interval chosen by the backoff policy before
//! the next fetch. Deactivation cancels the wait and any in-flight fetch;
//! a fetch that was cancelled leaves state and side effects untouched.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::alert::{AlertRecord, AlertStatus};
use crate::backoff::{BackoffPolicy, PollOutcome};
use crate::credentials::CredentialStore;
use crate::dispatcher::{current_epoch_ms, Dispatcher};
use crate::sos_client::AlertSource;
use crate::state::{new_state_handle, StateHandle, Transition};

/// What a single poll cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fresh snapshot applied
    Updated(Transition),
    /// Fetch failed; backoff escalated
    Failed,
    /// No credential present
    Unauthenticated,
    /// The activation ended before the cycle could complete
    Cancelled,
}

/// Polls an [`AlertSource`] and feeds results to the [`Dispatcher`]
pub struct Poller {
    source: Arc<dyn AlertSource>,
    credentials: Arc<dyn CredentialStore>,
    dispatcher: Dispatcher,
    backoff: BackoffPolicy,
    history_size: usize,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("dispatcher", &self.dispatcher)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Per-activation resources
#[derive(Debug)]
struct Session {
    state: StateHandle,
    cancel: CancellationToken,
    // serializes scheduled cycles and manual refreshes
    in_flight: Mutex<()>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn AlertSource>,
        credentials: Arc<dyn CredentialStore>,
        dispatcher: Dispatcher,
        backoff: BackoffPolicy,
        history_size: usize,
    ) -> Self {
        Self {
            source,
            credentials,
            dispatcher,
            backoff,
            history_size,
        }
    }

    /// Start monitoring with fresh state.
    ///
    /// Without a credential the state is marked unauthenticated and no fetch
    /// is scheduled.
    pub fn activate(self: &Arc<Self>) -> MonitorHandle {
        let session = Arc::new(Session {
            state: new_state_handle(self.backoff.floor, self.history_size),
            cancel: CancellationToken::new(),
            in_flight: Mutex::new(()),
        });
        let control = MonitorControl {
            poller: Arc::clone(self),
            session: Arc::clone(&session),
        };

        if self.credentials.token().is_none() {
            tracing::warn!("No API credential present, SOS polling not started");
            if let Ok(mut state) = session.state.try_write() {
                state.mark_unauthenticated();
            }
            return MonitorHandle {
                control,
                task: None,
            };
        }

        tracing::info!("Activating SOS monitor");
        let poller = Arc::clone(self);
        let task = tokio::spawn(async move {
            poller.run(&session).await;
        });

        MonitorHandle {
            control,
            task: Some(task),
        }
    }

    async fn run(&self, session: &Session) {
        loop {
            let outcome = self.poll_once(session).await;
            match outcome {
                CycleOutcome::Cancelled => break,
                CycleOutcome::Unauthenticated => {
                    tracing::warn!("API credential disappeared, SOS polling stopped");
                    break;
                }
                CycleOutcome::Updated(_) | CycleOutcome::Failed => {}
            }

            // read the interval now so changes apply from the next cycle on
            let interval = session.state.read().await.poll_interval;
            tracing::debug!("Next SOS poll in {:?}", interval);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = session.cancel.cancelled() => {
                    tracing::debug!("SOS polling loop cancelled");
                    break;
                }
            }
        }
    }

    async fn poll_once(&self, session: &Session) -> CycleOutcome {
        let _in_flight = session.in_flight.lock().await;
        if session.cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let Some(token) = self.credentials.token() else {
            session.state.write().await.mark_unauthenticated();
            return CycleOutcome::Unauthenticated;
        };

        tracing::debug!("Fetching SOS list");
        let result = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => {
                tracing::debug!("In-flight SOS fetch abandoned");
                return CycleOutcome::Cancelled;
            }
            result = self.source.fetch_alerts(&token) => result,
        };
        if session.cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let now_ms = current_epoch_ms();
        match result {
            Ok(alerts) => {
                let transition = {
                    let mut state = session.state.write().await;
                    let transition = state.apply_snapshot(alerts, now_ms);
                    state.poll_interval =
                        self.backoff.next(state.poll_interval, PollOutcome::Success);
                    transition
                };

                tracing::debug!(
                    "SOS poll: active {} -> {}",
                    transition.previous_active_count,
                    transition.active_count
                );

                self.dispatcher
                    .handle(&transition, &session.state, &session.cancel)
                    .await;
                CycleOutcome::Updated(transition)
            }
            Err(e) => {
                let mut state = session.state.write().await;
                let failures = state.record_failure(e.to_string(), now_ms);
                state.poll_interval =
                    self.backoff.next(state.poll_interval, PollOutcome::Failure);
                tracing::warn!(
                    "Failed to fetch SOS list ({} consecutive): {}; retrying in {:?}",
                    failures,
                    e,
                    state.poll_interval
                );
                CycleOutcome::Failed
            }
        }
    }
}

/// Cloneable access to a running activation, for readers and manual actions
#[derive(Debug, Clone)]
pub struct MonitorControl {
    poller: Arc<Poller>,
    session: Arc<Session>,
}

impl MonitorControl {
    pub fn state(&self) -> StateHandle {
        Arc::clone(&self.session.state)
    }

    pub fn is_active(&self) -> bool {
        !self.session.cancel.is_cancelled()
    }

    /// Wait for a poll cycle that is currently running to finish
    pub async fn settled(&self) {
        drop(self.session.in_flight.lock().await);
    }

    /// Run one poll cycle outside the schedule
    pub async fn refresh(&self) -> CycleOutcome {
        self.poller.poll_once(&self.session).await
    }

    /// Update an alert's status on the backend, then refresh the list
    pub async fn update_alert_status(
        &self,
        id: i64,
        status: AlertStatus,
        comment: Option<String>,
    ) -> crate::Result<AlertRecord> {
        let token = self
            .poller
            .credentials
            .token()
            .ok_or(crate::SosMonitorError::Unauthenticated)?;

        let updated = self
            .poller
            .source
            .update_status(&token, id, status, comment)
            .await?;
        tracing::info!("SOS {} set to {}", id, status.as_str());

        self.refresh().await;
        Ok(updated)
    }
}

/// Owner of an activation. Dropping it cancels polling without waiting for
/// the loop to exit.
#[derive(Debug)]
pub struct MonitorHandle {
    control: MonitorControl,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn control(&self) -> MonitorControl {
        self.control.clone()
    }

    pub fn state(&self) -> StateHandle {
        self.control.state()
    }

    /// Whether a polling loop was started for this activation
    pub fn is_polling(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Resolves once the activation has been cancelled
    pub async fn cancelled(&self) {
        self.control.session.cancel.cancelled().await;
    }

    /// Token that deactivates this monitor when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.control.session.cancel.clone()
    }

    /// Stop polling and wait for the loop to exit
    pub async fn deactivate(mut self) {
        tracing::info!("Deactivating SOS monitor");
        self.control.session.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("SOS polling task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.control.session.cancel.cancel();
    }
}

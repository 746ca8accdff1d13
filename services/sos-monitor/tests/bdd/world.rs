//! BDD test world for the SOS monitor service

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cucumber::World;
use tokio::sync::Notify;

use sos_monitor::backoff::BackoffPolicy;
use sos_monitor::credentials::StaticCredentialStore;
use sos_monitor::io::{HttpClient, HttpResponse};
use sos_monitor::navigator::ViewTracker;
use sos_monitor::notifier::{Notification, Notifier, Permission};
use sos_monitor::state::StateHandle;
use sos_monitor::{Config, CycleOutcome, MonitorControl, MonitorHandle, SosMonitorBuilder};

// --- Test doubles ---

/// What the fake backend does with the next `GET /sos`
#[derive(Debug, Clone)]
pub enum BackendReply {
    Alerts(serde_json::Value),
    Status(u16),
    Unreachable,
    /// Blocks until released, then answers with the alerts
    Held(serde_json::Value),
}

/// An HTTP client standing in for the operations backend and Pushover.
///
/// `GET /sos` replays queued replies, then keeps serving the current list.
/// `PATCH /sos/{id}/status` edits the current list.
#[derive(Debug, Default)]
pub struct FakeBackend {
    replies: Mutex<VecDeque<BackendReply>>,
    current: Mutex<Vec<serde_json::Value>>,
    pub gets: Mutex<Vec<(String, String)>>,
    pub patches: Mutex<Vec<(String, serde_json::Value)>>,
    pub posts: Mutex<Vec<(String, Vec<(String, String)>)>>,
    pub fetch_started: Notify,
    pub release: Notify,
    pushover_status: Mutex<Option<u16>>,
}

impl FakeBackend {
    pub fn push(&self, reply: BackendReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn get_count(&self) -> usize {
        self.gets.lock().unwrap().len()
    }

    pub fn set_pushover_status(&self, status: u16) {
        *self.pushover_status.lock().unwrap() = Some(status);
    }

    pub fn posts_to(&self, url_fragment: &str) -> Vec<Vec<(String, String)>> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.contains(url_fragment))
            .map(|(_, params)| params.clone())
            .collect()
    }

    fn serve(&self, alerts: serde_json::Value) -> HttpResponse {
        *self.current.lock().unwrap() = alerts.as_array().cloned().unwrap_or_default();
        HttpResponse {
            status: 200,
            body: alerts.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for FakeBackend {
    async fn get(&self, url: &str, bearer: &str) -> sos_monitor::Result<HttpResponse> {
        self.gets
            .lock()
            .unwrap()
            .push((url.to_string(), bearer.to_string()));
        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(BackendReply::Alerts(alerts)) => Ok(self.serve(alerts)),
            Some(BackendReply::Status(status)) => Ok(HttpResponse {
                status,
                body: r#"{"error":"backend failure"}"#.to_string(),
            }),
            Some(BackendReply::Unreachable) => Err(sos_monitor::SosMonitorError::Http(
                "connection refused".to_string(),
            )),
            Some(BackendReply::Held(alerts)) => {
                self.fetch_started.notify_one();
                self.release.notified().await;
                Ok(self.serve(alerts))
            }
            None => {
                let current = serde_json::Value::Array(self.current.lock().unwrap().clone());
                Ok(self.serve(current))
            }
        }
    }

    async fn patch_json(
        &self,
        url: &str,
        _bearer: &str,
        body: &serde_json::Value,
    ) -> sos_monitor::Result<HttpResponse> {
        self.patches
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));

        let id: i64 = url
            .trim_end_matches("/status")
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let mut current = self.current.lock().unwrap();
        match current.iter_mut().find(|a| a["id"] == id) {
            Some(alert) => {
                alert["status"] = body["status"].clone();
                if let Some(comment) = body.get("comment") {
                    alert["comment"] = comment.clone();
                }
                Ok(HttpResponse {
                    status: 200,
                    body: alert.to_string(),
                })
            }
            None => Ok(HttpResponse {
                status: 404,
                body: r#"{"error":"SOS not found"}"#.to_string(),
            }),
        }
    }

    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> sos_monitor::Result<HttpResponse> {
        self.posts.lock().unwrap().push((
            url.to_string(),
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));
        let status = self.pushover_status.lock().unwrap().unwrap_or(200);
        Ok(HttpResponse {
            status,
            body: r#"{"status":1}"#.to_string(),
        })
    }
}

/// A notifier with scripted permission that records what it shows
#[derive(Debug)]
pub struct TestNotifier {
    permission: Mutex<Permission>,
    answer: Permission,
    pub requests: Mutex<u32>,
    pub shown: Mutex<Vec<Notification>>,
}

impl TestNotifier {
    pub fn new(permission: Permission, answer: Permission) -> Self {
        Self {
            permission: Mutex::new(permission),
            answer,
            requests: Mutex::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for TestNotifier {
    fn type_name(&self) -> &str {
        "test"
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> Permission {
        *self.requests.lock().unwrap() += 1;
        *self.permission.lock().unwrap() = self.answer;
        self.answer
    }

    async fn notify(&self, notification: &Notification) -> sos_monitor::Result<()> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Parse "1:pending, 2:resolved" into backend SOS records
pub fn alerts_json(list: &str) -> serde_json::Value {
    let records: Vec<serde_json::Value> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (id, status) = entry
                .split_once(':')
                .unwrap_or_else(|| panic!("bad alert entry '{}'", entry));
            serde_json::json!({
                "id": id.trim().parse::<i64>().unwrap(),
                "sos_type": "emergency",
                "latitude": 6.5244,
                "longitude": 3.3792,
                "created_at": "2026-03-14T10:00:00Z",
                "staff_id": 7,
                "guard_name": "Ada Guard",
                "status": status.trim(),
            })
        })
        .collect();
    serde_json::Value::Array(records)
}

pub fn parse_permission(s: &str) -> Permission {
    match s {
        "default" => Permission::Default,
        "granted" => Permission::Granted,
        "denied" => Permission::Denied,
        other => panic!("Unknown permission: {}", other),
    }
}

// --- World ---

#[derive(Debug, Default, World)]
pub struct SosMonitorWorld {
    // Monitor wiring
    pub config: Config,
    pub token: Option<String>,
    pub backend: Arc<FakeBackend>,
    pub notifiers: Vec<Arc<dyn Notifier>>,
    pub test_notifier: Option<Arc<TestNotifier>>,
    pub view: Option<ViewTracker>,

    // Running monitor
    pub handle: Option<MonitorHandle>,
    pub control: Option<MonitorControl>,
    pub state: Option<StateHandle>,
    pub last_outcome: Option<CycleOutcome>,

    // Backoff testing
    pub backoff: Option<BackoffPolicy>,
    pub interval: Option<Duration>,

    // Dashboard testing
    pub response_status: Option<u16>,
    pub response_body: Option<String>,

    // Configuration testing
    pub config_result: Option<sos_monitor::Result<Config>>,
}

impl SosMonitorWorld {
    pub fn view(&mut self) -> ViewTracker {
        self.view
            .get_or_insert_with(|| ViewTracker::new("/dashboard/requests"))
            .clone()
    }

    /// Build a monitor around the fake backend and activate it
    pub fn activate(&mut self) {
        let view = self.view();
        let http: Arc<dyn HttpClient> = self.backend.clone();
        let mut builder = SosMonitorBuilder::new(self.config.clone())
            .with_http_client(http)
            .with_credentials(Arc::new(StaticCredentialStore::new(self.token.clone())))
            .with_view(view);
        if !self.notifiers.is_empty() {
            builder = builder.with_notifiers(self.notifiers.clone());
        }

        let monitor = builder.build().expect("monitor should build");
        let handle = monitor.activate();
        self.control = Some(handle.control());
        self.state = Some(handle.state());
        self.handle = Some(handle);
    }

    pub fn control(&self) -> &MonitorControl {
        self.control.as_ref().expect("monitor not activated")
    }

    pub fn state(&self) -> &StateHandle {
        self.state.as_ref().expect("monitor not activated")
    }

    /// Wait until the backend has seen `count` fetches and the cycle is done
    pub async fn wait_for_fetches(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.backend.get_count() < count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "backend saw {} fetches, expected {}",
                self.backend.get_count(),
                count
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.control().settled().await;
    }

    /// Run one out-of-schedule poll cycle
    pub async fn poll(&mut self) {
        let outcome = self.control().refresh().await;
        self.last_outcome = Some(outcome);
    }
}

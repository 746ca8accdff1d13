//! BDD step definitions for polling feature

use std::time::Duration;

use cucumber::gherkin::Step;
use cucumber::{given, then, when};

use sos_monitor::CycleOutcome;

use crate::world::{alerts_json, BackendReply, SosMonitorWorld};

#[given("a signed-in operator")]
fn signed_in(world: &mut SosMonitorWorld) {
    world.token = Some("operator-token".to_string());
}

#[given("no credential is stored")]
fn no_credential(world: &mut SosMonitorWorld) {
    world.token = None;
}

#[given(expr = "the backend returns alerts {string}")]
fn backend_returns(world: &mut SosMonitorWorld, alerts: String) {
    world.backend.push(BackendReply::Alerts(alerts_json(&alerts)));
}

#[given("the backend returns the records:")]
fn backend_returns_records(world: &mut SosMonitorWorld, step: &Step) {
    let body = step.docstring.as_ref().expect("docstring required");
    let records: serde_json::Value =
        serde_json::from_str(body).expect("records must be valid JSON");
    world.backend.push(BackendReply::Alerts(records));
}

#[given("the backend is unreachable")]
fn backend_unreachable(world: &mut SosMonitorWorld) {
    world.backend.push(BackendReply::Unreachable);
}

#[given(expr = "the backend holds its response with alerts {string}")]
fn backend_holds(world: &mut SosMonitorWorld, alerts: String) {
    world.backend.push(BackendReply::Held(alerts_json(&alerts)));
}

#[when("the monitor is activated")]
async fn monitor_activated(world: &mut SosMonitorWorld) {
    world.activate();
    if world.token.is_some() {
        world.wait_for_fetches(1).await;
    }
}

#[when("the monitor is activated and the first fetch is in flight")]
async fn monitor_activated_in_flight(world: &mut SosMonitorWorld) {
    world.activate();
    world.backend.fetch_started.notified().await;
}

#[when("the next poll fails")]
async fn next_poll_fails(world: &mut SosMonitorWorld) {
    world.backend.push(BackendReply::Unreachable);
    world.poll().await;
}

#[when(expr = "the next poll gets status {int}")]
async fn next_poll_status(world: &mut SosMonitorWorld, status: u16) {
    world.backend.push(BackendReply::Status(status));
    world.poll().await;
}

#[when(expr = "the next poll returns alerts {string}")]
async fn next_poll_returns(world: &mut SosMonitorWorld, alerts: String) {
    world.backend.push(BackendReply::Alerts(alerts_json(&alerts)));
    world.poll().await;
}

#[when("a poll is requested")]
async fn poll_requested(world: &mut SosMonitorWorld) {
    world.poll().await;
}

#[when("the monitor is deactivated")]
async fn monitor_deactivated(world: &mut SosMonitorWorld) {
    let handle = world.handle.take().expect("monitor not activated");
    handle.deactivate().await;
}

#[when("the held response arrives")]
async fn held_response_arrives(world: &mut SosMonitorWorld) {
    world.backend.release.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[then(expr = "the monitor holds {int} alert(s)")]
async fn monitor_holds(world: &mut SosMonitorWorld, count: usize) {
    assert_eq!(world.state().read().await.alerts.len(), count);
}

#[then(expr = "the active alert count is {int}")]
async fn active_count(world: &mut SosMonitorWorld, count: usize) {
    let state = world.state().read().await;
    assert_eq!(state.active_count, count);
    assert_eq!(state.has_active(), count > 0);
}

#[then(expr = "the monitor polls every {int} ms")]
async fn polls_every(world: &mut SosMonitorWorld, interval_ms: u64) {
    let interval = world.state().read().await.poll_interval;
    assert_eq!(interval, Duration::from_millis(interval_ms));
}

#[then(expr = "the consecutive failure count is {int}")]
async fn failure_count(world: &mut SosMonitorWorld, count: u32) {
    assert_eq!(world.state().read().await.consecutive_failures, count);
}

#[then(expr = "the last error mentions {string}")]
async fn last_error_mentions(world: &mut SosMonitorWorld, expected: String) {
    let state = world.state().read().await;
    let error = state.last_error.as_deref().expect("no error recorded");
    assert!(
        error.contains(&expected),
        "Expected last error to mention '{}', got '{}'",
        expected,
        error
    );
}

#[then("no error is recorded")]
async fn no_error(world: &mut SosMonitorWorld) {
    let state = world.state().read().await;
    assert!(state.last_error.is_none(), "{:?}", state.last_error);
    assert_eq!(state.consecutive_failures, 0);
}

#[then("the monitor is unauthenticated")]
async fn unauthenticated(world: &mut SosMonitorWorld) {
    let state = world.state().read().await;
    assert!(state.unauthenticated);
    assert!(!state.has_active());
    let handle = world.handle.as_ref().expect("monitor not activated");
    assert!(!handle.is_polling());
}

#[then("the monitor is still loading")]
async fn still_loading(world: &mut SosMonitorWorld) {
    assert!(world.state().read().await.is_loading);
}

#[then("the monitor is not loading")]
async fn not_loading(world: &mut SosMonitorWorld) {
    assert!(!world.state().read().await.is_loading);
}

#[then(expr = "the backend was polled {int} time(s)")]
fn backend_polled(world: &mut SosMonitorWorld, count: usize) {
    assert_eq!(world.backend.get_count(), count);
}

#[then(expr = "the backend received the bearer token {string}")]
fn bearer_token(world: &mut SosMonitorWorld, token: String) {
    let gets = world.backend.gets.lock().unwrap();
    assert!(!gets.is_empty());
    for (url, bearer) in gets.iter() {
        assert!(url.ends_with("/sos"), "unexpected url {}", url);
        assert_eq!(bearer, &token);
    }
}

#[then("the last poll was cancelled")]
fn last_poll_cancelled(world: &mut SosMonitorWorld) {
    assert_eq!(world.last_outcome, Some(CycleOutcome::Cancelled));
}

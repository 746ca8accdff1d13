//! BDD step definitions for configuration feature

use cucumber::gherkin::Step;
use cucumber::{given, then};

use sos_monitor::config::RedirectPolicy;
use sos_monitor::load_config;

use crate::world::SosMonitorWorld;

#[given("a configuration file containing:")]
fn config_file(world: &mut SosMonitorWorld, step: &Step) {
    let content = step.docstring.as_ref().expect("docstring required");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sos-monitor.json");
    std::fs::write(&path, content).unwrap();

    world.config_result = Some(load_config(&path).and_then(|config| {
        config.validate()?;
        Ok(config)
    }));
}

fn loaded(world: &SosMonitorWorld) -> &sos_monitor::Config {
    match world.config_result.as_ref().expect("no configuration loaded") {
        Ok(config) => config,
        Err(e) => panic!("configuration failed to load: {}", e),
    }
}

#[then("the configuration loads")]
fn config_loads(world: &mut SosMonitorWorld) {
    loaded(world);
}

#[then(expr = "the polling bounds are {int} ms to {int} ms")]
fn polling_bounds(world: &mut SosMonitorWorld, floor: u64, ceiling: u64) {
    let config = loaded(world);
    assert_eq!(config.polling.initial_interval_ms, floor);
    assert_eq!(config.polling.max_interval_ms, ceiling);
}

#[then(expr = "the configured redirect policy is {string}")]
fn configured_policy(world: &mut SosMonitorWorld, policy: String) {
    let expected = match policy.as_str() {
        "on_transition" => RedirectPolicy::OnTransition,
        "while_off_alert_list" => RedirectPolicy::WhileOffAlertList,
        other => panic!("Unknown redirect policy: {}", other),
    };
    assert_eq!(loaded(world).alerts.redirect_policy, expected);
}

#[then(expr = "the configured notifiers are {string}")]
fn configured_notifiers(world: &mut SosMonitorWorld, names: String) {
    let expected: Vec<&str> = names.split(',').map(str::trim).collect();
    let actual: Vec<&str> = loaded(world)
        .notifiers
        .iter()
        .map(|n| n.type_name())
        .collect();
    assert_eq!(actual, expected);
}

#[then(expr = "the alert list path is {string}")]
fn alert_list_path(world: &mut SosMonitorWorld, path: String) {
    assert_eq!(loaded(world).alerts.alert_list_path, path);
}

#[then(expr = "the configuration is rejected with {string}")]
fn config_rejected(world: &mut SosMonitorWorld, expected: String) {
    match world.config_result.as_ref().expect("no configuration loaded") {
        Ok(_) => panic!("expected configuration to be rejected"),
        Err(e) => assert!(
            e.to_string().contains(&expected),
            "Expected error to mention '{}', got '{}'",
            expected,
            e
        ),
    }
}

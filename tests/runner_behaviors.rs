//! Runner Behavioral Tests - BDD Style
//!
//! Following BDD naming convention: given_<context>_when_<action>_then_<outcome>
//!
//! These tests run configured controllers the way the `factory` binary does
//! and observe them through the shared operator status.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use factory::{ControllerConfig, FactoryConfig, build_controller, run_controllers};
use factory_controller::{ConditionStatus, InMemoryOperatorClient, find_operator_condition};
use tokio_util::sync::CancellationToken;

/// Test helper: Unwrap a Result or panic with context
fn must<T, E: std::fmt::Display>(result: std::result::Result<T, E>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("{context}: {e}"),
    }
}

async fn condition_status(
    status: &InMemoryOperatorClient,
    condition_type: &str,
) -> Option<ConditionStatus> {
    let current = status.status().await;
    find_operator_condition(&current.conditions, condition_type).map(|c| c.status)
}

fn reporting(name: &str) -> ControllerConfig {
    ControllerConfig {
        report_degraded: true,
        seed_keys: vec![format!("default/{}", name.to_lowercase())],
        ..ControllerConfig::new(name)
    }
}

#[tokio::test]
async fn given_two_reporting_controllers_when_run_then_both_report_healthy() {
    // GIVEN: Two controllers sharing one operator status
    let config = FactoryConfig {
        controllers: vec![reporting("Alpha"), reporting("Beta")],
    };
    must(config.validate(), "Precondition: config should be valid");
    let status = Arc::new(InMemoryOperatorClient::new());
    let ctx = CancellationToken::new();

    // WHEN: Running until both seed keys have been reconciled
    let runner = {
        let status = Arc::clone(&status);
        let ctx = ctx.clone();
        tokio::spawn(async move { run_controllers(&config, status, ctx).await })
    };
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        let alpha = condition_status(&status, "AlphaDegraded").await;
        let beta = condition_status(&status, "BetaDegraded").await;
        if alpha.is_some() && beta.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    ctx.cancel();

    // THEN: Each owns a healthy Degraded condition and the runner exits cleanly
    let joined = must(
        tokio::time::timeout(Duration::from_secs(5), runner).await,
        "runner should stop after cancellation",
    );
    let result = must(joined, "runner task should not panic");
    assert!(result.is_ok(), "runner should succeed: {result:?}");
    assert_eq!(
        condition_status(&status, "AlphaDegraded").await,
        Some(ConditionStatus::False)
    );
    assert_eq!(
        condition_status(&status, "BetaDegraded").await,
        Some(ConditionStatus::False)
    );
}

#[tokio::test]
async fn given_controller_without_reporting_when_run_then_status_untouched() {
    // GIVEN: A controller that does not report Degraded
    let config = FactoryConfig {
        controllers: vec![ControllerConfig {
            seed_keys: vec!["default/quiet".to_string()],
            ..ControllerConfig::new("Quiet")
        }],
    };
    let status = Arc::new(InMemoryOperatorClient::new());
    let ctx = CancellationToken::new();

    // WHEN: Running briefly
    let runner = {
        let status = Arc::clone(&status);
        let ctx = ctx.clone();
        tokio::spawn(async move { run_controllers(&config, status, ctx).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    ctx.cancel();
    let joined = must(
        tokio::time::timeout(Duration::from_secs(5), runner).await,
        "runner should stop",
    );

    // THEN: No status writes happened
    assert!(must(joined, "runner task should not panic").is_ok());
    assert_eq!(status.write_count(), 0);
}

#[test]
fn given_invalid_schedule_when_building_then_error_names_controller() {
    // GIVEN: An entry with an unparsable schedule
    let config = ControllerConfig {
        resync_schedules: vec!["sometimes".to_string()],
        ..ControllerConfig::new("Broken")
    };

    // WHEN: Building the controller
    let result = build_controller(&config, &Arc::new(InMemoryOperatorClient::new()));

    // THEN: The error mentions the controller
    let Err(err) = result else {
        panic!("building should fail");
    };
    assert!(format!("{err:#}").contains("Broken"));
    assert!(format!("{err:#}").contains("sometimes"));
}

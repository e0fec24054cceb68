//! Health aggregation through the dispatcher
//!
//! A misbehaving agent must only affect its own entry, and the aggregate
//! check must always return within the configured timeout.


use agent_dispatch::testing::MockAgent;
use agent_dispatch::{Agent, HealthStatus, OverallStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use test_helpers::{builder_with_overrides, test_config};

fn status_of(health: &agent_dispatch::SystemHealth, id: &str) -> HealthStatus {
    health
        .agents
        .iter()
        .find(|a| a.identifier == id)
        .map(|a| a.status)
        .unwrap_or_else(|| panic!("no health entry for {id}"))
}

#[tokio::test]
async fn test_all_agents_healthy() {
    let dispatcher = builder_with_overrides(test_config(), vec![]).build().unwrap();

    let health = dispatcher.health_check().await;

    assert_eq!(health.overall_status, OverallStatus::Healthy);
    assert_eq!(health.dispatcher_status, HealthStatus::Healthy);
    assert_eq!(health.agents.len(), 8);
    assert!(health.agents.iter().all(|a| a.status == HealthStatus::Healthy));
}

#[tokio::test]
async fn test_hanging_check_degrades_only_its_agent() {
    let calendar: Arc<dyn Agent> =
        Arc::new(MockAgent::responding("calendar", "ok").with_hanging_health());
    let dispatcher = builder_with_overrides(test_config(), vec![("calendar", calendar)])
        .build()
        .unwrap();

    let start = Instant::now();
    let health = dispatcher.health_check().await;
    assert!(start.elapsed() < Duration::from_secs(2));

    assert_eq!(health.overall_status, OverallStatus::Degraded);
    assert_eq!(status_of(&health, "calendar"), HealthStatus::Error);
    for id in ["thinking", "email", "viber", "task", "web", "file", "memory"] {
        assert_eq!(status_of(&health, id), HealthStatus::Healthy, "{id}");
    }
}

#[tokio::test]
async fn test_checks_run_concurrently() {
    // three hanging agents still finish within roughly one timeout
    let overrides: Vec<(&str, Arc<dyn Agent>)> = ["email", "viber", "task"]
        .into_iter()
        .map(|id| {
            let agent: Arc<dyn Agent> =
                Arc::new(MockAgent::responding(id, "ok").with_hanging_health());
            (id, agent)
        })
        .collect();
    let dispatcher = builder_with_overrides(test_config(), overrides)
        .build()
        .unwrap();

    let timeout = Duration::from_millis(test_config().dispatcher.health_timeout_ms);
    let start = Instant::now();
    let health = dispatcher.health_check().await;
    assert!(start.elapsed() < timeout * 10);
    assert_eq!(
        health
            .agents
            .iter()
            .filter(|a| a.status == HealthStatus::Error)
            .count(),
        3
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_check_is_bounded_by_timeout() {
    let calendar: Arc<dyn Agent> = Arc::new(
        MockAgent::responding("calendar", "ok").with_blocking_health(Duration::from_millis(1500)),
    );
    let dispatcher = builder_with_overrides(test_config(), vec![("calendar", calendar)])
        .build()
        .unwrap();

    let start = Instant::now();
    let health = dispatcher.health_check().await;
    assert!(start.elapsed() < Duration::from_millis(1000));

    assert_eq!(health.overall_status, OverallStatus::Degraded);
    assert_eq!(status_of(&health, "calendar"), HealthStatus::Error);
    assert_eq!(status_of(&health, "email"), HealthStatus::Healthy);
}

#[tokio::test]
async fn test_mixed_failures() {
    let dispatcher = builder_with_overrides(
        test_config(),
        vec![
            (
                "file",
                Arc::new(MockAgent::responding("file", "ok").without_health_check())
                    as Arc<dyn Agent>,
            ),
            (
                "web",
                Arc::new(MockAgent::responding("web", "ok").with_failing_health())
                    as Arc<dyn Agent>,
            ),
            (
                "viber",
                Arc::new(MockAgent::responding("viber", "ok").with_panicking_health())
                    as Arc<dyn Agent>,
            ),
        ],
    )
    .build()
    .unwrap();

    let health = dispatcher.health_check().await;

    assert_eq!(health.overall_status, OverallStatus::Degraded);
    assert_eq!(status_of(&health, "file"), HealthStatus::Unknown);
    assert_eq!(status_of(&health, "web"), HealthStatus::Error);
    assert_eq!(status_of(&health, "viber"), HealthStatus::Error);
    assert_eq!(status_of(&health, "email"), HealthStatus::Healthy);
    assert_eq!(dispatcher.metrics().health_checks, 1);
}

#[tokio::test]
async fn test_health_report_serializes() {
    let dispatcher = builder_with_overrides(test_config(), vec![]).build().unwrap();
    let value = serde_json::to_value(dispatcher.health_check().await).unwrap();

    assert_eq!(value["overall_status"], "healthy");
    assert_eq!(value["dispatcher_status"], "healthy");
    assert_eq!(value["agents"][0]["identifier"], "thinking");
    assert!(value["timestamp"].is_string());
}

//! Dependency-ordered start, health monitoring, and shutdown.

use crate::in_memory::helpers::{Runtime, fast_settings, key};
use agentmate::{
    agent::domain::{AgentKey, AgentState, FailureKind, OwnerId, ServiceName},
    config::domain::{ConfigValues, RuntimeSettings, SupervisorSettings},
    event_bus::{
        domain::{Event, Topic},
        ports::EventBusError,
    },
    supervisor::{PlanIssue, SupervisorError},
};
use eyre::{Result, ensure};
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dependents_are_built_only_once_dependencies_run(fast_settings: RuntimeSettings) -> Result<()> {
    let runtime = Runtime::new(fast_settings)?;
    let gmail = key("u1", "gmail");
    let websocket = key("u1", "websocket");
    for configured in [&websocket, &gmail, &key("u1", "notion")] {
        runtime.configure(configured, ConfigValues::new()).await?;
    }
    runtime.agent(&gmail).fail_initializations(2);

    let report = runtime.supervisor.start_all().await?;

    ensure!(report.is_complete(), "{report:?}");
    let position = |wanted: &AgentKey| report.started.iter().position(|started| started == wanted);
    ensure!(position(&gmail) < position(&websocket));
    let creation = runtime
        .creations()
        .into_iter()
        .find(|created| created.key == websocket)
        .ok_or_else(|| eyre::eyre!("websocket agent never built"))?;
    let gmail_service = ServiceName::new("gmail")?;
    ensure!(creation.dependency_states == [(gmail_service, Some(AgentState::Running))]);
    ensure!(runtime.agent(&gmail).initializations() == 3);
    runtime.supervisor.shutdown().await;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dependents_of_a_failed_dependency_are_not_started(fast_settings: RuntimeSettings) -> Result<()> {
    let runtime = Runtime::new(fast_settings)?;
    let gmail = key("u1", "gmail");
    let websocket = key("u1", "websocket");
    runtime.configure(&gmail, ConfigValues::new()).await?;
    runtime.configure(&websocket, ConfigValues::new()).await?;
    runtime.agent(&gmail).fail_initializations(10);

    let report = runtime.supervisor.start_all().await?;

    ensure!(report.started == [gmail.clone()]);
    ensure!(matches!(
        report.failed.as_slice(),
        [(failed, SupervisorError::DependencyNotRunning { .. })] if *failed == websocket
    ));
    ensure!(runtime.agent(&websocket).initializations() == 0);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disabled_dependencies_leave_dependents_skipped(fast_settings: RuntimeSettings) -> Result<()> {
    let runtime = Runtime::new(fast_settings)?;
    let websocket = key("u1", "websocket");
    runtime
        .configure(&key("u1", "gmail"), ConfigValues::new().with("enabled", json!(false)))
        .await?;
    runtime.configure(&websocket, ConfigValues::new()).await?;

    let report = runtime.supervisor.start_all().await?;

    ensure!(report.started.is_empty());
    let gmail_service = ServiceName::new("gmail")?;
    ensure!(report.skipped == [(websocket, PlanIssue::MissingDependency(gmail_service))]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn health_monitor_restarts_wedged_agents_until_the_ceiling(fast_settings: RuntimeSettings) -> Result<()> {
    let settings = RuntimeSettings {
        supervisor: SupervisorSettings {
            health_check_interval_ms: 25,
            wedge_multiplier: 5,
            ..fast_settings.supervisor
        },
        ..fast_settings
    };
    let runtime = Runtime::new(settings)?;
    let gmail = key("u1", "gmail");
    runtime
        .configure(&gmail, ConfigValues::new().with("interval_ms", json!(50)))
        .await?;
    let agent = runtime.agent(&gmail);
    agent.scripted_source().set_fetch_delay(Duration::from_secs(60));
    runtime.supervisor.start(&gmail).await?;
    let monitor = runtime.supervisor.spawn_health_monitor();

    let restarted = runtime
        .wait_for(&gmail, |status| {
            status.consecutive_failure_count == 1 && status.state == AgentState::Running
        })
        .await?;
    ensure!(restarted.last_error.map(|failure| failure.kind()) == Some(FailureKind::Wedged));
    ensure!(agent.initializations() == 2);
    ensure!(agent.stops() == 1);

    let abandoned = runtime
        .wait_for(&gmail, |status| status.state == AgentState::Failed)
        .await?;
    monitor.abort();
    ensure!(abandoned.consecutive_failure_count == 2);
    ensure!(abandoned.last_error.map(|failure| failure.kind()) == Some(FailureKind::RestartCeiling));
    ensure!(!runtime.supervisor.is_running(&gmail));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_dependents_first_and_closes_the_bus(fast_settings: RuntimeSettings) -> Result<()> {
    let runtime = Runtime::new(fast_settings)?;
    let gmail = key("u1", "gmail");
    let websocket = key("u1", "websocket");
    let other_owner = key("u2", "gmail");
    for configured in [&gmail, &websocket, &other_owner] {
        runtime.configure(configured, ConfigValues::new()).await?;
    }
    ensure!(runtime.supervisor.start_all().await?.is_complete());
    ensure!(runtime.supervisor.list_active(&OwnerId::new("u1")?).len() == 2);
    ensure!(runtime.supervisor.list_active(&OwnerId::new("u2")?).len() == 1);

    let report = runtime.supervisor.shutdown().await;

    ensure!(report.failed.is_empty());
    ensure!(report.stopped.len() == 3);
    let position = |wanted: &AgentKey| report.stopped.iter().position(|stopped| stopped == wanted);
    ensure!(position(&websocket) < position(&gmail));
    ensure!(runtime.supervisor.list_all().iter().all(|status| status.state == AgentState::Stopped));
    let probe = Event::new(Topic::health_tick(), json!({}), &DefaultClock);
    let published = runtime.supervisor.context().bus().publish(probe).await;
    ensure!(matches!(published, Err(EventBusError::Closed)));
    Ok(())
}

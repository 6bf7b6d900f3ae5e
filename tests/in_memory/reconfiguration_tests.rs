//! Live settings updates and their isolation from other instances.

use crate::in_memory::helpers::{Runtime, eventually, fast_settings, key};
use agentmate::{
    agent::domain::AgentState,
    config::{
        domain::{ConfigValues, RuntimeSettings},
        ports::ConfigProvider,
    },
    supervisor::SupervisorError,
};
use eyre::{Result, ensure};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_finishes_the_cycle_and_leaves_siblings_alone(fast_settings: RuntimeSettings) -> Result<()> {
    let runtime = Runtime::new(fast_settings)?;
    let gmail = key("u1", "gmail");
    let notion = key("u1", "notion");
    runtime.configure(&gmail, ConfigValues::new()).await?;
    runtime.configure(&notion, ConfigValues::new()).await?;
    let mail_agent = runtime.agent(&gmail);
    let notes_agent = runtime.agent(&notion);
    mail_agent.scripted_source().push_items(["e1"]);
    mail_agent.recording_sink().set_delay(Duration::from_millis(300));

    ensure!(runtime.supervisor.start_all().await?.is_complete());
    runtime.wait_for(&notion, |status| status.state == AgentState::Running).await?;
    eventually("the gmail cycle to begin", || mail_agent.scripted_source().fetch_count() >= 1).await?;

    let updated = runtime
        .supervisor
        .update_settings(&gmail, ConfigValues::new().with("interval_ms", json!(40)))
        .await?;

    ensure!(updated.is_some());
    ensure!(mail_agent.recording_sink().dispatched_ids() == ["e1"], "in-flight cycle must finish");
    ensure!(mail_agent.stops() == 1);
    runtime.wait_for(&gmail, |status| status.state == AgentState::Running).await?;
    ensure!(mail_agent.initializations() == 2);
    ensure!(runtime.config.get(&gmail).await?.interval() == Duration::from_millis(40));

    ensure!(notes_agent.initializations() == 1);
    ensure!(notes_agent.stops() == 0);
    ensure!(runtime.supervisor.is_running(&notion));
    runtime.supervisor.shutdown().await;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disabling_settings_stop_the_instance(fast_settings: RuntimeSettings) -> Result<()> {
    let runtime = Runtime::new(fast_settings)?;
    let gmail = key("u1", "gmail");
    runtime.configure(&gmail, ConfigValues::new()).await?;
    runtime.supervisor.start(&gmail).await?;
    runtime.wait_for(&gmail, |status| status.state == AgentState::Running).await?;

    let updated = runtime
        .supervisor
        .update_settings(&gmail, ConfigValues::new().with("enabled", json!(false)))
        .await?;

    ensure!(updated.is_none());
    ensure!(!runtime.supervisor.is_running(&gmail));
    ensure!(runtime.agent(&gmail).stops() == 1);
    let restarted = runtime.supervisor.start(&gmail).await;
    ensure!(matches!(restarted, Err(SupervisorError::Disabled(_))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_settings_are_rejected_before_any_change(fast_settings: RuntimeSettings) -> Result<()> {
    let runtime = Runtime::new(fast_settings)?;
    let gmail = key("u1", "gmail");
    runtime
        .configure(&gmail, ConfigValues::new().with("batch_size", json!(25)))
        .await?;
    runtime.supervisor.start(&gmail).await?;
    runtime.wait_for(&gmail, |status| status.state == AgentState::Running).await?;

    let outcome = runtime
        .supervisor
        .update_settings(&gmail, ConfigValues::new().with("batch_size", json!("many")))
        .await;

    ensure!(matches!(outcome, Err(SupervisorError::Config(_))));
    ensure!(runtime.supervisor.is_running(&gmail));
    ensure!(runtime.agent(&gmail).initializations() == 1);
    ensure!(runtime.config.get(&gmail).await?.batch_size() == 25);
    runtime.supervisor.shutdown().await;
    Ok(())
}

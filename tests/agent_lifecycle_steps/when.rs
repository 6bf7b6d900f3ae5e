//! When steps for agent lifecycle BDD scenarios.

use super::world::{LifecycleWorld, parse_key, run_async};
use agentmate::{agent::domain::AgentState, config::domain::ConfigValues};
use eyre::{WrapErr, eyre};
use rstest_bdd_macros::when;
use serde_json::json;
use std::time::Duration;

#[when(r#""{agent}" is started"#)]
fn agent_is_started(world: &mut LifecycleWorld, agent: String) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    match run_async(world.supervisor.start(&agent_key)) {
        Ok(_) => {
            world.wait_for(&agent_key, |status| status.state == AgentState::Running)?;
        }
        Err(err) => world.last_error = Some(err),
    }
    Ok(())
}

#[when(r#""{agent}" has fetched {batches:u64} batches"#)]
fn agent_has_fetched(world: &mut LifecycleWorld, agent: String, batches: u64) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    let wanted = usize::try_from(batches)?;
    let scripted = world.agent(&agent_key);
    run_async(async {
        for _ in 0..300 {
            if scripted.scripted_source().fetch_count() >= wanted {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Err(eyre!("{agent_key} fetched fewer than {wanted} batches"))
    })
}

#[when(r#""{agent}" is paused"#)]
fn agent_is_paused(world: &mut LifecycleWorld, agent: String) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    run_async(world.supervisor.pause(&agent_key)).wrap_err("pause agent")?;
    world.wait_for(&agent_key, |status| status.state == AgentState::Paused)?;
    Ok(())
}

#[when(r#""{agent}" is resumed"#)]
fn agent_is_resumed(world: &mut LifecycleWorld, agent: String) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    run_async(world.supervisor.resume(&agent_key)).wrap_err("resume agent")?;
    world.wait_for(&agent_key, |status| status.state == AgentState::Running)?;
    Ok(())
}

#[when(r#""{agent}" is reconfigured to run every {interval_ms:u64} ms"#)]
fn agent_is_reconfigured(
    world: &mut LifecycleWorld,
    agent: String,
    interval_ms: u64,
) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    let values = ConfigValues::new().with("interval_ms", json!(interval_ms));
    run_async(world.supervisor.update_settings(&agent_key, values)).wrap_err("update agent settings")?;
    world.wait_for(&agent_key, |status| status.state == AgentState::Running)?;
    Ok(())
}

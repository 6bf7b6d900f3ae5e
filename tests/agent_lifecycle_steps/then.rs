//! Then steps for agent lifecycle BDD scenarios.

use super::world::{LifecycleWorld, parse_key, run_async};
use agentmate::{agent::domain::AgentState, supervisor::SupervisorError};
use eyre::eyre;
use rstest_bdd_macros::then;

#[then(r#""{agent}" dispatched "{items}""#)]
fn agent_dispatched(world: &LifecycleWorld, agent: String, items: String) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    let expected: Vec<&str> = items.split(',').collect();
    let dispatched = world.agent(&agent_key).recording_sink().dispatched_ids();
    if dispatched != expected {
        return Err(eyre!("expected {expected:?} dispatched, found {dispatched:?}"));
    }
    Ok(())
}

#[then(r#"the ledger holds {count:u64} records for "{agent}""#)]
fn ledger_holds(world: &LifecycleWorld, count: u64, agent: String) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    let records = run_async(world.supervisor.context().ledger().records_for(&agent_key))?;
    if u64::try_from(records.len())? != count {
        return Err(eyre!("expected {count} ledger records, found {}", records.len()));
    }
    Ok(())
}

#[then(r#""{agent}" is "{state}""#)]
fn agent_is_in_state(world: &LifecycleWorld, agent: String, state: String) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    let expected = AgentState::try_from(state.as_str())
        .map_err(|err| eyre!("invalid expected state in scenario: {err}"))?;
    let status = world
        .supervisor
        .status(&agent_key)
        .ok_or_else(|| eyre!("{agent_key} has no instance"))?;
    if status.state != expected {
        return Err(eyre!("expected {expected}, found {}", status.state));
    }
    Ok(())
}

#[then(r#""{agent}" has been initialized {count:u64} times"#)]
fn agent_initialized(world: &LifecycleWorld, agent: String, count: u64) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    let initializations = world.agent(&agent_key).initializations();
    if u64::try_from(initializations)? != count {
        return Err(eyre!("expected {count} initializations, found {initializations}"));
    }
    Ok(())
}

#[then("the request fails because a dependency is not running")]
fn request_fails_on_dependency(world: &LifecycleWorld) -> Result<(), eyre::Report> {
    match world.last_error.as_ref() {
        Some(SupervisorError::DependencyNotRunning { .. }) => Ok(()),
        other => Err(eyre!("expected DependencyNotRunning, got {other:?}")),
    }
}

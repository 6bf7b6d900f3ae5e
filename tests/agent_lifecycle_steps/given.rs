//! Given steps for agent lifecycle BDD scenarios.

use super::world::{LifecycleWorld, parse_key, run_async};
use agentmate::config::{domain::ConfigValues, ports::ConfigProvider};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use serde_json::json;

#[given("a runtime with scripted agents")]
fn runtime_with_scripted_agents(world: &LifecycleWorld) {
    let _ = world;
}

#[given(r#""{agent}" is configured to run every {interval_ms:u64} ms"#)]
fn agent_is_configured(
    world: &mut LifecycleWorld,
    agent: String,
    interval_ms: u64,
) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    run_async(
        world
            .config
            .put(&agent_key, ConfigValues::new().with("interval_ms", json!(interval_ms))),
    )
    .wrap_err("store agent configuration")?;
    Ok(())
}

#[given(r#"the "{agent}" source yields "{items}""#)]
fn source_yields(world: &mut LifecycleWorld, agent: String, items: String) -> Result<(), eyre::Report> {
    let agent_key = parse_key(&agent)?;
    world
        .agent(&agent_key)
        .scripted_source()
        .push_items(items.split(','));
    Ok(())
}

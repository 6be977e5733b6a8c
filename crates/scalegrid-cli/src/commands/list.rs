use std::process::ExitCode;

use serde::Serialize;

use scalegrid_state::{ConfigStore, ProviderKind, StateStore};

use super::wants_json;

#[derive(Debug, Serialize)]
struct GroupSummary {
    name: String,
    provider: ProviderKind,
    deployment_group: String,
    instances: usize,
    min_instances: u32,
    max_instances: u32,
}

fn summarize(store: &dyn ConfigStore) -> anyhow::Result<Vec<GroupSummary>> {
    let mut summaries = Vec::new();
    for group in store.scaling_groups()? {
        let instances = store.instances_of(&group.deployment_group_ref)?.len();
        summaries.push(GroupSummary {
            provider: group.kind(),
            name: group.name,
            deployment_group: group.deployment_group_ref,
            instances,
            min_instances: group.min_instances,
            max_instances: group.max_instances,
        });
    }
    Ok(summaries)
}

pub fn list(store: &StateStore, format: &str) -> anyhow::Result<ExitCode> {
    let summaries = summarize(store)?;

    if wants_json(format) {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(ExitCode::SUCCESS);
    }

    if summaries.is_empty() {
        println!("No scaling groups configured.");
        return Ok(ExitCode::SUCCESS);
    }
    println!(
        "{:<20} {:<8} {:<20} {:>9}",
        "NAME", "PROVIDER", "DEPLOYMENT GROUP", "INSTANCES"
    );
    for s in &summaries {
        println!(
            "{:<20} {:<8} {:<20} {:>9}",
            s.name,
            s.provider.to_string(),
            s.deployment_group,
            s.instances
        );
    }
    Ok(ExitCode::SUCCESS)
}

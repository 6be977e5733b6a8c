pub mod import;
pub mod list;
pub mod scale;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use scalegrid_admin::{AdminCli, AwsCliProvisioner, StoreBackend};
use scalegrid_executor::Coordinator;
use scalegrid_scaler::{CloudProvider, NodesProvider, Scaler};
use scalegrid_state::StateStore;

use crate::Backend;
use crate::config::Settings;

/// File name of the state database inside the data directory.
pub const STATE_DB: &str = "scalegrid.redb";

pub fn open_store(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let path = data_dir.join(STATE_DB);
    debug!(path = %path.display(), "opening state store");
    Ok(StateStore::open(&path)?)
}

/// Wire a [`Scaler`] with both providers over the chosen backend.
pub fn build_scaler(store: &StateStore, settings: &Settings, backend: Backend) -> Scaler {
    let timeouts = settings.scaler.timeouts;
    let config_store = Arc::new(store.clone());
    match backend {
        Backend::Local => {
            let local = Arc::new(StoreBackend::new(store.clone()));
            Scaler::new(
                config_store,
                Coordinator::new(local.clone(), timeouts),
                settings.scaler.clone(),
            )
            .with_provider(Arc::new(NodesProvider::new(local.clone())))
            .with_provider(Arc::new(CloudProvider::new(local.clone(), local)))
        }
        Backend::Admin => {
            let admin = Arc::new(AdminCli::new(settings.admin.clone()));
            let aws = Arc::new(AwsCliProvisioner::new(settings.aws.clone()));
            // Machine membership is kept in the local store.
            let membership = Arc::new(StoreBackend::new(store.clone()));
            Scaler::new(
                config_store,
                Coordinator::new(admin.clone(), timeouts),
                settings.scaler.clone(),
            )
            .with_provider(Arc::new(NodesProvider::new(admin)))
            .with_provider(Arc::new(
                CloudProvider::new(aws.clone(), membership).with_lifecycle(aws),
            ))
        }
    }
}

/// Whether `--format` asks for JSON. Anything else renders as text.
pub fn wants_json(format: &str) -> bool {
    format.eq_ignore_ascii_case("json")
}

#[cfg(test)]
pub(crate) const TEST_INVENTORY: &str = r#"
[[node]]
name = "n1"
host = "10.0.0.11"

[[node]]
name = "n2"
host = "10.0.0.12"

[[deployment_group]]
name = "dg-web"

[[instance]]
name = "web-a"
deployment_group = "dg-web"
node_ref = "n1"
status = "running"

[[scaling_group]]
name = "web"
deployment_group_ref = "dg-web"
max_instances = 4
provider = "nodes"
node_refs = ["n1", "n2"]
"#;

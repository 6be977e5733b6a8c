use std::path::Path;
use std::process::ExitCode;

use serde_json::json;

use scalegrid_state::{Inventory, StateStore};

use super::wants_json;

pub fn import(store: &StateStore, path: &Path, format: &str) -> anyhow::Result<ExitCode> {
    let inventory = Inventory::from_file(path)?;
    inventory.apply(store)?;

    if wants_json(format) {
        let summary = json!({
            "nodes": inventory.nodes.len(),
            "deployment_groups": inventory.deployment_groups.len(),
            "instances": inventory.instances.len(),
            "scaling_groups": inventory.scaling_groups.len(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Imported {} nodes, {} deployment groups, {} instances, {} scaling groups from {}",
            inventory.nodes.len(),
            inventory.deployment_groups.len(),
            inventory.instances.len(),
            inventory.scaling_groups.len(),
            path.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalegrid_state::ConfigStore;

    use crate::commands::TEST_INVENTORY;

    #[test]
    fn imports_into_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.toml");
        std::fs::write(&path, TEST_INVENTORY).unwrap();
        let store = StateStore::open_in_memory().unwrap();

        import(&store, &path, "text").unwrap();

        assert!(store.scaling_group("web").unwrap().is_some());
        assert!(store.node_exists("n2").unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        let store = StateStore::open_in_memory().unwrap();
        let err = import(&store, Path::new("/nonexistent/inventory.toml"), "text").unwrap_err();
        assert!(err.to_string().contains("reading inventory"));
    }
}

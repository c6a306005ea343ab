//! Namespace maintenance command.

use crate::config::Settings;

use super::connect_store;

/// Run delete-namespace command.
pub fn run_delete(namespace: &str, settings: &Settings) -> anyhow::Result<()> {
    let (_, manager) = connect_store(settings)?;
    let before = manager.namespace_count(namespace)?;
    manager.delete_namespace(namespace)?;
    println!(
        "Deleted namespace '{namespace}' ({before} records) from index {}",
        manager.index_name()
    );
    Ok(())
}

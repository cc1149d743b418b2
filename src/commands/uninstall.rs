use anyhow::{Context, Result, anyhow};
use std::path::Path;
use tracing::warn;

use orchestra::context::RunContext;
use orchestra::registry::PluginRegistry;

/// Remove a plugin by repository or id
pub fn uninstall_command(ctx: &RunContext, target: &str) -> Result<()> {
    let registry_path = ctx.registry_path();
    let mut registry = PluginRegistry::load(&registry_path).context("load registry")?;

    let repo_key = registry
        .find(target)
        .map(|(key, _)| key.to_string())
        .ok_or_else(|| anyhow!("plugin not found: {target}"))?;
    let entry = registry
        .remove(&repo_key)
        .ok_or_else(|| anyhow!("plugin not found: {target}"))?;

    // Best effort: a binary left on disk is skipped once its entry is gone.
    if let Err(err) = remove_binary(&entry.binary) {
        warn!(binary = %entry.binary.display(), error = %err, "Could not remove plugin binary");
    }

    registry.save(&registry_path).context("save registry")?;

    eprintln!("Uninstalled {} ({})", entry.id, entry.repo);
    Ok(())
}

fn remove_binary(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

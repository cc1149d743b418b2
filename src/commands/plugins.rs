use anyhow::{Context, Result};
use colored::Colorize;

use orchestra::context::RunContext;
use orchestra::registry::PluginRegistry;

/// List installed third-party plugins on stderr
pub fn plugins_command(ctx: &RunContext) -> Result<()> {
    let registry = PluginRegistry::load(&ctx.registry_path()).context("load registry")?;

    if registry.is_empty() {
        eprintln!("No plugins installed. Run: orchestra install <github-repo>");
        return Ok(());
    }

    let mut plugins: Vec<_> = registry.iter().map(|(_, plugin)| plugin).collect();
    plugins.sort_by(|a, b| a.id.cmp(&b.id));

    eprintln!("Installed plugins:");
    for plugin in plugins {
        let caps = plugin
            .capability_summary()
            .map(|summary| format!("  ({summary})"))
            .unwrap_or_default();
        eprintln!(
            "  {} {:<10} {}{caps}",
            format!("{:<24}", plugin.id).bold(),
            plugin.version,
            plugin.repo
        );
    }

    Ok(())
}

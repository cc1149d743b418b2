//! Process descriptors handed to the hub
//!
//! The hub needs to know which plugin processes to launch. Two built-ins
//! are always present; registry plugins follow, minus any whose binary has
//! disappeared from disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SupervisorError};
use crate::hub_config::HubConfig;
use crate::registry::PluginRegistry;

pub const HUB_BINARY: &str = "orchestrator";
pub const STORAGE_BINARY: &str = "storage-markdown";
pub const TOOLS_BINARY: &str = "tools-features";
pub const TRANSPORT_BINARY: &str = "transport-stdio";

pub const STORAGE_PLUGIN_ID: &str = "storage.markdown";
pub const TOOLS_PLUGIN_ID: &str = "tools.features";

/// One process the hub should launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub id: String,
    pub binary: PathBuf,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides_storage: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Locations of the binaries bundled next to the orchestra executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinBinaries {
    pub hub: PathBuf,
    pub storage: PathBuf,
    pub tools: PathBuf,
    pub transport: PathBuf,
}

impl BuiltinBinaries {
    /// Resolve every built-in inside `bin_dir`, failing on the first one
    /// that does not exist.
    pub fn resolve(bin_dir: &Path) -> Result<Self> {
        let locate = |name: &'static str| -> Result<PathBuf> {
            let path = bin_dir.join(name);
            if path.exists() {
                Ok(path)
            } else {
                Err(SupervisorError::MissingBinary { name, path })
            }
        };

        Ok(Self {
            hub: locate(HUB_BINARY)?,
            storage: locate(STORAGE_BINARY)?,
            tools: locate(TOOLS_BINARY)?,
            transport: locate(TRANSPORT_BINARY)?,
        })
    }

    /// All four paths, hub first
    pub fn all(&self) -> [&Path; 4] {
        [&self.hub, &self.storage, &self.tools, &self.transport]
    }
}

fn workspace_arg(workspace: &Path) -> String {
    format!("--workspace={}", workspace.display())
}

/// Build the ordered descriptor list: built-ins first, then every registry
/// plugin whose binary still exists.
///
/// Registry plugins keep the registry's iteration order. Nothing downstream
/// depends on that order.
pub fn build_descriptors(
    workspace: &Path,
    builtins: &BuiltinBinaries,
    registry: &PluginRegistry,
) -> Vec<ProcessDescriptor> {
    let mut descriptors = vec![
        ProcessDescriptor {
            id: STORAGE_PLUGIN_ID.to_string(),
            binary: builtins.storage.clone(),
            enabled: true,
            provides_storage: vec!["markdown".to_string()],
            args: vec![workspace_arg(workspace)],
        },
        ProcessDescriptor {
            id: TOOLS_PLUGIN_ID.to_string(),
            binary: builtins.tools.clone(),
            enabled: true,
            provides_storage: vec![],
            args: vec![workspace_arg(workspace)],
        },
    ];

    for (repo, plugin) in registry.iter() {
        if !plugin.binary.exists() {
            debug!(repo = %repo, binary = %plugin.binary.display(), "Skipping plugin with missing binary");
            continue;
        }
        descriptors.push(ProcessDescriptor {
            id: plugin.id.clone(),
            binary: plugin.binary.clone(),
            enabled: true,
            provides_storage: plugin.provides_storage.clone(),
            args: vec![workspace_arg(workspace)],
        });
    }

    descriptors
}

/// Build the full hub configuration for one run
pub fn build_hub_config(
    workspace: &Path,
    certs_dir: &Path,
    builtins: &BuiltinBinaries,
    registry: &PluginRegistry,
) -> HubConfig {
    HubConfig::new(
        certs_dir.to_path_buf(),
        build_descriptors(workspace, builtins, registry),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PluginEntry;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn install_builtins(dir: &Path) -> BuiltinBinaries {
        for name in [HUB_BINARY, STORAGE_BINARY, TOOLS_BINARY, TRANSPORT_BINARY] {
            fs::write(dir.join(name), "#!/bin/sh\n").unwrap();
        }
        BuiltinBinaries::resolve(dir).unwrap()
    }

    fn registry_with(dir: &TempDir, present: usize, missing: usize) -> PluginRegistry {
        let mut registry = PluginRegistry::default();
        for i in 0..present {
            let binary = dir.path().join(format!("plugin-{i}"));
            fs::write(&binary, "#!/bin/sh\n").unwrap();
            registry.insert(
                format!("github.com/acme/plugin-{i}"),
                PluginEntry {
                    id: format!("tools.present{i}"),
                    binary,
                    provides_storage: vec![format!("store{i}")],
                    ..PluginEntry::default()
                },
            );
        }
        for i in 0..missing {
            registry.insert(
                format!("github.com/acme/gone-{i}"),
                PluginEntry {
                    id: format!("tools.gone{i}"),
                    binary: dir.path().join(format!("gone-{i}")),
                    ..PluginEntry::default()
                },
            );
        }
        registry
    }

    #[test]
    fn test_resolve_reports_first_missing_binary() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(HUB_BINARY), "").unwrap();

        let err = BuiltinBinaries::resolve(dir.path()).unwrap_err();
        match err {
            SupervisorError::MissingBinary { name, path } => {
                assert_eq!(name, STORAGE_BINARY);
                assert_eq!(path, dir.path().join(STORAGE_BINARY));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builtins_always_present_with_workspace_arg() {
        let bins = tempdir().unwrap();
        let builtins = install_builtins(bins.path());
        let workspace = Path::new("/work/project");

        let descriptors = build_descriptors(workspace, &builtins, &PluginRegistry::default());

        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].id, STORAGE_PLUGIN_ID);
        assert_eq!(descriptors[0].provides_storage, vec!["markdown"]);
        assert_eq!(descriptors[1].id, TOOLS_PLUGIN_ID);
        for descriptor in &descriptors {
            assert!(descriptor.enabled);
            assert_eq!(descriptor.args, vec!["--workspace=/work/project"]);
        }
    }

    #[test]
    fn test_missing_registry_binaries_are_skipped() {
        let bins = tempdir().unwrap();
        let builtins = install_builtins(bins.path());
        let plugins = tempdir().unwrap();

        for (present, missing) in [(0, 0), (0, 3), (1, 0), (2, 2), (3, 1)] {
            let registry = registry_with(&plugins, present, missing);
            let descriptors = build_descriptors(Path::new("/w"), &builtins, &registry);
            assert_eq!(
                descriptors.len(),
                2 + present,
                "present={present} missing={missing}"
            );
            assert!(descriptors.iter().all(|d| !d.id.starts_with("tools.gone")));
        }
    }

    #[test]
    fn test_registry_plugin_carries_metadata() {
        let bins = tempdir().unwrap();
        let builtins = install_builtins(bins.path());
        let plugins = tempdir().unwrap();
        let registry = registry_with(&plugins, 1, 0);

        let descriptors = build_descriptors(Path::new("/w"), &builtins, &registry);
        let plugin = &descriptors[2];
        assert_eq!(plugin.id, "tools.present0");
        assert_eq!(plugin.binary, plugins.path().join("plugin-0"));
        assert_eq!(plugin.provides_storage, vec!["store0"]);
        assert_eq!(plugin.args, vec!["--workspace=/w"]);
    }
}

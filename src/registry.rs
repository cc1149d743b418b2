//! Installed third-party plugins
//!
//! The registry is one JSON document, keyed by the repository a plugin was
//! installed from:
//!
//! ```json
//! { "plugins": { "github.com/acme/tools-jira": { "id": "tools.jira", ... } } }
//! ```
//!
//! It has no locking. Callers doing load-mutate-save are advisory single
//! writers and concurrent invocations may race.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::RegistryError;

/// A single installed plugin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Logical id the plugin reports about itself
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    /// Absolute path of the installed binary
    #[serde(default, deserialize_with = "null_as_default")]
    pub binary: PathBuf,
    /// Source repository, the same value as the registry key
    #[serde(default, deserialize_with = "null_as_default")]
    pub repo: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub installed_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provides_tools: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provides_storage: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub needs_storage: Vec<String>,
}

impl PluginEntry {
    /// Short capability summary such as `3 tools, 1 storage`
    pub fn capability_summary(&self) -> Option<String> {
        let mut caps = Vec::new();
        if !self.provides_tools.is_empty() {
            caps.push(format!("{} tools", self.provides_tools.len()));
        }
        if !self.provides_storage.is_empty() {
            caps.push(format!("{} storage", self.provides_storage.len()));
        }
        if caps.is_empty() {
            None
        } else {
            Some(caps.join(", "))
        }
    }
}

/// All installed plugins, keyed by source repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRegistry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub plugins: BTreeMap<String, PluginEntry>,
}

impl PluginRegistry {
    /// Read the registry at `path`.
    ///
    /// A missing file yields an empty registry. A file that exists but does
    /// not parse is an error.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No registry file, starting empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(RegistryError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_slice(&data).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the registry to `path`, creating parent directories as needed.
    ///
    /// The document is written to a sibling temp file and renamed into
    /// place, so a failed write leaves the previous registry intact.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let write_err = |source| RegistryError::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(write_err)?;

        let staged = tempfile::Builder::new()
            .prefix(".registry-")
            .suffix(".json")
            .tempfile_in(dir)
            .map_err(write_err)?;

        {
            let mut writer = BufWriter::new(staged.as_file());
            serde_json::to_writer_pretty(&mut writer, self).map_err(RegistryError::Serialize)?;
            writer.write_all(b"\n").map_err(write_err)?;
            writer.flush().map_err(write_err)?;
        }
        staged.as_file().sync_all().map_err(write_err)?;

        staged.persist(path).map_err(|err| write_err(err.error))?;

        debug!(path = %path.display(), plugins = self.plugins.len(), "Saved registry");
        Ok(())
    }

    /// Look a plugin up by repository key first, then by plugin id.
    pub fn find(&self, target: &str) -> Option<(&str, &PluginEntry)> {
        if let Some((key, entry)) = self.plugins.get_key_value(target) {
            return Some((key.as_str(), entry));
        }
        self.plugins
            .iter()
            .find(|(_, entry)| entry.id == target)
            .map(|(key, entry)| (key.as_str(), entry))
    }

    /// Remove the entry stored under `repo_key`
    pub fn remove(&mut self, repo_key: &str) -> Option<PluginEntry> {
        self.plugins.remove(repo_key)
    }

    /// Insert or replace the entry for `repo_key`
    pub fn insert(&mut self, repo_key: impl Into<String>, entry: PluginEntry) {
        self.plugins.insert(repo_key.into(), entry);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PluginEntry)> {
        self.plugins.iter()
    }
}

// Registries written by older tooling store empty values as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

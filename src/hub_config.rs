//! Hub configuration file
//!
//! The hub reads its plugin list from a YAML file passed with `--config`.
//! The file only lives as long as the supervisor run that wrote it.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::debug;

use crate::descriptor::ProcessDescriptor;
use crate::error::{Result, SupervisorError};

/// Asks the hub to bind an ephemeral local port
pub const LISTEN_ADDR_PLACEHOLDER: &str = "localhost:0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    pub listen_addr: String,
    pub certs_dir: PathBuf,
    pub plugins: Vec<ProcessDescriptor>,
}

impl HubConfig {
    pub fn new(certs_dir: PathBuf, plugins: Vec<ProcessDescriptor>) -> Self {
        Self {
            listen_addr: LISTEN_ADDR_PLACEHOLDER.to_string(),
            certs_dir,
            plugins,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the config to a fresh `orchestra-*.yaml` temp file
    pub fn materialize(&self) -> Result<MaterializedConfig> {
        let yaml = self.to_yaml()?;

        let mut file = tempfile::Builder::new()
            .prefix("orchestra-")
            .suffix(".yaml")
            .tempfile()
            .map_err(SupervisorError::ConfigCreate)?;
        file.write_all(yaml.as_bytes())
            .and_then(|()| file.flush())
            .map_err(SupervisorError::ConfigCreate)?;

        let temp = file.into_temp_path();
        let path = temp.to_path_buf();
        debug!(path = %path.display(), plugins = self.plugins.len(), "Wrote hub config");

        Ok(MaterializedConfig {
            path,
            temp: Some(temp),
        })
    }
}

/// A hub config written to disk. Removed by [`MaterializedConfig::remove`]
/// or on drop, whichever happens first.
#[derive(Debug)]
pub struct MaterializedConfig {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl MaterializedConfig {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Calling this again after it succeeded is a no-op.
    pub fn remove(&mut self) -> std::io::Result<()> {
        match self.temp.take() {
            Some(temp) => temp.close(),
            None => Ok(()),
        }
    }
}

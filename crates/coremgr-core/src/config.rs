use std::fs;
use std::path::{Path, PathBuf};

use coremgr_dsa::{CoreId, NodeId};
use serde::Deserialize;

use crate::error::Result;
use crate::topology::{HostTopology, ProcessingResource};

/// Manager configuration, usually read from TOML.
///
/// Core sources are consulted in order: `resources`, then `detect_topology`,
/// then `corelist`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Flat core-list specification, e.g. `"0-3,8..11:2"`. All cores land on node 0.
    pub corelist: Option<String>,
    /// Processing resources assigned to this process on this host.
    pub resources: Vec<ProcessingResource>,
    /// Read the NUMA layout from sysfs.
    pub detect_topology: bool,
    /// Overrides the sysfs node directory used by `detect_topology`.
    pub sysfs_root: Option<PathBuf>,
    /// Keep the bookkeeping but never program the scheduler.
    pub dry_run: bool,
}

impl ManagerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn with_corelist(mut self, corelist: impl Into<String>) -> Self {
        self.corelist = Some(corelist.into());
        self
    }

    pub fn with_resource(mut self, numa_node: NodeId, cores: Vec<CoreId>) -> Self {
        self.resources.push(ProcessingResource { numa_node, cores });
        self
    }

    pub fn with_detect_topology(mut self, enabled: bool) -> Self {
        self.detect_topology = enabled;
        self
    }

    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn host_topology(&self) -> HostTopology {
        HostTopology::new(self.resources.clone())
    }
}

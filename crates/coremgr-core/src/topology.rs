//! # Topology Views
//!
//! The manager only needs "which cores on which NUMA node belong to this process".
//! [`TopologyView`] is that narrow question; the adapters below answer it from the
//! configuration model ([`HostTopology`]) or from the running kernel ([`SysfsTopology`]).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use coremgr_dsa::{parse_core_list, CoreId, NodeId};
use serde::Deserialize;

/// Node → assigned cores, in the order cores should enter the pool.
pub trait TopologyView {
    fn numa_cores(&self) -> BTreeMap<NodeId, Vec<CoreId>>;
}

impl TopologyView for BTreeMap<NodeId, Vec<CoreId>> {
    fn numa_cores(&self) -> BTreeMap<NodeId, Vec<CoreId>> {
        self.clone()
    }
}

/// One processing resource attached to the host the process runs on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingResource {
    pub numa_node: NodeId,
    pub cores: Vec<CoreId>,
}

/// The processing resources declared for this host.
///
/// Resources on the same node concatenate in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostTopology {
    resources: Vec<ProcessingResource>,
}

impl HostTopology {
    pub fn new(resources: Vec<ProcessingResource>) -> Self {
        Self { resources }
    }

    pub fn with_resource(mut self, numa_node: NodeId, cores: Vec<CoreId>) -> Self {
        self.resources.push(ProcessingResource { numa_node, cores });
        self
    }

    pub fn resources(&self) -> &[ProcessingResource] {
        &self.resources
    }
}

impl TopologyView for HostTopology {
    fn numa_cores(&self) -> BTreeMap<NodeId, Vec<CoreId>> {
        let mut nodes: BTreeMap<NodeId, Vec<CoreId>> = BTreeMap::new();
        for resource in &self.resources {
            nodes
                .entry(resource.numa_node)
                .or_default()
                .extend_from_slice(&resource.cores);
        }
        nodes
    }
}

/// NUMA layout of the running machine, read from sysfs.
///
/// Falls back to a single node 0 holding every core the OS reports when the
/// node directory is missing (non-NUMA kernels, containers, other platforms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsTopology {
    nodes: BTreeMap<NodeId, Vec<CoreId>>,
}

impl SysfsTopology {
    pub const DEFAULT_ROOT: &'static str = "/sys/devices/system/node";

    /// Detects the topology under [`Self::DEFAULT_ROOT`]. Never fails.
    pub fn detect() -> Self {
        Self::detect_at(Path::new(Self::DEFAULT_ROOT))
    }

    /// Detects the topology under `root`, laid out like `/sys/devices/system/node`.
    pub fn detect_at(root: &Path) -> Self {
        match Self::read_nodes(root) {
            Ok(nodes) if !nodes.is_empty() => Self { nodes },
            Ok(_) => {
                tracing::debug!("no NUMA nodes under {}, using a single node", root.display());
                Self::single_node_fallback()
            }
            Err(e) => {
                tracing::debug!("cannot read {}: {}, using a single node", root.display(), e);
                Self::single_node_fallback()
            }
        }
    }

    fn read_nodes(root: &Path) -> io::Result<BTreeMap<NodeId, Vec<CoreId>>> {
        let mut nodes = BTreeMap::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(node) = name
                .to_str()
                .and_then(|n| n.strip_prefix("node"))
                .and_then(|id| id.parse::<NodeId>().ok())
            else {
                continue;
            };
            // Memory-only nodes have an empty cpulist and stay as empty nodes.
            if let Ok(cpulist) = fs::read_to_string(entry.path().join("cpulist")) {
                nodes.insert(node, parse_core_list(cpulist.trim()));
            }
        }
        Ok(nodes)
    }

    fn single_node_fallback() -> Self {
        let cores = core_affinity::get_core_ids()
            .map(|ids| ids.into_iter().map(|id| id.id).collect())
            .unwrap_or_else(|| (0..num_cpus::get()).collect());
        Self {
            nodes: BTreeMap::from([(0, cores)]),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn cores_for_node(&self, node: NodeId) -> &[CoreId] {
        self.nodes.get(&node).map_or(&[], Vec::as_slice)
    }

    pub fn log_topology(&self) {
        tracing::info!("NUMA topology: {} nodes", self.nodes.len());
        for (node, cores) in &self.nodes {
            tracing::info!("  node {}: {} cores ({:?})", node, cores.len(), cores);
        }
    }
}

impl TopologyView for SysfsTopology {
    fn numa_cores(&self) -> BTreeMap<NodeId, Vec<CoreId>> {
        self.nodes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_topology_merges_same_node() {
        let topo = HostTopology::default()
            .with_resource(1, vec![8, 9])
            .with_resource(0, vec![0, 1])
            .with_resource(1, vec![10]);
        let nodes = topo.numa_cores();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[&0], vec![0, 1]);
        assert_eq!(nodes[&1], vec![8, 9, 10]);
    }

    #[test]
    fn test_sysfs_layout() {
        let root = tempfile::tempdir().unwrap();
        for (dir, cpulist) in [("node0", "0-3\n"), ("node1", "4-5,8\n"), ("node2", "\n")] {
            let path = root.path().join(dir);
            fs::create_dir(&path).unwrap();
            fs::write(path.join("cpulist"), cpulist).unwrap();
        }
        fs::create_dir(root.path().join("power")).unwrap();
        fs::write(root.path().join("possible"), "0-2\n").unwrap();

        let topo = SysfsTopology::detect_at(root.path());
        assert_eq!(topo.num_nodes(), 3);
        assert_eq!(topo.cores_for_node(0), &[0, 1, 2, 3]);
        assert_eq!(topo.cores_for_node(1), &[4, 5, 8]);
        assert!(topo.cores_for_node(2).is_empty());
        assert!(topo.cores_for_node(9).is_empty());
    }

    #[test]
    fn test_missing_root_falls_back_to_single_node() {
        let root = tempfile::tempdir().unwrap();
        let topo = SysfsTopology::detect_at(&root.path().join("absent"));
        assert_eq!(topo.num_nodes(), 1);
        assert!(!topo.cores_for_node(0).is_empty());
    }

    #[test]
    fn test_detect_never_empty() {
        let topo = SysfsTopology::detect();
        assert!(topo.num_nodes() >= 1);
        assert!(topo.numa_cores().values().any(|cores| !cores.is_empty()));
    }
}

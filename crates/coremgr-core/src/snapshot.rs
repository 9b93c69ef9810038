use std::fmt;

use coremgr_dsa::{CoreId, CorePool, NodeId};

/// Point-in-time copy of the pool and the reservation table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Free cores per node, ascending by node id.
    pub nodes: Vec<(NodeId, Vec<CoreId>)>,
    /// Reservations, ascending by consumer name.
    pub allocations: Vec<(String, Vec<CoreId>)>,
}

impl Snapshot {
    pub(crate) fn of(pool: &CorePool) -> Self {
        Self {
            nodes: pool
                .nodes()
                .map(|(node, cores)| (node, cores.to_vec()))
                .collect(),
            allocations: pool
                .allocations()
                .map(|(name, cores)| (name.to_string(), cores.to_vec()))
                .collect(),
        }
    }
}

fn write_cores(f: &mut fmt::Formatter<'_>, cores: &[CoreId]) -> fmt::Result {
    if cores.is_empty() {
        return f.write_str(" <none>");
    }
    for core in cores {
        write!(f, " {core}")?;
    }
    Ok(())
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dump of CoreManager:")?;
        write!(f, "Available cores:")?;
        if self.nodes.is_empty() {
            writeln!(f, " <none>")?;
        } else {
            writeln!(f)?;
            for (node, cores) in &self.nodes {
                write!(f, "  node {node}:")?;
                write_cores(f, cores)?;
                writeln!(f)?;
            }
        }
        writeln!(f, "Allocation table:")?;
        if self.allocations.is_empty() {
            write!(f, "  <Empty>")
        } else {
            for (i, (name, cores)) in self.allocations.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                write!(f, "  {name}:")?;
                write_cores(f, cores)?;
            }
            Ok(())
        }
    }
}

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::mask::CoreMask;
use crate::{CoreId, NodeId};

/// Which NUMA node a single-core reservation should come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSelector {
    /// First node, in ascending id order, that still has a free core.
    Any,
    Node(NodeId),
}

/// The two shapes a reservation request can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationRequest {
    /// `n` cores with no NUMA preference.
    Cores(usize),
    /// One core from a NUMA node.
    Node(NodeSelector),
}

impl From<usize> for AllocationRequest {
    fn from(count: usize) -> Self {
        AllocationRequest::Cores(count)
    }
}

impl From<NodeSelector> for AllocationRequest {
    fn from(node: NodeSelector) -> Self {
        AllocationRequest::Node(node)
    }
}

/// Why a request could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationFailure {
    InsufficientCores { requested: usize, available: usize },
    UnknownNode(NodeId),
    NodeExhausted(NodeId),
    NoFreeNode,
}

impl fmt::Display for AllocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationFailure::InsufficientCores {
                requested,
                available,
            } => write!(
                f,
                "insufficient reservable cores: requested {requested}, {available} free"
            ),
            AllocationFailure::UnknownNode(node) => write!(f, "NUMA node {node} is not configured"),
            AllocationFailure::NodeExhausted(node) => {
                write!(f, "NUMA node {node} has no free cores")
            }
            AllocationFailure::NoFreeNode => f.write_str("no NUMA node has a free core"),
        }
    }
}

/// Cores picked by [`CorePool::plan`], not yet taken out of the pool.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reservation {
    picks: Vec<(NodeId, CoreId)>,
}

impl Reservation {
    pub fn cores(&self) -> impl Iterator<Item = CoreId> + '_ {
        self.picks.iter().map(|&(_, core)| core)
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }
}

/// Free cores per NUMA node plus the table of granted reservations.
///
/// ## Invariants
/// - A core is either free on exactly one node or reserved by exactly one consumer.
/// - `allocated()` equals the summed length of all table entries.
/// - Table entries are never empty.
///
/// Mutation is split in two: [`plan`](Self::plan) is read-only and may fail,
/// [`commit`](Self::commit) and [`release`](Self::release) cannot. Callers program
/// the OS between the two and only commit once that succeeded.
#[derive(Debug, Clone, Default)]
pub struct CorePool {
    free: BTreeMap<NodeId, Vec<CoreId>>,
    /// Node each configured core belongs to, so releases go back home.
    home: BTreeMap<CoreId, NodeId>,
    allocations: BTreeMap<String, Vec<CoreId>>,
    allocated: usize,
}

impl CorePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pool from `(node, cores)` pairs. Pairs naming the same node
    /// concatenate in the order given.
    pub fn from_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, Vec<CoreId>)>,
    {
        let mut pool = Self::new();
        for (node, cores) in nodes {
            for &core in &cores {
                pool.home.insert(core, node);
            }
            pool.free.entry(node).or_default().extend(cores);
        }
        pool
    }

    /// Flat pool: every core on node 0.
    pub fn from_core_list(cores: Vec<CoreId>) -> Self {
        Self::from_nodes([(0, cores)])
    }

    pub fn clear(&mut self) {
        self.free.clear();
        self.home.clear();
        self.allocations.clear();
        self.allocated = 0;
    }

    pub fn available(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Free cores on `node`, in pool order. Empty for unknown nodes.
    pub fn free_cores(&self, node: NodeId) -> &[CoreId] {
        self.free.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Every configured node with its free cores, ascending by node id.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &[CoreId])> + '_ {
        self.free.iter().map(|(&node, cores)| (node, cores.as_slice()))
    }

    pub fn allocation(&self, name: &str) -> Option<&[CoreId]> {
        self.allocations.get(name).map(Vec::as_slice)
    }

    /// Reservation table, ascending by consumer name.
    pub fn allocations(&self) -> impl Iterator<Item = (&str, &[CoreId])> + '_ {
        self.allocations
            .iter()
            .map(|(name, cores)| (name.as_str(), cores.as_slice()))
    }

    /// Union of every free core across nodes.
    pub fn free_mask(&self) -> CoreMask {
        self.free.values().flatten().copied().collect()
    }

    /// Picks the cores `request` would take without touching the pool.
    ///
    /// Cores are taken from the tail of each node's sequence. A flat count walks
    /// nodes in ascending order and is all or nothing.
    pub fn plan(&self, request: AllocationRequest) -> Result<Reservation, AllocationFailure> {
        match request {
            AllocationRequest::Cores(requested) => {
                let available = self.available();
                if requested > available {
                    return Err(AllocationFailure::InsufficientCores {
                        requested,
                        available,
                    });
                }
                let picks = self
                    .free
                    .iter()
                    .flat_map(|(&node, cores)| cores.iter().rev().map(move |&core| (node, core)))
                    .take(requested)
                    .collect();
                Ok(Reservation { picks })
            }
            AllocationRequest::Node(NodeSelector::Node(node)) => {
                let cores = self
                    .free
                    .get(&node)
                    .ok_or(AllocationFailure::UnknownNode(node))?;
                let &core = cores.last().ok_or(AllocationFailure::NodeExhausted(node))?;
                Ok(Reservation {
                    picks: alloc::vec![(node, core)],
                })
            }
            AllocationRequest::Node(NodeSelector::Any) => self
                .free
                .iter()
                .find_map(|(&node, cores)| cores.last().map(|&core| (node, core)))
                .map(|pick| Reservation {
                    picks: alloc::vec![pick],
                })
                .ok_or(AllocationFailure::NoFreeNode),
        }
    }

    /// Moves planned cores from the free sequences into `name`'s entry.
    ///
    /// An empty reservation creates no entry.
    pub fn commit(&mut self, name: &str, reservation: Reservation) {
        if reservation.is_empty() {
            return;
        }
        let entry = self.allocations.entry(String::from(name)).or_default();
        for (node, core) in reservation.picks {
            if let Some(cores) = self.free.get_mut(&node) {
                if let Some(pos) = cores.iter().rposition(|&c| c == core) {
                    cores.remove(pos);
                }
            }
            entry.push(core);
            self.allocated += 1;
        }
    }

    /// Returns every core held by `name` to its home node and drops the entry.
    pub fn release(&mut self, name: &str) -> Option<Vec<CoreId>> {
        let cores = self.allocations.remove(name)?;
        for &core in &cores {
            let node = self.home.get(&core).copied().unwrap_or(0);
            self.free.entry(node).or_default().push(core);
        }
        self.allocated = self.allocated.saturating_sub(cores.len());
        Some(cores)
    }
}

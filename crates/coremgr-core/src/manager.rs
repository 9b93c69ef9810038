use std::sync::OnceLock;

use coremgr_dsa::{
    format_core_list, parse_core_list_bounded, AllocationRequest, CoreId, CoreMask, CorePool,
    NodeId, NodeSelector,
};
use nix::errno::Errno;
use parking_lot::Mutex;

use crate::affinity::{max_core, AffinityControl, DryRunAffinity, OsAffinity};
use crate::config::ManagerConfig;
use crate::error::{CoreManagerError, Result};
use crate::snapshot::Snapshot;
use crate::topology::{SysfsTopology, TopologyView};

#[derive(Debug, Default)]
struct ManagerState {
    pool: CorePool,
    /// Union of every free core; the default mask for threads without a reservation.
    process_mask: CoreMask,
    configured: bool,
}

impl ManagerState {
    fn reset(&mut self) {
        self.pool.clear();
        self.process_mask = CoreMask::new();
        self.configured = false;
    }
}

/// Reserves CPU cores for named consumers and binds threads to them.
///
/// ## Lifecycle
/// `configure` fills the pool and installs the process mask, `allocate` moves cores
/// from the pool to a consumer and narrows the process mask, `set_affinity` binds the
/// calling thread, `release` hands the cores back and widens the process mask.
///
/// ## Consistency
/// Every operation holds one lock for its whole duration. The kernel is programmed
/// before the bookkeeping is committed, so a refused mask leaves the pool, the table
/// and the counter exactly as they were.
pub struct CoreManager {
    state: Mutex<ManagerState>,
    affinity: Box<dyn AffinityControl>,
}

impl CoreManager {
    pub fn new(affinity: Box<dyn AffinityControl>) -> Self {
        Self {
            state: Mutex::new(ManagerState::default()),
            affinity,
        }
    }

    pub fn with_os_affinity() -> Self {
        Self::new(Box::new(OsAffinity))
    }

    pub fn dry_run() -> Self {
        Self::new(Box::new(DryRunAffinity::new()))
    }

    /// Builds a manager for `config` and configures it.
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        let manager = if config.dry_run {
            Self::dry_run()
        } else {
            Self::with_os_affinity()
        };
        manager.configure_from(config)?;
        Ok(manager)
    }

    /// Process-wide instance over [`OsAffinity`], created on first use.
    pub fn global() -> &'static CoreManager {
        static GLOBAL: OnceLock<CoreManager> = OnceLock::new();
        GLOBAL.get_or_init(CoreManager::with_os_affinity)
    }

    /// Resets and fills the pool from a core-list specification, all on node 0.
    pub fn configure(&self, corelist: &str) -> Result<()> {
        tracing::info!("CoreManager: configuring from core list \"{}\"", corelist);
        let max = max_core();
        match parse_core_list_bounded(corelist, max) {
            Ok(cores) => self.install(CorePool::from_core_list(cores)),
            Err(core) => {
                self.state.lock().reset();
                Err(CoreManagerError::CoreOutOfRange { core, max })
            }
        }
    }

    /// Resets and fills the pool from a NUMA topology.
    pub fn configure_topology(&self, topology: &dyn TopologyView) -> Result<()> {
        let nodes = topology.numa_cores();
        tracing::info!("CoreManager: configuring from {} NUMA nodes", nodes.len());
        self.install(CorePool::from_nodes(nodes))
    }

    /// Resets and fills the pool from whichever core source `config` names.
    pub fn configure_from(&self, config: &ManagerConfig) -> Result<()> {
        if !config.resources.is_empty() {
            let topology = config.host_topology();
            tracing::info!(
                "CoreManager: {} processing resources declared",
                topology.resources().len()
            );
            self.configure_topology(&topology)
        } else if config.detect_topology {
            let topology = match &config.sysfs_root {
                Some(root) => SysfsTopology::detect_at(root),
                None => SysfsTopology::detect(),
            };
            topology.log_topology();
            self.configure_topology(&topology)
        } else if let Some(corelist) = &config.corelist {
            self.configure(corelist)
        } else {
            Err(CoreManagerError::InvalidConfig(
                "no core source: set `corelist`, `resources` or `detect_topology`".to_string(),
            ))
        }
    }

    fn install(&self, pool: CorePool) -> Result<()> {
        let mut state = self.state.lock();
        state.reset();

        let mask = pool.free_mask();
        let max = max_core();
        if let Some(core) = mask.last().filter(|&core| core > max) {
            return Err(CoreManagerError::CoreOutOfRange { core, max });
        }
        self.program_process(&mask)?;

        tracing::info!(
            "CoreManager: {} cores available [{}]",
            pool.available(),
            mask
        );
        state.pool = pool;
        state.process_mask = mask;
        state.configured = true;
        Ok(())
    }

    /// Reserves `count` cores for `name`, regardless of NUMA node.
    pub fn allocate(&self, name: &str, count: usize) -> Result<()> {
        self.request(name, AllocationRequest::Cores(count))
    }

    /// Reserves one core for `name` on the selected NUMA node.
    pub fn allocate_on_node(&self, name: &str, node: NodeSelector) -> Result<()> {
        self.request(name, AllocationRequest::Node(node))
    }

    /// Reserves cores for `name`. All or nothing.
    pub fn request(&self, name: &str, request: AllocationRequest) -> Result<()> {
        if name.is_empty() {
            return Err(CoreManagerError::InvalidConsumer);
        }
        let mut state = self.state.lock();
        let reservation =
            state
                .pool
                .plan(request)
                .map_err(|reason| CoreManagerError::AllocationFailed {
                    consumer: name.to_string(),
                    reason,
                })?;
        if reservation.is_empty() {
            tracing::debug!("CoreManager: empty request for '{}' ignored", name);
            return Ok(());
        }

        let count = reservation.len();
        let reserved: CoreMask = reservation.cores().collect();
        let mut narrowed = state.process_mask.clone();
        narrowed.difference_with(&reserved);
        self.program_process(&narrowed)?;

        state.pool.commit(name, reservation);
        state.process_mask = narrowed;
        tracing::debug!(
            "CoreManager: reserved {} cores [{}] for '{}' ({} left)",
            count,
            reserved,
            name,
            state.pool.available()
        );
        Ok(())
    }

    /// Binds the calling thread to `name`'s cores, or to the process mask when
    /// `name` holds no reservation. Never touches the bookkeeping.
    pub fn set_affinity(&self, name: &str) -> Result<()> {
        let mask = {
            let state = self.state.lock();
            match state.pool.allocation(name) {
                Some(cores) => cores.iter().copied().collect(),
                None => state.process_mask.clone(),
            }
        };
        if mask.is_empty() {
            return Err(CoreManagerError::AffinitySettingFailed {
                mask: String::new(),
                source: Errno::EINVAL,
            });
        }
        self.program_thread(&mask)?;
        tracing::debug!("CoreManager: '{}' bound to [{}]", name, mask);
        Ok(())
    }

    /// Returns `name`'s cores to the pool, then resets the calling thread to the
    /// process mask. Unknown names only reset the calling thread.
    pub fn release(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(cores) = state.pool.allocation(name) {
            let mut widened = state.process_mask.clone();
            widened.extend(cores.iter().copied());
            self.program_process(&widened)?;

            if let Some(cores) = state.pool.release(name) {
                tracing::debug!(
                    "CoreManager: released [{}] from '{}'",
                    format_core_list(cores),
                    name
                );
            }
            state.process_mask = widened;
        }
        let mask = state.process_mask.clone();
        drop(state);

        if !mask.is_empty() {
            self.program_thread(&mask)?;
        }
        Ok(())
    }

    /// Back to the unconfigured state. Always succeeds.
    pub fn reset(&self) {
        self.state.lock().reset();
        tracing::info!("CoreManager: reset");
    }

    /// Prints [`Self::snapshot`] to stdout.
    pub fn dump(&self) {
        println!("{}", self.snapshot());
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::of(&self.state.lock().pool)
    }

    /// Number of free cores across all nodes.
    pub fn available(&self) -> usize {
        self.state.lock().pool.available()
    }

    /// Number of reserved cores across all consumers.
    pub fn allocated(&self) -> usize {
        self.state.lock().pool.allocated()
    }

    pub fn is_configured(&self) -> bool {
        self.state.lock().configured
    }

    pub fn allocation(&self, name: &str) -> Option<Vec<CoreId>> {
        self.state.lock().pool.allocation(name).map(<[CoreId]>::to_vec)
    }

    pub fn free_cores(&self, node: NodeId) -> Vec<CoreId> {
        self.state.lock().pool.free_cores(node).to_vec()
    }

    pub fn process_mask(&self) -> CoreMask {
        self.state.lock().process_mask.clone()
    }

    /// Cores the calling thread may currently run on, as the kernel reports them.
    pub fn thread_affinity(&self) -> Result<Vec<CoreId>> {
        let mask = self
            .affinity
            .current_thread()
            .map_err(CoreManagerError::AffinityGettingFailed)?;
        if mask.is_empty() {
            return Err(CoreManagerError::AffinityNotSet);
        }
        Ok(mask.to_vec())
    }

    /// The calling thread's mask in cpulist form, e.g. `0-2,5`.
    pub fn affinity_string(&self) -> Result<String> {
        Ok(format_core_list(self.thread_affinity()?))
    }

    /// Installs the process mask. The kernel rejects empty masks, so an exhausted
    /// pool keeps the previous one in place.
    fn program_process(&self, mask: &CoreMask) -> Result<()> {
        if mask.is_empty() {
            tracing::warn!("CoreManager: no free cores left, keeping previous process affinity");
            return Ok(());
        }
        self.affinity
            .apply_process(mask)
            .map_err(|source| CoreManagerError::AffinitySettingFailed {
                mask: mask.to_string(),
                source,
            })
    }

    fn program_thread(&self, mask: &CoreMask) -> Result<()> {
        self.affinity
            .apply_thread(mask)
            .map_err(|source| CoreManagerError::AffinitySettingFailed {
                mask: mask.to_string(),
                source,
            })
    }
}

impl std::fmt::Debug for CoreManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CoreManager")
            .field("configured", &state.configured)
            .field("available", &state.pool.available())
            .field("allocated", &state.pool.allocated())
            .field("process_mask", &state.process_mask)
            .finish()
    }
}

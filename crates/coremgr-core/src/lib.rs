//! # coremgr-core: CPU Core Reservation
//!
//! Partitions the cores assigned to a process among named consumers so that
//! application threads never contend for the same physical core, and programs the
//! scheduler's affinity masks to match.
//!
//! ```no_run
//! use coremgr_core::CoreManager;
//!
//! # fn main() -> coremgr_core::Result<()> {
//! let manager = CoreManager::with_os_affinity();
//! manager.configure("0-3")?;
//! manager.allocate("data-reader", 1)?;
//!
//! std::thread::scope(|s| {
//!     s.spawn(|| {
//!         manager.set_affinity("data-reader")?;
//!         // ... work pinned to the reserved core ...
//!         manager.release("data-reader")
//!     });
//! });
//! # Ok(())
//! # }
//! ```
pub mod affinity;
pub mod config;
pub mod error;
pub mod manager;
pub mod snapshot;
pub mod topology;

pub use affinity::{AffinityControl, DryRunAffinity, OsAffinity};
pub use config::ManagerConfig;
pub use coremgr_dsa::{AllocationFailure, AllocationRequest, CoreId, CoreMask, NodeId, NodeSelector};
pub use error::{CoreManagerError, Result};
pub use manager::CoreManager;
pub use snapshot::Snapshot;
pub use topology::{HostTopology, ProcessingResource, SysfsTopology, TopologyView};

//! OS affinity programming.
//!
//! The manager never calls the kernel directly; it goes through [`AffinityControl`]
//! so the same bookkeeping can run against the real scheduler ([`OsAffinity`]) or an
//! in-memory recorder ([`DryRunAffinity`]).

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use coremgr_dsa::{CoreId, CoreMask};
use nix::errno::Errno;
use parking_lot::Mutex;

/// Number of cpus a glibc `cpu_set_t` can describe.
#[cfg(not(target_os = "linux"))]
const CPU_SETSIZE: usize = 1024;

/// Programs and reads CPU affinity masks.
pub trait AffinityControl: Send + Sync {
    /// Installs the process-wide default mask.
    fn apply_process(&self, mask: &CoreMask) -> nix::Result<()>;

    /// Binds the calling thread to `mask`.
    fn apply_thread(&self, mask: &CoreMask) -> nix::Result<()>;

    /// Reads the calling thread's mask.
    fn current_thread(&self) -> nix::Result<CoreMask>;
}

/// Highest core id a kernel cpu set can hold.
#[cfg(target_os = "linux")]
pub fn max_core() -> CoreId {
    nix::sched::CpuSet::count() - 1
}

#[cfg(not(target_os = "linux"))]
pub fn max_core() -> CoreId {
    CPU_SETSIZE - 1
}

/// Affinity through `sched_setaffinity(2)` / `sched_getaffinity(2)`.
///
/// The kernel only knows per-thread masks. The process mask is installed on the
/// calling thread, which is expected to be the coordinating thread; every thread it
/// spawns afterwards inherits that mask.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsAffinity;

#[cfg(target_os = "linux")]
impl OsAffinity {
    fn to_cpu_set(mask: &CoreMask) -> nix::Result<nix::sched::CpuSet> {
        let mut set = nix::sched::CpuSet::new();
        for core in mask {
            set.set(core)?;
        }
        Ok(set)
    }
}

#[cfg(target_os = "linux")]
impl AffinityControl for OsAffinity {
    fn apply_process(&self, mask: &CoreMask) -> nix::Result<()> {
        self.apply_thread(mask)
    }

    fn apply_thread(&self, mask: &CoreMask) -> nix::Result<()> {
        let set = Self::to_cpu_set(mask)?;
        // pid 0 is the calling thread
        nix::sched::sched_setaffinity(nix::unistd::Pid::from_raw(0), &set)
    }

    fn current_thread(&self) -> nix::Result<CoreMask> {
        let set = nix::sched::sched_getaffinity(nix::unistd::Pid::from_raw(0))?;
        Ok((0..nix::sched::CpuSet::count())
            .filter(|&core| set.is_set(core).unwrap_or(false))
            .collect())
    }
}

#[cfg(not(target_os = "linux"))]
impl AffinityControl for OsAffinity {
    fn apply_process(&self, _mask: &CoreMask) -> nix::Result<()> {
        Err(Errno::ENOSYS)
    }

    fn apply_thread(&self, _mask: &CoreMask) -> nix::Result<()> {
        Err(Errno::ENOSYS)
    }

    fn current_thread(&self) -> nix::Result<CoreMask> {
        Err(Errno::ENOSYS)
    }
}

#[derive(Debug, Default)]
struct DryRunState {
    process: CoreMask,
    threads: HashMap<ThreadId, CoreMask>,
}

/// Records masks in memory instead of programming the scheduler.
///
/// Threads that never had a mask of their own report the last process mask, the
/// same inheritance the kernel gives threads spawned after the process mask is set.
/// Empty masks are rejected with `EINVAL` as the kernel would.
///
/// A thread that is bound back to the process mask drops its own entry, so worker
/// threads that release before exiting leave nothing behind. Only threads that
/// install a process mask keep a record for the life of the recorder.
#[derive(Debug, Default)]
pub struct DryRunAffinity {
    state: Mutex<DryRunState>,
}

impl DryRunAffinity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last process mask installed.
    pub fn process_mask(&self) -> CoreMask {
        self.state.lock().process.clone()
    }

    /// Mask recorded for `thread`, if it ever had one.
    pub fn thread_mask(&self, thread: ThreadId) -> Option<CoreMask> {
        self.state.lock().threads.get(&thread).cloned()
    }

    /// Number of threads with a mask of their own.
    pub fn tracked_threads(&self) -> usize {
        self.state.lock().threads.len()
    }
}

impl AffinityControl for DryRunAffinity {
    fn apply_process(&self, mask: &CoreMask) -> nix::Result<()> {
        if mask.is_empty() {
            return Err(Errno::EINVAL);
        }
        let mut state = self.state.lock();
        state.process = mask.clone();
        state.threads.insert(thread::current().id(), mask.clone());
        Ok(())
    }

    fn apply_thread(&self, mask: &CoreMask) -> nix::Result<()> {
        if mask.is_empty() {
            return Err(Errno::EINVAL);
        }
        let mut state = self.state.lock();
        let id = thread::current().id();
        if *mask == state.process {
            state.threads.remove(&id);
        } else {
            state.threads.insert(id, mask.clone());
        }
        Ok(())
    }

    fn current_thread(&self) -> nix::Result<CoreMask> {
        let state = self.state.lock();
        Ok(state
            .threads
            .get(&thread::current().id())
            .unwrap_or(&state.process)
            .clone())
    }
}

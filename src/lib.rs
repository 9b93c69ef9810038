//! # coremgr
//!
//! CPU-core reservation and affinity binding for multi-threaded acquisition
//! processes. Re-exports the manager from `coremgr-core` and the bookkeeping types
//! from `coremgr-dsa`.

pub use coremgr_core::*;

pub mod dsa {
    pub use coremgr_dsa::*;
}

/// Installs the default `tracing` subscriber for demos and tools.
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}

//! # coremgr-dsa: Reservation Foundations
//!
//! Allocation-free-of-the-OS data structures behind the core manager: the core-list
//! parser, the [`CoreMask`] bitset and the [`CorePool`] bookkeeping. Nothing in this
//! crate touches the kernel; programming masks is the job of `coremgr-core`.
#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod corelist;
pub mod mask;
pub mod pool;

/// Logical CPU identifier as the kernel numbers it.
pub type CoreId = usize;

/// NUMA node identifier. Node 0 is used when the topology is unknown.
pub type NodeId = u32;

pub use corelist::{format_core_list, parse_core_list, parse_core_list_bounded};
pub use mask::CoreMask;
pub use pool::{AllocationFailure, AllocationRequest, CorePool, NodeSelector, Reservation};

// src/lib.rs
//! A pedagogical operating system kernel core: process scheduling, demand
//! paging and blocking syscalls running on top of a simulated CPU, MMU and
//! I/O controller.
//!
//! The kernel never touches those three components' internals; a host
//! embeds this crate by implementing [`kernel::core::traits::Cpu`],
//! [`kernel::core::traits::Mmu`] and [`kernel::core::traits::IoController`]
//! and driving [`kernel::Kernel::handle_trap`] from its own instruction
//! loop.

pub mod config;
pub mod constants;
pub mod kernel;

pub use config::KernelConfig;
pub use kernel::core::result::{DeviceError, KernelError, KernelResult, MemoryError, ProcessError};
pub use kernel::{DispatchOutcome, Kernel};

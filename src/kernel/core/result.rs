// src/kernel/core/result.rs
//! Kernel-wide error handling.
//!
//! Every subsystem gets its own error enum; [`KernelError`] folds them
//! together with `#[from]` so a handler can propagate with `?` while still
//! exposing the originating kind to callers that need to branch on it (the
//! CPU error handler, for instance, treats [`MemoryError::PageAbsent`]
//! differently from every other variant).

use crate::kernel::core::types::ProcessId;
use thiserror::Error;

pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KernelError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    #[error("unknown syscall id {0}")]
    UnknownSyscall(i32),

    /// Internal kernel failure. These halt the simulator (§7): save-area
    /// read failures, a failed clock re-arm, a double fault on an already
    /// mapped page, or a device read error surfacing out of the pending-I/O
    /// resolver.
    #[error("internal kernel error: {0}")]
    Internal(&'static str),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device {0} does not exist")]
    NoSuchDevice(u32),
    #[error("device {0} is not ready")]
    NotReady(u32),
    #[error("I/O failure on device {0}")]
    IoFailure(u32),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    #[error("page absent for virtual address {0:#x}")]
    PageAbsent(u32),
    #[error("virtual address {0:#x} is outside the process image")]
    InvalidAddress(u32),
    #[error("no free physical frame and nothing evictable")]
    NoFreeFrame,
    #[error("swap area exhausted")]
    SwapExhausted,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    #[error("no free process table slot")]
    TableFull,
    #[error("no free terminal")]
    NoFreeTerminal,
    #[error("no such process {0}")]
    NotFound(ProcessId),
}

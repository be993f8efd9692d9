// src/kernel/core/types.rs
//! Common identifier newtypes used across the kernel.

use core::fmt;

/// Process identifier. Pids are assigned starting at 1, monotonically, by
/// [`crate::kernel::process::ProcessTable::alloc_pid`] and are never reused
/// within a run, even once the slot they occupied is freed; a pid of 0 never
/// names a real process and is used by callers as a "no target" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

impl ProcessId {
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical frame index into the frame table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub usize);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduling priority. Lower values are scheduled first; freshly created
/// processes start at [`crate::constants::DEFAULT_QUANTUM`] as u32, the
/// least-favored starting priority.
pub type Priority = f64;

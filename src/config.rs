// src/config.rs
//! Kernel configuration.
//!
//! There is no on-disk config file in the assignment this crate is built
//! from; a host simulator constructs a [`KernelConfig`] programmatically and
//! passes it to [`crate::kernel::Kernel::new`].

/// Which ready-queue discipline the scheduler uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    /// FIFO round-robin, the default.
    RoundRobin,
    /// Lowest-`priority`-first, with the update rule from SPEC_FULL §4.11.
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelConfig {
    pub scheduler_kind: SchedulerKind,
    pub quantum: u32,
    pub clock_interval: i32,
    pub max_processes: usize,
    pub terminal_count: usize,
    pub page_size: u32,
    /// Physical memory available for user pages, in frames. Kept apart from
    /// [`Self::swap_capacity_pages`]: demand paging only does anything
    /// useful when there is less of this than of that.
    pub frame_count: usize,
    /// Backing-store capacity, in pages, shared by every process's image.
    pub swap_capacity_pages: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            scheduler_kind: SchedulerKind::RoundRobin,
            quantum: crate::constants::DEFAULT_QUANTUM,
            clock_interval: crate::constants::DEFAULT_CLOCK_INTERVAL,
            max_processes: crate::constants::MAX_PROCESSES,
            terminal_count: crate::constants::TERMINAL_COUNT,
            page_size: crate::constants::PAGE_SIZE,
            frame_count: 64,
            swap_capacity_pages: 256,
        }
    }
}

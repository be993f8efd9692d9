// src/kernel/mm/frame.rs
//! Physical frame table and allocation.

use crate::kernel::core::result::MemoryError;
use crate::kernel::core::types::{FrameId, ProcessId};

#[derive(Debug, Clone, Copy)]
pub struct FrameEntry {
    pub occupied: bool,
    /// Permanently occupied kernel frames never appear in the allocator or
    /// the LRU eviction scan (§8: "reserved frames never user-allocated").
    pub reserved: bool,
    pub owner_pid: Option<ProcessId>,
    pub owner_virtual_page: Option<usize>,
    pub load_cycle: i64,
    pub last_access: i64,
}

impl FrameEntry {
    const fn free() -> Self {
        Self {
            occupied: false,
            reserved: false,
            owner_pid: None,
            owner_virtual_page: None,
            load_cycle: 0,
            last_access: 0,
        }
    }
}

/// Flat table of physical frames. The first `reserved_count` frames are
/// permanently occupied by the kernel image and never change state.
#[derive(Debug, Clone)]
pub struct FrameTable {
    frames: Vec<FrameEntry>,
}

impl FrameTable {
    #[must_use]
    pub fn new(total_frames: usize, reserved_count: usize) -> Self {
        let mut frames = vec![FrameEntry::free(); total_frames];
        for frame in frames.iter_mut().take(reserved_count) {
            frame.occupied = true;
            frame.reserved = true;
        }
        Self { frames }
    }

    #[must_use]
    pub fn get(&self, frame: FrameId) -> Option<&FrameEntry> {
        self.frames.get(frame.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// First free, non-reserved frame, if any.
    #[must_use]
    pub fn first_free(&self) -> Option<FrameId> {
        self.frames
            .iter()
            .position(|f| !f.occupied && !f.reserved)
            .map(FrameId)
    }

    /// The non-reserved, occupied frame with the oldest `last_access`.
    /// Returns `None` only if every user frame is unoccupied (never true
    /// once at least one process has faulted a page in).
    #[must_use]
    pub fn least_recently_used(&self) -> Option<FrameId> {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.occupied && !f.reserved)
            .min_by_key(|(_, f)| f.last_access)
            .map(|(idx, _)| FrameId(idx))
    }

    /// Find a frame to place a newly faulted-in page into: an unoccupied
    /// frame if one exists, otherwise the least-recently-used occupied one.
    pub fn find_frame_for_fault(&self) -> Result<FrameId, MemoryError> {
        self.first_free()
            .or_else(|| self.least_recently_used())
            .ok_or(MemoryError::NoFreeFrame)
    }

    pub fn assign(&mut self, frame: FrameId, owner: ProcessId, virtual_page: usize, now: i64) {
        if let Some(entry) = self.frames.get_mut(frame.0) {
            entry.occupied = true;
            entry.owner_pid = Some(owner);
            entry.owner_virtual_page = Some(virtual_page);
            entry.load_cycle = now;
            entry.last_access = now;
        }
    }

    pub fn touch(&mut self, frame: FrameId, now: i64) {
        if let Some(entry) = self.frames.get_mut(frame.0) {
            entry.last_access = now;
        }
    }

    /// Release every frame owned by `pid` (called when a process is reaped).
    pub fn release_owned_by(&mut self, pid: ProcessId) {
        for entry in &mut self.frames {
            if entry.owner_pid == Some(pid) {
                *entry = FrameEntry::free();
            }
        }
    }
}

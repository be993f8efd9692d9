// src/kernel/mm/page_fault.rs
//! Demand paging: resolve a page-absent fault by loading the faulting page
//! from swap into a physical frame, evicting by LRU if none is free.

use crate::kernel::core::result::{KernelError, ProcessError};
use crate::kernel::core::traits::Mmu;
use crate::kernel::core::{KernelResult, ProcessId};
use crate::kernel::mm::{FrameTable, SwapArea};
use crate::kernel::process::{Pcb, ProcessTable};

/// Resolve a page-absent fault at `fault_addr` for `pid`.
///
/// Mirrors `so_trata_page_fault`/`page_fault_tratavel`: reject a spurious
/// fault on a page that's already mapped, otherwise find or evict a frame
/// (invalidating the evicted owner's own mapping to it, so no two processes
/// ever claim the same frame at once), copy the faulting page in from swap,
/// then update both the frame table and the faulting process's page table.
pub fn handle_page_fault(
    table: &mut ProcessTable,
    pid: ProcessId,
    frames: &mut FrameTable,
    swap: &SwapArea,
    mmu: &mut dyn Mmu,
    fault_addr: u32,
    page_size: u32,
    now: i64,
) -> KernelResult<()> {
    let virtual_page = fault_addr / page_size;

    let already_mapped = table.get(pid).is_some_and(|p| p.page_table.translate(virtual_page as usize).is_some());
    if already_mapped {
        return Err(KernelError::Internal("spurious page fault on an already-mapped page"));
    }

    let frame = frames.find_frame_for_fault()?;

    if let Some((owner, owner_page)) = frames.get(frame).and_then(|e| Some((e.owner_pid?, e.owner_virtual_page?))) {
        if let Some(victim) = table.get_mut(owner) {
            victim.page_table.unset_frame(owner_page);
        }
    }

    let disk_base = table.get(pid).ok_or(ProcessError::NotFound(pid))?.disk_base;
    let page_words = swap.read_page(disk_base, virtual_page, page_size);
    mmu.load_frame(frame, &page_words)?;

    frames.assign(frame, pid, virtual_page as usize, now);
    if let Some(process) = table.get_mut(pid) {
        process.page_table.set_frame(virtual_page as usize, frame);
    }
    Ok(())
}

/// Record a successful access to an already-mapped page, keeping its frame
/// out of the LRU eviction pool's oldest end.
pub fn touch_page(process: &Pcb, frames: &mut FrameTable, virtual_page: u32, now: i64) {
    if let Some(frame) = process.page_table.translate(virtual_page as usize) {
        frames.touch(frame, now);
    }
}

/// Release every frame a terminated process held.
pub fn release_process_frames(frames: &mut FrameTable, pid: ProcessId) {
    frames.release_owned_by(pid);
}

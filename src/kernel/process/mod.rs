// src/kernel/process/mod.rs
//! Process control blocks and the process table.

pub mod ready_queue;

pub use ready_queue::ReadyQueue;

use crate::kernel::core::types::{Priority, ProcessId};
use crate::kernel::core::{DeviceId, ProcessError};
use crate::kernel::mm::PageTable;

/// Number of [`ProcessState`] variants tracked by the metrics arrays,
/// ignoring the payload a `Blocked` state carries.
pub const STATE_COUNT: usize = 4;

/// Process execution state. Unlike the original's two optional fields
/// (`dispositivo_bloqueado`, `pid_esperando`), blocking reason is folded
/// into the state itself so "exactly one of the two is set while blocked"
/// is a structural guarantee rather than a runtime invariant to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Blocked(BlockReason),
    Terminated,
}

impl ProcessState {
    /// Index into the per-state metrics arrays (entry counts, time sums).
    #[must_use]
    pub const fn metric_index(self) -> usize {
        match self {
            ProcessState::Ready => 0,
            ProcessState::Running => 1,
            ProcessState::Blocked(_) => 2,
            ProcessState::Terminated => 3,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Blocked(_) => "blocked",
            ProcessState::Terminated => "terminated",
        }
    }
}

/// Why a process is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Blocked on LE/ESCR, waiting for the named subdevice to become ready.
    Device(DeviceId),
    /// Blocked in ESPERA_PROC, waiting for the named pid to terminate.
    Exit(ProcessId),
}

/// The simulated CPU's saved register set, copied in and out of the PCB on
/// every context switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuContext {
    pub pc: i32,
    pub reg_a: i32,
    pub reg_x: i32,
    pub err: i32,
    pub complement: i32,
}

/// Per-process accounting, folded into the final report (and into the
/// metrics history table) when the process is reaped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessMetrics {
    pub created_at: i64,
    pub terminated_at: Option<i64>,
    pub preemptions: u32,
    pub state_entries: [u32; STATE_COUNT],
    pub state_time: [i64; STATE_COUNT],
    pub last_state_change: i64,
    /// Set when a Blocked→Ready transition happens; cleared once the
    /// matching Ready→Running transition has charged the response time.
    pub unblocked_at: Option<i64>,
    pub response_time_sum: i64,
    pub response_count: u32,
}

impl ProcessMetrics {
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            created_at: now,
            terminated_at: None,
            preemptions: 0,
            state_entries: [0; STATE_COUNT],
            state_time: [0; STATE_COUNT],
            last_state_change: now,
            unblocked_at: None,
            response_time_sum: 0,
            response_count: 0,
        }
    }

    #[must_use]
    pub fn mean_response_time(&self) -> Option<f64> {
        if self.response_count == 0 {
            None
        } else {
            Some(self.response_time_sum as f64 / f64::from(self.response_count))
        }
    }
}

/// Process control block.
#[derive(Debug, Clone)]
pub struct Pcb {
    pub pid: ProcessId,
    pub state: ProcessState,
    pub context: CpuContext,
    pub input_device: DeviceId,
    pub output_device: DeviceId,
    pub terminal: usize,
    pub quantum_remaining: u32,
    pub priority: Priority,
    pub page_table: PageTable,
    /// Offset of this process's image in the simulated swap area.
    pub disk_base: u32,
    pub metrics: ProcessMetrics,
}

impl Pcb {
    #[must_use]
    pub fn new(
        pid: ProcessId,
        input_device: DeviceId,
        output_device: DeviceId,
        terminal: usize,
        disk_base: u32,
        quantum: u32,
        now: i64,
    ) -> Self {
        let mut metrics = ProcessMetrics::new(now);
        metrics.state_entries[ProcessState::Ready.metric_index()] = 1;
        Self {
            pid,
            state: ProcessState::Ready,
            context: CpuContext::default(),
            input_device,
            output_device,
            terminal,
            quantum_remaining: quantum,
            priority: f64::from(quantum),
            page_table: PageTable::new(),
            disk_base,
            metrics,
        }
    }
}

/// The process table: `capacity` slots, reused as processes are reaped, but
/// pids themselves are never reused (`so.c`'s `pid_inicial++`, kept as
/// [`ProcessTable::alloc_pid`] here). A slot's position carries no relation
/// to the pid it holds, so lookup by pid is a linear scan over occupied
/// slots rather than a direct index.
#[derive(Debug, Clone)]
pub struct ProcessTable {
    slots: Vec<Option<Pcb>>,
    current: Option<ProcessId>,
    next_pid: u32,
}

impl ProcessTable {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            current: None,
            next_pid: 1,
        }
    }

    /// Hand out a fresh pid, never to be returned again by this table.
    pub fn alloc_pid(&mut self) -> ProcessId {
        let pid = ProcessId(self.next_pid);
        self.next_pid += 1;
        pid
    }

    /// Whether a slot is free for a new process, without allocating a pid
    /// for it. Used by CRIA_PROC to fail fast before doing the work of
    /// loading the new program image.
    #[must_use]
    pub fn has_free_slot(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    pub fn insert(&mut self, pcb: Pcb) -> Result<(), ProcessError> {
        let slot = self.slots.iter_mut().find(|s| s.is_none()).ok_or(ProcessError::TableFull)?;
        *slot = Some(pcb);
        Ok(())
    }

    pub fn remove(&mut self, pid: ProcessId) -> Option<Pcb> {
        self.slots.iter_mut().find(|s| matches!(s, Some(p) if p.pid == pid))?.take()
    }

    #[must_use]
    pub fn get(&self, pid: ProcessId) -> Option<&Pcb> {
        self.slots.iter().flatten().find(|p| p.pid == pid)
    }

    pub fn get_mut(&mut self, pid: ProcessId) -> Option<&mut Pcb> {
        self.slots.iter_mut().flatten().find(|p| p.pid == pid)
    }

    #[must_use]
    pub fn current(&self) -> Option<&Pcb> {
        self.current.and_then(|pid| self.get(pid))
    }

    pub fn current_mut(&mut self) -> Option<&mut Pcb> {
        self.current.and_then(move |pid| self.get_mut(pid))
    }

    #[must_use]
    pub fn current_pid(&self) -> Option<ProcessId> {
        self.current
    }

    pub fn set_current(&mut self, pid: Option<ProcessId>) {
        self.current = pid;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pcb> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_pcb(pid: u32) -> Pcb {
        Pcb::new(
            ProcessId(pid),
            DeviceId::terminal_keyboard(0),
            DeviceId::terminal_screen(0),
            0,
            0,
            10,
            0,
        )
    }

    #[test]
    fn has_free_slot_reflects_occupancy() {
        let mut table = ProcessTable::new(1);
        assert!(table.has_free_slot());
        table.insert(dummy_pcb(1)).unwrap();
        assert!(!table.has_free_slot());
    }

    #[test]
    fn table_full_rejects_insert_beyond_capacity() {
        let mut table = ProcessTable::new(1);
        table.insert(dummy_pcb(1)).unwrap();
        assert!(!table.has_free_slot());
        assert!(table.insert(dummy_pcb(2)).is_err());
    }

    #[test]
    fn remove_frees_the_slot_for_a_different_pid() {
        let mut table = ProcessTable::new(1);
        table.insert(dummy_pcb(1)).unwrap();
        assert!(table.remove(ProcessId(1)).is_some());
        assert!(table.has_free_slot());
        table.insert(dummy_pcb(2)).unwrap();
        assert_eq!(table.get(ProcessId(2)).map(|p| p.pid), Some(ProcessId(2)));
    }

    #[test]
    fn alloc_pid_never_repeats_even_after_its_slot_is_freed() {
        let mut table = ProcessTable::new(1);
        let first = table.alloc_pid();
        table.insert(dummy_pcb(first.get())).unwrap();
        table.remove(first);
        let second = table.alloc_pid();
        assert_ne!(first, second, "a pid must not be handed out twice within a run");
    }
}

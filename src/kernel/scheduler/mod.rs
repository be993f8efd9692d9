// src/kernel/scheduler/mod.rs
//! Process scheduling: reap-preserve-pick dispatch and quantum preemption.
//!
//! Grounded in `so_escalona` (dispatch) and `so_trata_irq_relogio`
//! (preemption), with the priority-update rule from `t2/parte3/prioridade`.

use crate::config::SchedulerKind;
use crate::kernel::core::types::ProcessId;
use crate::kernel::metrics::Metrics;
use crate::kernel::mm::FrameTable;
use crate::kernel::process::{BlockReason, ProcessState, ProcessTable, ReadyQueue};

/// Free the PCB, frames and metrics snapshot of every terminated process in
/// the table, not just the current one (`so_escalona`'s cleanup sweep).
fn reap_terminated(table: &mut ProcessTable, frames: &mut FrameTable, metrics: &mut Metrics, now: i64) {
    let dead: Vec<ProcessId> = table
        .iter()
        .filter(|pcb| pcb.state == ProcessState::Terminated)
        .map(|pcb| pcb.pid)
        .collect();
    for pid in dead {
        if let Some(pcb) = table.get(pid) {
            metrics.reap(pcb, now);
        }
        crate::kernel::mm::release_process_frames(frames, pid);
        table.remove(pid);
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    kind: SchedulerKind,
    queue: ReadyQueue,
    quantum: u32,
}

impl Scheduler {
    #[must_use]
    pub fn new(kind: SchedulerKind, quantum: u32) -> Self {
        Self { kind, queue: ReadyQueue::new(kind), quantum }
    }

    pub fn enqueue(&mut self, pid: ProcessId) {
        self.queue.enqueue(pid);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Snapshot of pids currently waiting for CPU time, for monitoring/tests.
    #[must_use]
    pub fn ready_pids(&self) -> Vec<ProcessId> {
        self.queue.iter().collect()
    }

    /// Reap a terminated current process, then either keep the still-running
    /// current process or pick the next ready pid. Mirrors `so_escalona`:
    /// a process that is merely `Running` is never preempted here, only by
    /// [`Scheduler::on_clock_tick`].
    pub fn schedule(
        &mut self,
        table: &mut ProcessTable,
        frames: &mut FrameTable,
        metrics: &mut Metrics,
        now: i64,
    ) -> Option<ProcessId> {
        reap_terminated(table, frames, metrics, now);

        if let Some(pid) = table.current_pid() {
            match table.get(pid).map(|pcb| pcb.state) {
                Some(ProcessState::Running) => return Some(pid),
                Some(_) => table.set_current(None),
                None => table.set_current(None),
            }
        }

        let picked = self.queue.pop_next(table);
        if let Some(pid) = picked {
            if let Some(pcb) = table.get_mut(pid) {
                metrics.transition(pcb, ProcessState::Running, now);
            }
        }
        table.set_current(picked);
        picked
    }

    /// Decrement the current process's quantum; preempt it back to the ready
    /// queue once it hits zero, unless the process blocked in the same tick.
    /// Returns `true` when a preemption happened.
    pub fn on_clock_tick(&mut self, table: &mut ProcessTable, metrics: &mut Metrics, now: i64) -> bool {
        let Some(pid) = table.current_pid() else { return false };
        let Some(pcb) = table.get_mut(pid) else { return false };

        if matches!(pcb.state, ProcessState::Blocked(_) | ProcessState::Terminated) {
            return false;
        }

        pcb.quantum_remaining = pcb.quantum_remaining.saturating_sub(1);
        if pcb.quantum_remaining > 0 {
            return false;
        }

        let t_exec = self.quantum - pcb.quantum_remaining;
        if self.kind == SchedulerKind::Priority {
            pcb.priority = (pcb.priority + f64::from(t_exec) / f64::from(self.quantum)) / 2.0;
        }
        pcb.quantum_remaining = self.quantum;
        pcb.metrics.preemptions += 1;
        metrics.transition(pcb, ProcessState::Ready, now);
        metrics.record_preemption();

        table.set_current(None);
        self.queue.enqueue(pid);
        true
    }

    /// Move a process that just blocked out of `current` and record the
    /// transition, without touching its quantum (the original preserves
    /// whatever quantum remained for when it's unblocked).
    pub fn block_current(
        &mut self,
        table: &mut ProcessTable,
        metrics: &mut Metrics,
        pid: ProcessId,
        reason: BlockReason,
        now: i64,
    ) {
        if let Some(pcb) = table.get_mut(pid) {
            metrics.transition(pcb, ProcessState::Blocked(reason), now);
        }
        if table.current_pid() == Some(pid) {
            table.set_current(None);
        }
    }

    /// Move an unblocked process back into the ready queue.
    pub fn unblock(&mut self, table: &mut ProcessTable, metrics: &mut Metrics, pid: ProcessId, now: i64) {
        if let Some(pcb) = table.get_mut(pid) {
            metrics.transition(pcb, ProcessState::Ready, now);
        }
        self.queue.enqueue(pid);
    }
}

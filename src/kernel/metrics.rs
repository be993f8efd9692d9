// src/kernel/metrics.rs
//! System-wide accounting: IRQ counts, idle time, and the per-process
//! history table used to produce the shutdown report.
//!
//! [`Metrics::transition`] is the single funnel every state change passes
//! through (`so_muda_estado`); no other code in this crate is allowed to
//! assign [`ProcessState`] directly.

use std::collections::BTreeMap;

use crate::kernel::core::traits::Irq;
use crate::kernel::core::types::ProcessId;
use crate::kernel::process::{Pcb, ProcessMetrics, ProcessState, ProcessTable};

const IRQ_COUNT: usize = 4;

fn irq_index(irq: Irq) -> usize {
    match irq {
        Irq::Reset => 0,
        Irq::SystemCall => 1,
        Irq::CpuError => 2,
        Irq::Clock => 3,
    }
}

fn irq_name(irq: Irq) -> &'static str {
    match irq {
        Irq::Reset => "reset",
        Irq::SystemCall => "system call",
        Irq::CpuError => "cpu error",
        Irq::Clock => "clock",
    }
}

/// A terminated process's final accounting, kept after its PCB is freed.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSnapshot {
    pub pid: ProcessId,
    pub metrics: ProcessMetrics,
}

#[derive(Debug, Clone)]
pub struct Metrics {
    pub processes_created: u32,
    pub idle_cycles: i64,
    pub total_preemptions: u32,
    irq_counts: [u32; IRQ_COUNT],
    last_update: i64,
    /// Keyed by pid, not by table slot: pids are never reused within a run
    /// (unlike slots, which are), so this grows for as long as the run
    /// keeps creating processes rather than wrapping around and
    /// overwriting an earlier process's snapshot.
    history: BTreeMap<ProcessId, ProcessSnapshot>,
}

impl Metrics {
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            processes_created: 0,
            idle_cycles: 0,
            total_preemptions: 0,
            irq_counts: [0; IRQ_COUNT],
            last_update: now,
            history: BTreeMap::new(),
        }
    }

    pub fn record_irq(&mut self, irq: Irq) {
        self.irq_counts[irq_index(irq)] += 1;
    }

    pub fn record_process_created(&mut self) {
        self.processes_created += 1;
    }

    pub fn record_preemption(&mut self) {
        self.total_preemptions += 1;
    }

    /// The single state-transition helper every handler funnels through.
    /// No-op when `new_state` equals the process's current state.
    pub fn transition(&mut self, pcb: &mut Pcb, new_state: ProcessState, now: i64) {
        if pcb.state == new_state {
            return;
        }
        let old_state = pcb.state;
        let delta = now - pcb.metrics.last_state_change;
        pcb.metrics.state_time[old_state.metric_index()] += delta;

        pcb.state = new_state;
        pcb.metrics.state_entries[new_state.metric_index()] += 1;
        pcb.metrics.last_state_change = now;

        match (old_state, new_state) {
            (ProcessState::Blocked(_), ProcessState::Ready) => {
                pcb.metrics.unblocked_at = Some(now);
            }
            (ProcessState::Ready, ProcessState::Running) => {
                if let Some(unblocked_at) = pcb.metrics.unblocked_at.take() {
                    pcb.metrics.response_time_sum += now - unblocked_at;
                    pcb.metrics.response_count += 1;
                }
            }
            _ => {}
        }

        if new_state == ProcessState::Terminated && pcb.metrics.terminated_at.is_none() {
            pcb.metrics.terminated_at = Some(now);
        }
    }

    /// Charge elapsed time since the last update to whatever is running (or
    /// to the idle counter), and to every other live Ready/Blocked process.
    /// Called first thing on every kernel entry (`so_atualiza_tempos`).
    pub fn update_times(&mut self, table: &mut ProcessTable, now: i64) {
        let delta = now - self.last_update;
        if delta == 0 {
            return;
        }

        let current = table.current_pid();
        match current {
            None => self.idle_cycles += delta,
            Some(pid) => {
                if let Some(pcb) = table.get_mut(pid) {
                    if pcb.state == ProcessState::Running {
                        pcb.metrics.state_time[ProcessState::Running.metric_index()] += delta;
                        pcb.metrics.last_state_change = now;
                    }
                }
            }
        }

        for pcb in table.iter_mut() {
            if current == Some(pcb.pid) {
                continue;
            }
            if matches!(pcb.state, ProcessState::Ready | ProcessState::Blocked(_)) {
                pcb.metrics.state_time[pcb.state.metric_index()] += delta;
                pcb.metrics.last_state_change = now;
            }
        }

        self.last_update = now;
    }

    /// A reaped process's final accounting, if it was ever reaped.
    #[must_use]
    pub fn snapshot(&self, pid: ProcessId) -> Option<&ProcessSnapshot> {
        self.history.get(&pid)
    }

    /// Snapshot a process's final accounting into the history table, keyed
    /// by its pid. Called right before its PCB is freed.
    pub fn reap(&mut self, pcb: &Pcb, now: i64) {
        let mut metrics = pcb.metrics;
        if metrics.terminated_at.is_none() {
            metrics.terminated_at = Some(now);
        }
        self.history.insert(pcb.pid, ProcessSnapshot { pid: pcb.pid, metrics });
    }

    /// Force every still-live process to `Terminated` and snapshot it,
    /// for the final report (`imprimir_dados`'s forcing sweep).
    pub fn force_terminate_all(&mut self, table: &mut ProcessTable, now: i64) {
        let pids: Vec<ProcessId> = table.iter().map(|p| p.pid).collect();
        for pid in pids {
            if let Some(pcb) = table.get_mut(pid) {
                self.transition(pcb, ProcessState::Terminated, now);
                self.reap(pcb, now);
            }
        }
    }

    /// Render the shutdown report in the same shape as `imprimir_dados`.
    #[must_use]
    pub fn report(&self, total_cycles: i64) -> String {
        use std::fmt::Write as _;
        let mut out = String::new();

        let _ = writeln!(out, "=== system metrics ===");
        let _ = writeln!(out, "processes created: {}", self.processes_created);
        let _ = writeln!(out, "total cycles: {total_cycles}");
        let idle_pct = if total_cycles == 0 {
            0.0
        } else {
            100.0 * self.idle_cycles as f64 / total_cycles as f64
        };
        let _ = writeln!(out, "idle cycles: {} ({idle_pct:.2}%)", self.idle_cycles);
        for irq in [Irq::Reset, Irq::SystemCall, Irq::CpuError, Irq::Clock] {
            let count = self.irq_counts[irq_index(irq)];
            if count > 0 {
                let _ = writeln!(out, "  {} interrupts: {count}", irq_name(irq));
            }
        }
        let _ = writeln!(out, "total preemptions: {}", self.total_preemptions);

        let _ = writeln!(out, "--- per-process metrics ---");
        for slot in self.history.values() {
            let m = &slot.metrics;
            let turnaround = m.terminated_at.map_or(-1, |end| end - m.created_at);
            let _ = writeln!(out, "pid {}:", slot.pid);
            let _ = writeln!(out, "  turnaround: {turnaround}");
            let _ = writeln!(out, "  preemptions: {}", m.preemptions);
            let _ = writeln!(
                out,
                "  state entries: ready={} running={} blocked={} terminated={}",
                m.state_entries[0], m.state_entries[1], m.state_entries[2], m.state_entries[3]
            );
            let _ = writeln!(
                out,
                "  state time: ready={} running={} blocked={} terminated={}",
                m.state_time[0], m.state_time[1], m.state_time[2], m.state_time[3]
            );
            match m.mean_response_time() {
                Some(mean) => {
                    let _ = writeln!(out, "  mean response time: {mean:.2}");
                }
                None => {
                    let _ = writeln!(out, "  mean response time: N/A");
                }
            }
        }

        out
    }
}

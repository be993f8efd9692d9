// src/kernel/process/ready_queue.rs
//! The set of pids waiting for CPU time, either FIFO or priority-ordered.

use std::collections::VecDeque;

use crate::config::SchedulerKind;
use crate::kernel::core::types::ProcessId;
use crate::kernel::process::{ProcessState, ProcessTable};

/// A pid can sit in the ready queue after it has already been terminated or
/// rescheduled elsewhere (the original never removes queue entries eagerly);
/// every pop skips entries that no longer name a live `Ready` process.
#[derive(Debug, Clone)]
pub enum ReadyQueue {
    Fifo(VecDeque<ProcessId>),
    /// Unordered set scanned for the minimum-`priority` live `Ready` pid.
    PriorityScan(Vec<ProcessId>),
}

impl ReadyQueue {
    #[must_use]
    pub fn new(kind: SchedulerKind) -> Self {
        match kind {
            SchedulerKind::RoundRobin => ReadyQueue::Fifo(VecDeque::new()),
            SchedulerKind::Priority => ReadyQueue::PriorityScan(Vec::new()),
        }
    }

    pub fn enqueue(&mut self, pid: ProcessId) {
        match self {
            ReadyQueue::Fifo(queue) => queue.push_back(pid),
            ReadyQueue::PriorityScan(set) => set.push(pid),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            ReadyQueue::Fifo(queue) => queue.is_empty(),
            ReadyQueue::PriorityScan(set) => set.is_empty(),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = ProcessId> + '_> {
        match self {
            ReadyQueue::Fifo(queue) => Box::new(queue.iter().copied()),
            ReadyQueue::PriorityScan(set) => Box::new(set.iter().copied()),
        }
    }

    /// Remove and return the next pid to run, skipping any entry that no
    /// longer names a live, `Ready` process.
    pub fn pop_next(&mut self, table: &ProcessTable) -> Option<ProcessId> {
        match self {
            ReadyQueue::Fifo(queue) => loop {
                let pid = queue.pop_front()?;
                if is_ready(table, pid) {
                    return Some(pid);
                }
            },
            ReadyQueue::PriorityScan(set) => {
                set.retain(|pid| is_ready(table, *pid));
                let (idx, _) = set
                    .iter()
                    .enumerate()
                    .filter_map(|(i, pid)| table.get(*pid).map(|pcb| (i, pcb.priority)))
                    .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;
                Some(set.remove(idx))
            }
        }
    }
}

fn is_ready(table: &ProcessTable, pid: ProcessId) -> bool {
    matches!(table.get(pid).map(|pcb| pcb.state), Some(ProcessState::Ready))
}

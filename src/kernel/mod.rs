// src/kernel/mod.rs
//! The kernel itself: process table, scheduler, memory manager and the
//! trap entry point that ties them together.
//!
//! [`Kernel::handle_trap`] is the single way into this crate at runtime,
//! mirroring `so_trata_interrupcao`'s role as "the only way into the SO
//! after initialization".

pub mod core;
pub mod irq;
pub mod loader;
pub mod metrics;
pub mod mm;
pub mod pending_io;
pub mod process;
pub mod scheduler;
pub mod syscall;

use log::{info, warn};

use crate::config::KernelConfig;
use crate::kernel::core::traits::{Cpu, CpuMode, IoController, Irq, Mmu, SaveSlot};
use crate::kernel::core::{DeviceId, FrameId, KernelResult, ProcessId};
use crate::kernel::loader::ProgramLoader;
use crate::kernel::metrics::Metrics;
use crate::kernel::mm::{FrameTable, SwapArea};
use crate::kernel::process::{Pcb, ProcessMetrics, ProcessState, ProcessTable};
use crate::kernel::scheduler::Scheduler;

/// What the trap handler should do once [`Kernel::handle_trap`] returns:
/// whether a process context was dispatched, or the system is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A process's saved context was written back to the CPU; it should resume.
    Resume(ProcessId),
    /// No process is ready; the CPU should halt until the next interrupt.
    Idle,
}

pub struct Kernel {
    config: KernelConfig,
    cpu: Box<dyn Cpu>,
    mmu: Box<dyn Mmu>,
    io: Box<dyn IoController>,
    loader: Box<dyn ProgramLoader>,
    table: ProcessTable,
    scheduler: Scheduler,
    frames: FrameTable,
    swap: SwapArea,
    metrics: Metrics,
    terminal_owner: Vec<Option<ProcessId>>,
    internal_error: bool,
}

impl Kernel {
    #[must_use]
    pub fn new(
        config: KernelConfig,
        cpu: Box<dyn Cpu>,
        mmu: Box<dyn Mmu>,
        io: Box<dyn IoController>,
        loader: Box<dyn ProgramLoader>,
    ) -> Self {
        let frames = FrameTable::new(
            crate::constants::reserved_frame_count() + config.frame_count,
            crate::constants::reserved_frame_count(),
        );
        Self {
            table: ProcessTable::new(config.max_processes),
            scheduler: Scheduler::new(config.scheduler_kind, config.quantum),
            frames,
            swap: SwapArea::new(config.swap_capacity_pages * config.page_size as usize),
            metrics: Metrics::new(0),
            terminal_owner: vec![None; config.terminal_count],
            config,
            cpu,
            mmu,
            io,
            loader,
            internal_error: false,
        }
    }

    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[must_use]
    pub fn has_internal_error(&self) -> bool {
        self.internal_error
    }

    fn now(&mut self) -> KernelResult<i64> {
        match self.io.read(DeviceId::clock_instructions()) {
            Ok(value) => Ok(i64::from(value)),
            Err(e) => {
                self.internal_error = true;
                Err(e.into())
            }
        }
    }

    /// Create the initial process (`so_trata_reset`): arm the clock, load
    /// the init program, and make it the running process.
    pub fn reset(&mut self, init_program_name: &str) -> KernelResult<()> {
        info!(
            "booting {} build for {} (commit {})",
            env!("BUILD_PROFILE"),
            env!("BUILD_TARGET"),
            option_env!("BUILD_COMMIT").unwrap_or("unknown")
        );
        self.cpu.reset(crate::constants::TRAP_HANDLER_ENTRY);
        if let Err(e) = self.io.write(DeviceId::clock_timer(), self.config.clock_interval) {
            self.internal_error = true;
            return Err(e.into());
        }

        let image = self.loader.load(init_program_name)?;
        let pid = self.table.alloc_pid();
        let base = self.swap.append(&image.words)?;

        let mut pcb = Pcb::new(
            pid,
            DeviceId::terminal_keyboard(0),
            DeviceId::terminal_screen(0),
            0,
            base,
            self.config.quantum,
            0,
        );
        pcb.context.pc = image.entry as i32;
        self.table.insert(pcb)?;
        self.terminal_owner[0] = Some(pid);
        self.table.set_current(Some(pid));
        if let Some(pcb) = self.table.get_mut(pid) {
            self.metrics.transition(pcb, ProcessState::Running, 0);
        }
        self.metrics.record_process_created();
        self.dispatch_context(Some(pid))?;
        info!("reset complete, pid {pid} dispatched as init");
        Ok(())
    }

    /// The only entry point after [`Kernel::reset`]: update accounting,
    /// save the interrupted context, dispatch the interrupt, resolve
    /// pending I/O, reschedule, and load the chosen process's context.
    pub fn handle_trap(&mut self, irq: Irq) -> KernelResult<DispatchOutcome> {
        let now = self.now()?;
        self.metrics.update_times(&mut self.table, now);
        self.save_cpu_context()?;
        self.metrics.record_irq(irq);

        irq::dispatch(self, irq, now)?;
        pending_io::resolve(self, now)?;

        let picked = self.scheduler.schedule(&mut self.table, &mut self.frames, &mut self.metrics, now);
        self.dispatch_context(picked)?;

        Ok(match picked {
            Some(pid) => DispatchOutcome::Resume(pid),
            None => DispatchOutcome::Idle,
        })
    }

    /// Copy the saved registers out of the fixed save slots into the
    /// interrupted process's PCB (`so_salva_estado_da_cpu`).
    fn save_cpu_context(&mut self) -> KernelResult<()> {
        let Some(pid) = self.table.current_pid() else { return Ok(()) };
        let pc = self.cpu.read_save_slot(SaveSlot::Pc)?;
        let reg_a = self.cpu.read_save_slot(SaveSlot::A)?;
        let reg_x = self.cpu.read_save_slot(SaveSlot::X)?;
        let err = self.cpu.read_save_slot(SaveSlot::Err)?;
        let complement = self.cpu.read_save_slot(SaveSlot::Complement)?;

        if let Some(pcb) = self.table.get_mut(pid) {
            pcb.context.pc = pc;
            pcb.context.reg_a = reg_a;
            pcb.context.reg_x = reg_x;
            pcb.context.err = err;
            pcb.context.complement = complement;
        }
        Ok(())
    }

    /// Write the chosen process's saved context back to the CPU and install
    /// its page table, or leave the CPU idle if nothing is ready.
    fn dispatch_context(&mut self, picked: Option<ProcessId>) -> KernelResult<()> {
        match picked {
            None => {
                self.mmu.set_page_table(None);
                Ok(())
            }
            Some(pid) => {
                let Some(pcb) = self.table.get(pid) else {
                    return Err(crate::kernel::core::result::ProcessError::NotFound(pid).into());
                };
                let ctx = pcb.context;
                self.cpu.write_save_slot(SaveSlot::Pc, ctx.pc)?;
                self.cpu.write_save_slot(SaveSlot::A, ctx.reg_a)?;
                self.cpu.write_save_slot(SaveSlot::X, ctx.reg_x)?;
                self.cpu.write_save_slot(SaveSlot::Err, ctx.err)?;
                self.cpu.write_save_slot(SaveSlot::Complement, ctx.complement)?;
                self.cpu.set_mode(CpuMode::User);
                self.mmu.set_page_table(Some(pid));
                Ok(())
            }
        }
    }

    fn free_terminal(&mut self, index: usize) {
        if let Some(slot) = self.terminal_owner.get_mut(index) {
            *slot = None;
        }
    }

    fn allocate_terminal(&mut self) -> Option<usize> {
        self.terminal_owner.iter().position(Option::is_none)
    }

    /// Mark `pid` terminated, release its terminal, and unblock anyone
    /// waiting on it via `ESPERA_PROC`. The PCB and its frames are reclaimed
    /// by the scheduler's next reap sweep (`so_acorda_processos_esperando`
    /// plus the cleanup loop in `so_escalona`).
    fn terminate(&mut self, pid: ProcessId, now: i64) {
        let terminal = self.table.get(pid).map(|pcb| pcb.terminal);
        if let Some(pcb) = self.table.get_mut(pid) {
            self.metrics.transition(pcb, ProcessState::Terminated, now);
        }
        if let Some(terminal) = terminal {
            self.free_terminal(terminal);
        }
        self.wake_waiters(pid, now);
        if self.table.current_pid() == Some(pid) {
            self.table.set_current(None);
        }
    }

    /// Unblock every process waiting (via `ESPERA_PROC`) on `pid`.
    fn wake_waiters(&mut self, pid: ProcessId, now: i64) {
        let waiters: Vec<ProcessId> = self
            .table
            .iter()
            .filter(|pcb| {
                matches!(pcb.state, ProcessState::Blocked(process::BlockReason::Exit(target)) if target == pid)
            })
            .map(|pcb| pcb.pid)
            .collect();
        for waiter in waiters {
            if let Some(pcb) = self.table.get_mut(waiter) {
                pcb.context.reg_a = 0;
            }
            self.scheduler.unblock(&mut self.table, &mut self.metrics, waiter, now);
            info!("pid {waiter} unblocked: pid {pid} it was waiting on has terminated");
        }
    }

    /// Render the shutdown report (`imprimir_dados`), forcing every still
    /// live process to `Terminated` first.
    pub fn shutdown_report(&mut self) -> KernelResult<String> {
        let now = self.now()?;
        self.metrics.force_terminate_all(&mut self.table, now);
        Ok(self.metrics.report(now))
    }

    fn mark_internal_error(&mut self, context: &'static str) {
        warn!("internal kernel error: {context}");
        self.internal_error = true;
    }

    // --- Introspection -----------------------------------------------
    //
    // A host monitor/shell (and this crate's own tests) needs to observe
    // kernel state without parsing the shutdown report. These are read-only
    // views over private state, never a way to mutate it.

    #[must_use]
    pub fn current_pid(&self) -> Option<ProcessId> {
        self.table.current_pid()
    }

    #[must_use]
    pub fn process_state(&self, pid: ProcessId) -> Option<ProcessState> {
        self.table.get(pid).map(|pcb| pcb.state)
    }

    #[must_use]
    pub fn process_metrics(&self, pid: ProcessId) -> Option<ProcessMetrics> {
        self.table.get(pid).map(|pcb| pcb.metrics)
    }

    #[must_use]
    pub fn process_register_a(&self, pid: ProcessId) -> Option<i32> {
        self.table.get(pid).map(|pcb| pcb.context.reg_a)
    }

    #[must_use]
    pub fn frame_table(&self) -> &FrameTable {
        &self.frames
    }

    #[must_use]
    pub fn translate(&self, pid: ProcessId, virtual_page: usize) -> Option<FrameId> {
        self.table.get(pid).and_then(|pcb| pcb.page_table.translate(virtual_page))
    }

    #[must_use]
    pub fn ready_pids(&self) -> Vec<ProcessId> {
        self.scheduler.ready_pids()
    }

    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

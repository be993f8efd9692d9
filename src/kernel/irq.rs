// src/kernel/irq.rs
//! Interrupt dispatch: routes a trap to its handler.
//!
//! Grounded in `so_trata_irq` and its four handlers
//! (`so_trata_irq_chamada_sistema`, `so_trata_irq_err_cpu`,
//! `so_trata_irq_relogio`; reset is handled by [`crate::kernel::Kernel::reset`]
//! directly, since it only ever fires once, before the trap loop starts).

use log::{info, warn};

use crate::kernel::core::result::{KernelError, MemoryError};
use crate::kernel::core::traits::Irq;
use crate::kernel::core::{DeviceId, KernelResult};
use crate::kernel::mm::page_fault::handle_page_fault;
use crate::kernel::syscall;
use crate::kernel::Kernel;

/// CPU error codes the kernel reacts to differently (`err_t`). Any other
/// value terminates the faulting process, matching the original's
/// catch-all branch.
const ERR_PAGE_ABSENT: i32 = 1;

pub fn dispatch(kernel: &mut Kernel, irq: Irq, now: i64) -> KernelResult<()> {
    match irq {
        Irq::Reset => {
            warn!("reset IRQ delivered after startup; ignoring");
            Ok(())
        }
        Irq::SystemCall => {
            let Some(pid) = kernel.table.current_pid() else { return Ok(()) };
            syscall::dispatch(kernel, pid, now)
        }
        Irq::CpuError => handle_cpu_error(kernel, now),
        Irq::Clock => {
            if let Err(e) = kernel.io.write(DeviceId::clock_interrupt(), 0) {
                kernel.mark_internal_error("failed to clear the clock interrupt flag");
                return Err(e.into());
            }
            if let Err(e) = kernel.io.write(DeviceId::clock_timer(), kernel.config.clock_interval) {
                kernel.mark_internal_error("failed to re-arm the clock timer");
                return Err(e.into());
            }
            kernel.scheduler.on_clock_tick(&mut kernel.table, &mut kernel.metrics, now);
            Ok(())
        }
    }
}

fn handle_cpu_error(kernel: &mut Kernel, now: i64) -> KernelResult<()> {
    let Some(pid) = kernel.table.current_pid() else { return Ok(()) };
    let Some((err, complement)) = kernel.table.get(pid).map(|pcb| (pcb.context.err, pcb.context.complement)) else {
        return Ok(());
    };

    if err == ERR_PAGE_ABSENT {
        info!("pid {pid} page fault at {complement:#x}");
        let page_size = kernel.config.page_size;
        let result = {
            let table = &mut kernel.table;
            let frames = &mut kernel.frames;
            let swap = &kernel.swap;
            let mmu = kernel.mmu.as_mut();
            handle_page_fault(table, pid, frames, swap, mmu, complement as u32, page_size, now)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("pid {pid} page fault unrecoverable: {e}");
                match e {
                    KernelError::Memory(MemoryError::NoFreeFrame) => {
                        kernel.terminate(pid, now);
                        Ok(())
                    }
                    other => Err(other),
                }
            }
        }
    } else {
        warn!("pid {pid} cpu error code {err}, terminating");
        kernel.terminate(pid, now);
        Ok(())
    }
}

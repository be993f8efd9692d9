// src/kernel/syscall/mod.rs
//! System call dispatch: `LE`, `ESCR`, `CRIA_PROC`, `MATA_PROC`, `ESPERA_PROC`.
//!
//! Grounded in `so_trata_irq_chamada_sistema` and its five `so_chamada_*`
//! handlers. The calling convention: the syscall id is read from the
//! current process's saved `A` register, and the result is written back to
//! that same register.

use log::info;

use crate::constants::syscall_id;
use crate::kernel::core::result::{KernelError, ProcessError};
use crate::kernel::core::traits::CpuMode;
use crate::kernel::core::{DeviceId, KernelResult, ProcessId};
use crate::kernel::loader::ProgramImage;
use crate::kernel::process::{BlockReason, Pcb, ProcessState};
use crate::kernel::Kernel;

/// Read a syscall's argument for `CRIA_PROC`: a NUL-terminated program name
/// living in the calling process's own virtual memory, read word-by-word
/// through the MMU (`so_copia_str_do_processo`).
const MAX_PROGRAM_NAME_LEN: usize = 100;

pub fn dispatch(kernel: &mut Kernel, pid: ProcessId, now: i64) -> KernelResult<()> {
    let Some(call_id) = kernel.table.get(pid).map(|pcb| pcb.context.reg_a) else {
        return Ok(());
    };
    info!("pid {pid} system call {call_id}");
    #[cfg(feature = "syscall_trace")]
    if let Some(pcb) = kernel.table.get(pid) {
        log::trace!("pid {pid} regs: a={} x={} pc={}", pcb.context.reg_a, pcb.context.reg_x, pcb.context.pc);
    }

    match call_id {
        syscall_id::LE => handle_le(kernel, pid, now),
        syscall_id::ESCR => handle_escr(kernel, pid, now),
        syscall_id::CRIA_PROC => handle_cria_proc(kernel, pid, now),
        syscall_id::MATA_PROC => handle_mata_proc(kernel, pid, now),
        syscall_id::ESPERA_PROC => handle_espera_proc(kernel, pid, now),
        other => {
            set_reg_a(kernel, pid, -1);
            kernel.terminate(pid, now);
            Err(KernelError::UnknownSyscall(other))
        }
    }
}

fn set_reg_a(kernel: &mut Kernel, pid: ProcessId, value: i32) {
    if let Some(pcb) = kernel.table.get_mut(pid) {
        pcb.context.reg_a = value;
    }
}

fn handle_le(kernel: &mut Kernel, pid: ProcessId, now: i64) -> KernelResult<()> {
    let Some(input) = kernel.table.get(pid).map(|pcb| pcb.input_device) else {
        return Ok(());
    };
    let ready = input.ready_companion();

    match kernel.io.read(ready) {
        Err(e) => {
            set_reg_a(kernel, pid, -1);
            kernel.mark_internal_error("device-ready query failed in LE");
            Err(e.into())
        }
        Ok(0) => {
            info!("pid {pid} blocked waiting for input on device {}", input.0);
            kernel
                .scheduler
                .block_current(&mut kernel.table, &mut kernel.metrics, pid, BlockReason::Device(input), now);
            Ok(())
        }
        Ok(_) => match kernel.io.read(input) {
            Ok(value) => {
                set_reg_a(kernel, pid, value);
                Ok(())
            }
            Err(e) => {
                set_reg_a(kernel, pid, -1);
                kernel.mark_internal_error("device read failed in LE");
                Err(e.into())
            }
        },
    }
}

fn handle_escr(kernel: &mut Kernel, pid: ProcessId, now: i64) -> KernelResult<()> {
    let Some((output, value)) = kernel.table.get(pid).map(|pcb| (pcb.output_device, pcb.context.reg_x)) else {
        return Ok(());
    };
    let ready = output.ready_companion();

    match kernel.io.read(ready) {
        Err(e) => {
            set_reg_a(kernel, pid, -1);
            kernel.mark_internal_error("device-ready query failed in ESCR");
            Err(e.into())
        }
        Ok(0) => {
            info!("pid {pid} blocked waiting for output on device {}", output.0);
            kernel
                .scheduler
                .block_current(&mut kernel.table, &mut kernel.metrics, pid, BlockReason::Device(output), now);
            Ok(())
        }
        Ok(_) => match kernel.io.write(output, value) {
            Ok(()) => {
                set_reg_a(kernel, pid, 0);
                Ok(())
            }
            Err(e) => {
                set_reg_a(kernel, pid, -1);
                kernel.mark_internal_error("device write failed in ESCR");
                Err(e.into())
            }
        },
    }
}

/// Read a NUL-terminated name, up to `MAX_PROGRAM_NAME_LEN` bytes, starting
/// at `addr` in the currently-installed page table.
fn read_program_name(kernel: &Kernel, addr: u32) -> Option<String> {
    let mut bytes = Vec::with_capacity(MAX_PROGRAM_NAME_LEN);
    for offset in 0..MAX_PROGRAM_NAME_LEN as u32 {
        let word = kernel.mmu.read(addr + offset, CpuMode::Supervisor).ok()?;
        if word == 0 {
            return String::from_utf8(bytes).ok();
        }
        bytes.push(word as u8);
    }
    None
}

fn handle_cria_proc(kernel: &mut Kernel, pid: ProcessId, now: i64) -> KernelResult<()> {
    let Some(name_addr) = kernel.table.get(pid).map(|pcb| pcb.context.reg_x as u32) else {
        return Ok(());
    };

    if !kernel.table.has_free_slot() {
        info!("CRIA_PROC: process table full");
        set_reg_a(kernel, pid, -1);
        return Ok(());
    }
    let Some(terminal) = kernel.allocate_terminal() else {
        info!("CRIA_PROC: no terminal available");
        set_reg_a(kernel, pid, -1);
        return Ok(());
    };
    let Some(name) = read_program_name(kernel, name_addr) else {
        set_reg_a(kernel, pid, -1);
        return Ok(());
    };

    let image: ProgramImage = match kernel.loader.load(&name) {
        Ok(image) => image,
        Err(_) => {
            info!("CRIA_PROC: failed to load program '{name}'");
            set_reg_a(kernel, pid, -1);
            return Ok(());
        }
    };

    let base = match kernel.swap.append(&image.words) {
        Ok(base) => base,
        Err(e) => {
            set_reg_a(kernel, pid, -1);
            return Err(e.into());
        }
    };

    let new_pid = kernel.table.alloc_pid();
    let mut new_pcb = Pcb::new(
        new_pid,
        DeviceId::terminal_keyboard(terminal),
        DeviceId::terminal_screen(terminal),
        terminal,
        base,
        kernel.config.quantum,
        now,
    );
    new_pcb.context.pc = image.entry as i32;
    kernel.table.insert(new_pcb).map_err(|_: ProcessError| KernelError::Internal("CRIA_PROC: slot reserved but insert failed"))?;
    kernel.terminal_owner[terminal] = Some(new_pid);
    kernel.scheduler.enqueue(new_pid);
    kernel.metrics.record_process_created();

    info!("pid {pid} created pid {new_pid} ('{name}') on terminal {terminal}");
    set_reg_a(kernel, pid, new_pid.get() as i32);
    Ok(())
}

fn handle_mata_proc(kernel: &mut Kernel, pid: ProcessId, now: i64) -> KernelResult<()> {
    let Some(arg) = kernel.table.get(pid).map(|pcb| pcb.context.reg_x) else {
        return Ok(());
    };
    let target = if arg == 0 { pid } else { ProcessId(arg as u32) };
    let killing_self = target == pid;

    if kernel.table.get(target).is_none() {
        // Target already gone (e.g. a second MATA_PROC(pid) racing a first
        // from another caller): success, not an error (§8 idempotence law).
        set_reg_a(kernel, pid, 0);
        return Ok(());
    }

    kernel.terminate(target, now);

    if !killing_self {
        set_reg_a(kernel, pid, 0);
    }
    // If the process killed itself its PCB is gone by the time this would
    // run; no value is ever written to its `A` register (§9 Design Notes).
    Ok(())
}

fn handle_espera_proc(kernel: &mut Kernel, pid: ProcessId, now: i64) -> KernelResult<()> {
    let Some(target_raw) = kernel.table.get(pid).map(|pcb| pcb.context.reg_x) else {
        return Ok(());
    };

    if target_raw <= 0 || ProcessId(target_raw as u32) == pid {
        set_reg_a(kernel, pid, -1);
        return Ok(());
    }
    let target = ProcessId(target_raw as u32);

    match kernel.table.get(target) {
        None => {
            set_reg_a(kernel, pid, 0);
        }
        Some(target_pcb) if target_pcb.state == ProcessState::Terminated => {
            set_reg_a(kernel, pid, 0);
        }
        Some(_) => {
            info!("pid {pid} waiting for pid {target} to terminate");
            kernel.scheduler.block_current(
                &mut kernel.table,
                &mut kernel.metrics,
                pid,
                BlockReason::Exit(target),
                now,
            );
        }
    }
    Ok(())
}

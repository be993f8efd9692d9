// src/kernel/pending_io.rs
//! Completes I/O for processes that blocked on a not-yet-ready device.
//!
//! Grounded in `so_trata_pendencias`: on every trap, scan every blocked
//! process and, for whichever device it's waiting on, check the matching
//! `*_ok` subdevice; if it has become ready, perform the deferred
//! read/write and unblock the process.

use log::info;

use crate::kernel::core::{KernelResult, ProcessId};
use crate::kernel::process::{BlockReason, ProcessState};
use crate::kernel::Kernel;

pub fn resolve(kernel: &mut Kernel, now: i64) -> KernelResult<()> {
    let blocked: Vec<(ProcessId, crate::kernel::core::DeviceId)> = kernel
        .table
        .iter()
        .filter_map(|pcb| match pcb.state {
            ProcessState::Blocked(BlockReason::Device(device)) => Some((pcb.pid, device)),
            _ => None,
        })
        .collect();

    for (pid, device) in blocked {
        let ready = device.ready_companion();
        let ready_now = match kernel.io.read(ready) {
            Ok(state) => state != 0,
            Err(_) => {
                kernel.mark_internal_error("pending-I/O readiness query failed");
                continue;
            }
        };
        if !ready_now {
            continue;
        }

        let completed = if device.subdevice_offset() == 0 {
            kernel.io.read(device).map(|value| (true, value))
        } else {
            let reg_x = kernel.table.get(pid).map_or(0, |pcb| pcb.context.reg_x);
            kernel.io.write(device, reg_x).map(|()| (false, 0))
        };

        match completed {
            Ok((is_read, value)) => {
                if let Some(pcb) = kernel.table.get_mut(pid) {
                    pcb.context.reg_a = if is_read { value } else { 0 };
                }
                info!("pid {pid} pending I/O on device {} completed", device.0);
                kernel.scheduler.unblock(&mut kernel.table, &mut kernel.metrics, pid, now);
            }
            Err(_) => {
                if let Some(pcb) = kernel.table.get_mut(pid) {
                    pcb.context.reg_a = -1;
                }
                kernel.mark_internal_error("pending I/O completion failed");
                kernel.scheduler.unblock(&mut kernel.table, &mut kernel.metrics, pid, now);
            }
        }
    }
    Ok(())
}

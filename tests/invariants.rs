//! Universally-quantified invariants, laws and boundary behaviors from
//! spec §8, driven the same way as `tests/scenarios.rs`.

mod support;

use support::{FakeCpu, FakeIoController, FakeMmu};

use so25b_kernel::config::SchedulerKind;
use so25b_kernel::constants::syscall_id;
use so25b_kernel::kernel::core::traits::SaveSlot;
use so25b_kernel::kernel::core::{DeviceId, Irq, ProcessId};
use so25b_kernel::kernel::loader::{ProgramImage, StaticProgramLoader};
use so25b_kernel::kernel::process::ProcessState;
use so25b_kernel::{Kernel, KernelConfig};

fn config(quantum: u32) -> KernelConfig {
    KernelConfig {
        scheduler_kind: SchedulerKind::RoundRobin,
        quantum,
        clock_interval: 50,
        max_processes: 4,
        terminal_count: 4,
        page_size: 4,
        frame_count: 64,
        swap_capacity_pages: 64,
    }
}

fn boot(cfg: KernelConfig, programs: &[(&str, ProgramImage)]) -> (Kernel, FakeCpu, FakeMmu, FakeIoController) {
    support::init_logging();
    let cpu = FakeCpu::new();
    let mmu = FakeMmu::new();
    let io = FakeIoController::new();
    let mut loader = StaticProgramLoader::new();
    for (name, image) in programs {
        loader = loader.with_program(*name, image.clone());
    }
    let mut kernel = Kernel::new(cfg, Box::new(cpu.clone()), Box::new(mmu.clone()), Box::new(io.clone()), Box::new(loader));
    kernel.reset("init.maq").unwrap();
    (kernel, cpu, mmu, io)
}

fn one_page_program() -> ProgramImage {
    ProgramImage::new(0, vec![0; 4])
}

/// Invariant 1: at most one PCB is Running, checked across the whole table.
fn at_most_one_running(kernel: &Kernel, pids: &[ProcessId]) {
    let running = pids.iter().filter(|&&pid| kernel.process_state(pid) == Some(ProcessState::Running)).count();
    assert!(running <= 1, "more than one process reported Running");
}

#[test]
fn invariant_at_most_one_running_process() {
    let (mut kernel, cpu, mmu, io) =
        boot(config(2), &[("init.maq", one_page_program()), ("second.maq", one_page_program())]);
    let init = ProcessId(1);
    let second = ProcessId(2);
    at_most_one_running(&kernel, &[init, second]);

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
    cpu.stage(SaveSlot::X, 100);
    mmu.seed_str(init, 100, "second.maq");
    kernel.handle_trap(Irq::SystemCall).unwrap();
    at_most_one_running(&kernel, &[init, second]);

    for tick in 1..=2 {
        io.set(DeviceId::clock_instructions(), 1 + tick);
        kernel.handle_trap(Irq::Clock).unwrap();
        at_most_one_running(&kernel, &[init, second]);
    }
}

/// Invariant 2: per-state-time counters for a live PCB sum to the elapsed
/// interval since its creation.
#[test]
fn invariant_state_time_sums_to_elapsed_interval() {
    let (mut kernel, cpu, mmu, io) =
        boot(config(3), &[("init.maq", one_page_program()), ("second.maq", one_page_program())]);
    let init = ProcessId(1);

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
    cpu.stage(SaveSlot::X, 100);
    mmu.seed_str(init, 100, "second.maq");
    kernel.handle_trap(Irq::SystemCall).unwrap();

    for tick in 1..=6 {
        io.set(DeviceId::clock_instructions(), 1 + tick);
        kernel.handle_trap(Irq::Clock).unwrap();
    }

    let m = kernel.process_metrics(init).unwrap();
    let elapsed = 7 - m.created_at;
    let sum: i64 = m.state_time.iter().sum();
    assert_eq!(sum, elapsed, "state-time counters must account for every tick since creation");
}

/// Invariant 3 and 4: every occupied, non-reserved frame maps back from
/// exactly the owner's page table, and reserved frames are never handed to
/// a user page. Exercises the S4-style two-fault path and reads `FrameTable`
/// and `translate` directly.
#[test]
fn invariant_frame_ownership_is_consistent_and_reserved_frames_stay_reserved() {
    let program = ProgramImage::new(0, vec![0; 12]);
    let (mut kernel, cpu, _mmu, io) = boot(config(10), &[("init.maq", program)]);
    let init = ProcessId(1);

    for (tick, complement) in [(1, 0u32), (2, 8)] {
        io.set(DeviceId::clock_instructions(), tick);
        cpu.stage(SaveSlot::Err, 1);
        cpu.stage(SaveSlot::Complement, complement as i32);
        kernel.handle_trap(Irq::CpuError).unwrap();
    }

    let frames = kernel.frame_table();
    for idx in 0..frames.len() {
        let frame = so25b_kernel::kernel::core::FrameId(idx);
        let entry = frames.get(frame).unwrap();
        if entry.reserved {
            assert_eq!(entry.owner_pid, None, "a reserved frame must never be assigned an owner");
            continue;
        }
        if let Some(owner) = entry.owner_pid {
            let owner_page = entry.owner_virtual_page.expect("occupied entry always records its virtual page");
            assert_eq!(
                kernel.translate(owner, owner_page),
                Some(frame),
                "frame table and the owner's page table must agree on the mapping"
            );
        }
    }
}

/// Invariant 5: every ready-queue pid names either a Ready PCB or nothing
/// (stale entries left behind by a process that blocked or died while
/// still queued are tolerated, never executed).
#[test]
fn invariant_ready_queue_entries_are_ready_or_absent() {
    let (mut kernel, cpu, mmu, io) =
        boot(config(1), &[("init.maq", one_page_program()), ("b.maq", one_page_program()), ("c.maq", one_page_program())]);
    let init = ProcessId(1);

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
    cpu.stage(SaveSlot::X, 100);
    mmu.seed_str(init, 100, "b.maq");
    kernel.handle_trap(Irq::SystemCall).unwrap();

    io.set(DeviceId::clock_instructions(), 2);
    cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
    cpu.stage(SaveSlot::X, 200);
    mmu.seed_str(init, 200, "c.maq");
    kernel.handle_trap(Irq::SystemCall).unwrap();

    io.set(DeviceId::clock_instructions(), 3);
    cpu.stage(SaveSlot::A, syscall_id::MATA_PROC);
    cpu.stage(SaveSlot::X, 0);
    kernel.handle_trap(Irq::SystemCall).unwrap();

    for pid in kernel.ready_pids() {
        let state = kernel.process_state(pid);
        assert!(
            matches!(state, Some(ProcessState::Ready) | None),
            "ready-queue entry {pid} named a PCB in state {state:?}"
        );
    }
}

/// Round-trip law: a byte written via ESCR, then pre-loaded into the
/// keyboard, comes back out of a subsequent LE unchanged.
#[test]
fn law_escr_then_le_round_trips_a_byte() {
    let (mut kernel, cpu, _mmu, io) = boot(config(10), &[("init.maq", one_page_program())]);

    io.set(DeviceId::terminal_screen_ready(0), 1);
    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::A, syscall_id::ESCR);
    cpu.stage(SaveSlot::X, 88);
    kernel.handle_trap(Irq::SystemCall).unwrap();
    assert_eq!(io.get(DeviceId::terminal_screen(0)), 88);

    io.set(DeviceId::terminal_keyboard_ready(0), 1);
    io.set(DeviceId::terminal_keyboard(0), io.get(DeviceId::terminal_screen(0)));
    io.set(DeviceId::clock_instructions(), 2);
    cpu.stage(SaveSlot::A, syscall_id::LE);
    kernel.handle_trap(Irq::SystemCall).unwrap();

    let init = ProcessId(1);
    assert_eq!(kernel.process_register_a(init), Some(88));
}

/// Idempotence law: a second MATA_PROC(pid) from a distinct caller, after
/// the target is already gone, still returns success.
#[test]
fn law_second_mata_proc_on_an_already_dead_pid_succeeds() {
    let (mut kernel, cpu, mmu, io) =
        boot(config(10), &[("init.maq", one_page_program()), ("b.maq", one_page_program()), ("c.maq", one_page_program())]);
    let init = ProcessId(1);
    let b = ProcessId(2);

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
    cpu.stage(SaveSlot::X, 100);
    mmu.seed_str(init, 100, "b.maq");
    kernel.handle_trap(Irq::SystemCall).unwrap();

    io.set(DeviceId::clock_instructions(), 2);
    cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
    cpu.stage(SaveSlot::X, 200);
    mmu.seed_str(init, 200, "c.maq");
    kernel.handle_trap(Irq::SystemCall).unwrap();

    io.set(DeviceId::clock_instructions(), 3);
    cpu.stage(SaveSlot::A, syscall_id::MATA_PROC);
    cpu.stage(SaveSlot::X, b.get() as i32);
    kernel.handle_trap(Irq::SystemCall).unwrap();
    assert_eq!(kernel.process_register_a(init), Some(0), "first kill of b succeeds");

    io.set(DeviceId::clock_instructions(), 4);
    cpu.stage(SaveSlot::A, syscall_id::MATA_PROC);
    cpu.stage(SaveSlot::X, b.get() as i32);
    kernel.handle_trap(Irq::SystemCall).unwrap();
    assert_eq!(kernel.process_register_a(init), Some(0), "second kill of the already-gone b still succeeds");
}

/// Wakeup law: when Q terminates, P (blocked waiting on it) is Ready with
/// regA=0 by P's next scheduling opportunity.
#[test]
fn law_wakeup_sets_regA_to_zero_and_marks_ready() {
    let (mut kernel, cpu, mmu, io) =
        boot(config(10), &[("init.maq", one_page_program()), ("b.maq", one_page_program())]);
    let init = ProcessId(1);
    let b = ProcessId(2);

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
    cpu.stage(SaveSlot::X, 100);
    mmu.seed_str(init, 100, "b.maq");
    kernel.handle_trap(Irq::SystemCall).unwrap();

    io.set(DeviceId::clock_instructions(), 2);
    cpu.stage(SaveSlot::A, syscall_id::ESPERA_PROC);
    cpu.stage(SaveSlot::X, b.get() as i32);
    kernel.handle_trap(Irq::SystemCall).unwrap();
    assert_eq!(kernel.current_pid(), Some(b));

    io.set(DeviceId::clock_instructions(), 3);
    cpu.stage(SaveSlot::A, syscall_id::MATA_PROC);
    cpu.stage(SaveSlot::X, 0);
    kernel.handle_trap(Irq::SystemCall).unwrap();

    assert_eq!(kernel.process_state(init), Some(ProcessState::Running));
    assert_eq!(kernel.process_register_a(init), Some(0));
}

/// Preemption-accounting law: metric 5 (total preemptions) equals the sum
/// of metric 7 (per-pid preemption counts) across every reaped process.
#[test]
fn law_total_preemptions_equals_sum_of_per_process_preemptions() {
    let (mut kernel, cpu, mmu, io) =
        boot(config(1), &[("init.maq", one_page_program()), ("second.maq", one_page_program())]);
    let init = ProcessId(1);
    let second = ProcessId(2);

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
    cpu.stage(SaveSlot::X, 100);
    mmu.seed_str(init, 100, "second.maq");
    kernel.handle_trap(Irq::SystemCall).unwrap();

    for tick in 1..=6 {
        io.set(DeviceId::clock_instructions(), 1 + tick);
        kernel.handle_trap(Irq::Clock).unwrap();
    }

    let per_process_sum = kernel.process_metrics(init).unwrap().preemptions + kernel.process_metrics(second).unwrap().preemptions;
    assert_eq!(kernel.metrics().total_preemptions, per_process_sum);
    assert!(kernel.metrics().total_preemptions > 0, "the loop above must have forced at least one preemption");
}

/// Boundary: a program whose size is an exact multiple of the page size
/// never faults into a short, zero-padded final page.
#[test]
fn boundary_program_size_is_exact_page_multiple() {
    let program = ProgramImage::new(0, vec![7; 8]); // two full 4-word pages
    let (mut kernel, cpu, _mmu, io) = boot(config(10), &[("init.maq", program)]);
    let init = ProcessId(1);

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::Err, 1);
    cpu.stage(SaveSlot::Complement, 4); // second page, fully populated
    kernel.handle_trap(Irq::CpuError).unwrap();

    assert!(kernel.translate(init, 1).is_some());
}

/// Boundary: faulting on page 0 (the very first instruction) is handled
/// the same way as any other page fault.
#[test]
fn boundary_fault_on_page_zero() {
    let (mut kernel, cpu, _mmu, io) = boot(config(10), &[("init.maq", one_page_program())]);
    let init = ProcessId(1);
    assert_eq!(kernel.translate(init, 0), None, "no page is mapped before the first fault");

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::Err, 1);
    cpu.stage(SaveSlot::Complement, 0);
    kernel.handle_trap(Irq::CpuError).unwrap();

    assert!(kernel.translate(init, 0).is_some());
}

/// Boundary: CRIA_PROC fails with -1 once every terminal is already
/// claimed, even though the process table still has a free slot.
#[test]
fn boundary_cria_proc_fails_when_terminals_are_exhausted() {
    let programs = [
        ("init.maq", one_page_program()),
        ("b.maq", one_page_program()),
        ("c.maq", one_page_program()),
        ("d.maq", one_page_program()),
    ];
    let cfg = KernelConfig { max_processes: 8, terminal_count: 4, ..config(10) };
    let (mut kernel, cpu, mmu, io) = boot(cfg, &programs);
    let init = ProcessId(1);

    // init already owns terminal 0; spawn three more to claim the rest.
    for (tick, (name, addr)) in [("b.maq", 100u32), ("c.maq", 200), ("d.maq", 300)].into_iter().enumerate() {
        io.set(DeviceId::clock_instructions(), tick as i32 + 1);
        cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
        cpu.stage(SaveSlot::X, addr as i32);
        mmu.seed_str(init, addr, name);
        kernel.handle_trap(Irq::SystemCall).unwrap();
        assert!(kernel.process_register_a(init).unwrap() > 0, "terminal should still be available for {name}");
    }

    io.set(DeviceId::clock_instructions(), 5);
    cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
    cpu.stage(SaveSlot::X, 400);
    mmu.seed_str(init, 400, "e.maq");
    kernel.handle_trap(Irq::SystemCall).unwrap();
    assert_eq!(kernel.process_register_a(init), Some(-1), "no terminal left for a fifth process");
}

/// Boundary: a second CPU-error fault at the same address, after the first
/// fault already mapped it, is spurious (§4.9) and is rejected as a kernel-
/// internal error rather than silently evicting/reassigning the frame.
#[test]
fn boundary_spurious_double_fault_on_an_already_mapped_page_is_rejected() {
    let (mut kernel, cpu, _mmu, io) = boot(config(10), &[("init.maq", one_page_program())]);
    let init = ProcessId(1);

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::Err, 1);
    cpu.stage(SaveSlot::Complement, 0);
    kernel.handle_trap(Irq::CpuError).unwrap();
    let frame = kernel.translate(init, 0).expect("page mapped after the first fault");

    io.set(DeviceId::clock_instructions(), 2);
    cpu.stage(SaveSlot::Err, 1);
    cpu.stage(SaveSlot::Complement, 0);
    let result = kernel.handle_trap(Irq::CpuError);

    assert!(result.is_err(), "a fault on an already-mapped page must not be treated as a normal page-in");
    assert_eq!(kernel.translate(init, 0), Some(frame), "the existing mapping must be left untouched");
}

/// Invariant: pids are monotonically assigned and never reused within a
/// run, even once a run creates and reaps more processes than the process
/// table has slots for.
#[test]
fn invariant_pids_are_never_reused_across_slot_reuse() {
    let cfg = KernelConfig { max_processes: 2, ..config(10) };
    let programs = [
        ("init.maq", one_page_program()),
        ("b.maq", one_page_program()),
        ("c.maq", one_page_program()),
        ("d.maq", one_page_program()),
    ];
    let (mut kernel, cpu, mmu, io) = boot(cfg, &programs);
    let init = ProcessId(1);
    let mut spawned = Vec::new();

    for (tick, (name, addr)) in [("b.maq", 100u32), ("c.maq", 200), ("d.maq", 300)].into_iter().enumerate() {
        io.set(DeviceId::clock_instructions(), tick as i32 + 1);
        cpu.stage(SaveSlot::A, syscall_id::CRIA_PROC);
        cpu.stage(SaveSlot::X, addr as i32);
        mmu.seed_str(init, addr, name);
        kernel.handle_trap(Irq::SystemCall).unwrap();
        let new_pid = ProcessId(kernel.process_register_a(init).unwrap() as u32);
        assert!(!spawned.contains(&new_pid), "pid {new_pid} was handed out twice");
        spawned.push(new_pid);

        io.set(DeviceId::clock_instructions(), tick as i32 + 10);
        cpu.stage(SaveSlot::A, syscall_id::MATA_PROC);
        cpu.stage(SaveSlot::X, new_pid.get() as i32);
        kernel.handle_trap(Irq::SystemCall).unwrap();
    }

    assert_eq!(spawned.len(), 3, "every spawn must have produced a usable pid");
    assert_eq!(spawned, vec![ProcessId(2), ProcessId(3), ProcessId(4)], "pids keep climbing even though only one extra slot ever exists at a time");
    for pid in spawned {
        let snapshot = kernel.metrics().snapshot(pid).expect("each reaped pid keeps its own history entry");
        assert_eq!(snapshot.pid, pid);
    }
}

/// Boundary: waiting on a pid that was never created returns success, same
/// as waiting on one that already terminated.
#[test]
fn boundary_espera_proc_on_a_never_created_pid_succeeds() {
    let (mut kernel, cpu, _mmu, io) = boot(config(10), &[("init.maq", one_page_program())]);
    let init = ProcessId(1);

    io.set(DeviceId::clock_instructions(), 1);
    cpu.stage(SaveSlot::A, syscall_id::ESPERA_PROC);
    cpu.stage(SaveSlot::X, 99);
    kernel.handle_trap(Irq::SystemCall).unwrap();

    assert_eq!(kernel.process_register_a(init), Some(0));
    assert_eq!(kernel.process_state(init), Some(ProcessState::Running), "init was never blocked");
}

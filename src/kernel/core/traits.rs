// src/kernel/core/traits.rs
//! Traits for the simulated hardware this kernel runs on top of.
//!
//! The CPU, the MMU's raw read/write path and the I/O controller are
//! external collaborators (see crate-level docs): this crate never models
//! their internals, only the shape a host simulator must expose. Tests
//! provide small in-memory fakes for these traits under `tests/support`.

use super::result::{DeviceError, KernelResult, MemoryError};

/// CPU execution privilege level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuMode {
    Supervisor,
    User,
}

/// One of the fixed simulated-memory slots the trap stub uses to hand
/// register state to the kernel (see `crate::constants::SAVE_SLOT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveSlot {
    Pc,
    A,
    X,
    Err,
    Complement,
}

impl SaveSlot {
    #[must_use]
    pub const fn address(self) -> u32 {
        match self {
            SaveSlot::Pc => crate::constants::SAVE_SLOT_PC,
            SaveSlot::A => crate::constants::SAVE_SLOT_A,
            SaveSlot::X => crate::constants::SAVE_SLOT_X,
            SaveSlot::Err => crate::constants::SAVE_SLOT_ERR,
            SaveSlot::Complement => crate::constants::SAVE_SLOT_COMPLEMENT,
        }
    }
}

/// Reason the CPU trapped into the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    Reset,
    SystemCall,
    CpuError,
    Clock,
}

/// The simulated CPU: register save slots, mode, and the entry point used
/// on reset. Driving the instruction loop itself is out of scope.
pub trait Cpu {
    fn reset(&mut self, entry: u32);
    fn read_save_slot(&self, slot: SaveSlot) -> KernelResult<i32>;
    fn write_save_slot(&mut self, slot: SaveSlot, value: i32) -> KernelResult<()>;
    fn set_mode(&mut self, mode: CpuMode);
}

/// The simulated MMU's raw read/write path. Translating a virtual address
/// is modeled by [`crate::kernel::mm::PageTable`] instead, since the page
/// table is process-owned kernel state (§3), not part of this external
/// component.
pub trait Mmu {
    /// Install the page table backing subsequent `read`/`write` calls.
    /// `None` means no process is current (e.g. right after a reset, before
    /// the init process is dispatched).
    fn set_page_table(&mut self, owner: Option<crate::kernel::core::types::ProcessId>);
    fn read(&self, virt: u32, mode: CpuMode) -> Result<i32, MemoryError>;
    fn write(&mut self, virt: u32, value: i32, mode: CpuMode) -> Result<(), MemoryError>;

    /// Materialize a physical frame's content. The page-fault handler calls
    /// this after copying the faulting page out of swap (in-scope); actually
    /// storing the bytes in the process's runtime image is this
    /// out-of-scope component's job, same as `read`/`write`.
    fn load_frame(&mut self, frame: crate::kernel::core::types::FrameId, words: &[i32]) -> Result<(), MemoryError>;
}

/// One of the four terminals' four subdevices, or one of the clock's three
/// registers (see `dispositivos.h`). Wraps the raw id rather than an enum so
/// the `dev_id % 4` read/write split from the syscall-level resolver reads
/// the same way here as in the assignment it is grounded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u32);

impl DeviceId {
    const TERMINAL_BASE: u32 = 0;
    const CLOCK_INSTRUCTIONS: u32 = (crate::constants::TERMINAL_COUNT as u32) * 4;
    const CLOCK_TIMER: u32 = Self::CLOCK_INSTRUCTIONS + 1;
    const CLOCK_INTERRUPT: u32 = Self::CLOCK_INSTRUCTIONS + 2;

    #[must_use]
    pub const fn terminal_keyboard(terminal: usize) -> Self {
        Self(Self::TERMINAL_BASE + (terminal as u32) * 4)
    }

    #[must_use]
    pub const fn terminal_keyboard_ready(terminal: usize) -> Self {
        Self(Self::TERMINAL_BASE + (terminal as u32) * 4 + 1)
    }

    #[must_use]
    pub const fn terminal_screen(terminal: usize) -> Self {
        Self(Self::TERMINAL_BASE + (terminal as u32) * 4 + 2)
    }

    #[must_use]
    pub const fn terminal_screen_ready(terminal: usize) -> Self {
        Self(Self::TERMINAL_BASE + (terminal as u32) * 4 + 3)
    }

    #[must_use]
    pub const fn clock_instructions() -> Self {
        Self(Self::CLOCK_INSTRUCTIONS)
    }

    #[must_use]
    pub const fn clock_timer() -> Self {
        Self(Self::CLOCK_TIMER)
    }

    #[must_use]
    pub const fn clock_interrupt() -> Self {
        Self(Self::CLOCK_INTERRUPT)
    }

    /// Is this one of the four per-terminal subdevices?
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.0 < Self::CLOCK_INSTRUCTIONS
    }

    #[must_use]
    pub const fn terminal_index(self) -> usize {
        (self.0 / 4) as usize
    }

    /// `0` = read (keyboard), `2` = write (screen); the other two offsets
    /// are the `*_ready` companion subdevices, never targets of LE/ESCR.
    #[must_use]
    pub const fn subdevice_offset(self) -> u32 {
        self.0 % 4
    }

    /// The `_ready`/`_ok` companion subdevice the pending-I/O resolver polls.
    #[must_use]
    pub const fn ready_companion(self) -> Self {
        Self(self.0 + 1)
    }
}

/// The simulated I/O controller: the real-time clock and four character
/// terminals. Device drivers and rendering live outside this crate.
pub trait IoController {
    fn read(&mut self, device: DeviceId) -> Result<i32, DeviceError>;
    fn write(&mut self, device: DeviceId, value: i32) -> Result<(), DeviceError>;
}

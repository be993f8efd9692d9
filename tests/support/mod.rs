//! Fake `Cpu`/`Mmu`/`IoController` implementations for end-to-end tests.
//!
//! These stand in for the hardware this kernel is never supposed to touch
//! directly (see the crate's module docs): a flat per-process memory space
//! for the MMU, a map of device ids to values for the I/O controller, and a
//! handful of named save slots for the CPU.
//!
//! Each fake wraps its state in `Rc<RefCell<_>>` so a test can keep a cheap
//! handle to stage inputs (save slots, device values, process memory) after
//! the boxed trait object has been moved into the `Kernel`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Once;

use so25b_kernel::kernel::core::result::{DeviceError, MemoryError};
use so25b_kernel::kernel::core::traits::{Cpu, CpuMode, IoController, Mmu, SaveSlot};
use so25b_kernel::kernel::core::{DeviceId, FrameId, KernelResult, ProcessId};

static LOG_INIT: Once = Once::new();

/// Initialize `env_logger` once per test binary, so `RUST_LOG=trace cargo
/// test -- --nocapture` surfaces the kernel's `log::info!`/`log::warn!`
/// calls (and `syscall_trace`'s `log::trace!`, if that feature is enabled).
pub fn init_logging() {
    LOG_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

struct CpuState {
    slots: HashMap<SaveSlot, i32>,
    mode: CpuMode,
    entry: u32,
}

#[derive(Clone)]
pub struct FakeCpu(Rc<RefCell<CpuState>>);

impl FakeCpu {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(CpuState { slots: HashMap::new(), mode: CpuMode::Supervisor, entry: 0 })))
    }

    /// Stage a save-slot value as if the trap stub had just written it,
    /// before calling `Kernel::handle_trap`.
    pub fn stage(&self, slot: SaveSlot, value: i32) {
        self.0.borrow_mut().slots.insert(slot, value);
    }

    pub fn slot(&self, slot: SaveSlot) -> i32 {
        *self.0.borrow().slots.get(&slot).unwrap_or(&0)
    }

    pub fn mode(&self) -> CpuMode {
        self.0.borrow().mode
    }

    pub fn entry(&self) -> u32 {
        self.0.borrow().entry
    }
}

impl Cpu for FakeCpu {
    fn reset(&mut self, entry: u32) {
        let mut state = self.0.borrow_mut();
        state.entry = entry;
        state.mode = CpuMode::Supervisor;
        state.slots.clear();
    }

    fn read_save_slot(&self, slot: SaveSlot) -> KernelResult<i32> {
        Ok(self.slot(slot))
    }

    fn write_save_slot(&mut self, slot: SaveSlot, value: i32) -> KernelResult<()> {
        self.stage(slot, value);
        Ok(())
    }

    fn set_mode(&mut self, mode: CpuMode) {
        self.0.borrow_mut().mode = mode;
    }
}

/// A flat per-process address space, keyed by whichever page table is
/// currently installed. `load_frame` is a no-op: this fake never needs to
/// materialize physical frame content to answer a `read`/`write`.
#[derive(Default)]
struct MmuState {
    current: Option<ProcessId>,
    memory: HashMap<ProcessId, HashMap<u32, i32>>,
}

#[derive(Clone, Default)]
pub struct FakeMmu(Rc<RefCell<MmuState>>);

impl FakeMmu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `pid`'s virtual memory at `addr`, e.g. to stage a program-name
    /// argument for CRIA_PROC before issuing the syscall.
    pub fn seed(&self, pid: ProcessId, addr: u32, value: i32) {
        self.0.borrow_mut().memory.entry(pid).or_default().insert(addr, value);
    }

    /// Seed a NUL-terminated ASCII string starting at `addr`.
    pub fn seed_str(&self, pid: ProcessId, addr: u32, text: &str) {
        for (offset, byte) in text.bytes().enumerate() {
            self.seed(pid, addr + offset as u32, i32::from(byte));
        }
        self.seed(pid, addr + text.len() as u32, 0);
    }
}

impl Mmu for FakeMmu {
    fn set_page_table(&mut self, owner: Option<ProcessId>) {
        self.0.borrow_mut().current = owner;
    }

    fn read(&self, virt: u32, _mode: CpuMode) -> Result<i32, MemoryError> {
        let state = self.0.borrow();
        let pid = state.current.ok_or(MemoryError::InvalidAddress(virt))?;
        Ok(state.memory.get(&pid).and_then(|m| m.get(&virt)).copied().unwrap_or(0))
    }

    fn write(&mut self, virt: u32, value: i32, _mode: CpuMode) -> Result<(), MemoryError> {
        let mut state = self.0.borrow_mut();
        let pid = state.current.ok_or(MemoryError::InvalidAddress(virt))?;
        state.memory.entry(pid).or_default().insert(virt, value);
        Ok(())
    }

    fn load_frame(&mut self, _frame: FrameId, _words: &[i32]) -> Result<(), MemoryError> {
        Ok(())
    }
}

/// Every device the I/O controller exposes, keyed by its raw id.
#[derive(Clone, Default)]
pub struct FakeIoController(Rc<RefCell<HashMap<u32, i32>>>);

impl FakeIoController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, device: DeviceId, value: i32) {
        self.0.borrow_mut().insert(device.0, value);
    }

    pub fn get(&self, device: DeviceId) -> i32 {
        *self.0.borrow().get(&device.0).unwrap_or(&0)
    }
}

impl IoController for FakeIoController {
    fn read(&mut self, device: DeviceId) -> Result<i32, DeviceError> {
        Ok(self.get(device))
    }

    fn write(&mut self, device: DeviceId, value: i32) -> Result<(), DeviceError> {
        self.set(device, value);
        Ok(())
    }
}

//! In-memory collaborators
//!
//! Stand-ins for the emulator-provided memory bus and key register, used by
//! unit tests and by the headless server binary.

use std::sync::{Arc, RwLock};

use crate::memory::{InputPort, MemoryBus};

/// Flat RAM window starting at a base address. Out-of-window reads return 0.
pub struct RamBus {
    base: u32,
    data: Vec<u8>,
}

impl RamBus {
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    fn offset(&self, addr: u32) -> Option<usize> {
        let off = addr.checked_sub(self.base)? as usize;
        (off < self.data.len()).then_some(off)
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        if let Some(off) = self.offset(addr) {
            self.data[off] = value;
        }
    }

    pub fn write16(&mut self, addr: u32, value: u16) {
        self.write8(addr, value as u8);
        self.write8(addr + 1, (value >> 8) as u8);
    }

    pub fn write32(&mut self, addr: u32, value: u32) {
        self.write16(addr, value as u16);
        self.write16(addr + 2, (value >> 16) as u16);
    }
}

impl MemoryBus for RamBus {
    fn read8(&self, addr: u32) -> u8 {
        self.offset(addr).map(|off| self.data[off]).unwrap_or(0)
    }

    fn read16(&self, addr: u32) -> u16 {
        self.read8(addr) as u16 | (self.read8(addr + 1) as u16) << 8
    }
}

/// Clonable handle over a [`RamBus`], letting a test or host keep writing
/// into memory after the engine has taken its copy of the handle.
#[derive(Clone)]
pub struct SharedBus(Arc<RwLock<RamBus>>);

impl SharedBus {
    pub fn new(bus: RamBus) -> Self {
        Self(Arc::new(RwLock::new(bus)))
    }

    pub fn write8(&self, addr: u32, value: u8) {
        self.0.write().expect("bus lock poisoned").write8(addr, value);
    }

    pub fn write16(&self, addr: u32, value: u16) {
        self.0.write().expect("bus lock poisoned").write16(addr, value);
    }

    pub fn write32(&self, addr: u32, value: u32) {
        self.0.write().expect("bus lock poisoned").write32(addr, value);
    }
}

impl MemoryBus for SharedBus {
    fn read8(&self, addr: u32) -> u8 {
        self.0.read().expect("bus lock poisoned").read8(addr)
    }

    fn read16(&self, addr: u32) -> u16 {
        self.0.read().expect("bus lock poisoned").read16(addr)
    }
}

/// Key register that tracks only the held mask. For long-running hosts
/// where [`RecordingPort`]'s event log would grow without bound.
#[derive(Debug, Default)]
pub struct MaskPort {
    held: u16,
}

impl MaskPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently held key mask
    pub fn held(&self) -> u16 {
        self.held
    }
}

impl InputPort for MaskPort {
    fn press(&mut self, mask: u16) {
        self.held |= mask;
    }

    fn release(&mut self, mask: u16) {
        self.held &= !mask;
    }
}

/// One observed key register operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    Press(u16),
    Release(u16),
}

/// Key register that tracks the held mask and records every operation.
#[derive(Debug, Default)]
pub struct RecordingPort {
    held: u16,
    events: Vec<PortEvent>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently held key mask
    pub fn held(&self) -> u16 {
        self.held
    }

    /// Drain the recorded operations
    pub fn take_events(&mut self) -> Vec<PortEvent> {
        std::mem::take(&mut self.events)
    }
}

impl InputPort for RecordingPort {
    fn press(&mut self, mask: u16) {
        self.held |= mask;
        self.events.push(PortEvent::Press(mask));
    }

    fn release(&mut self, mask: u16) {
        self.held &= !mask;
        self.events.push(PortEvent::Release(mask));
    }
}

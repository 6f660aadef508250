//! Memory snapshot reader
//!
//! The bridge never owns emulated memory; the embedding frontend provides a
//! [`MemoryBus`] for reads and an [`InputPort`] for the key register. This
//! module decodes the handful of fixed-offset fields the movement controller
//! needs from the base addresses supplied by `bridge.controlInit`.
//!
//! Offsets follow the pokefirered RAM layout.

use serde::Serialize;

/// Read access to emulated memory. Implemented by the embedding emulator.
pub trait MemoryBus: Send {
    fn read8(&self, addr: u32) -> u8;
    fn read16(&self, addr: u32) -> u16;
}

/// Bitmask access to the emulated key register. Press/release are idempotent.
pub trait InputPort: Send {
    fn press(&mut self, mask: u16);
    fn release(&mut self, mask: u16);
}

/// Compose a 32-bit read from two halfword reads.
pub fn read32(bus: &dyn MemoryBus, addr: u32) -> u32 {
    let lo = bus.read16(addr) as u32;
    let hi = bus.read16(addr + 2) as u32;
    lo | (hi << 16)
}

// Player avatar block
const AVATAR_FLAGS: u32 = 0x0;
const AVATAR_RUNNING_STATE: u32 = 0x2;
const AVATAR_TILE_TRANSITION_STATE: u32 = 0x3;
const AVATAR_OBJECT_EVENT_ID: u32 = 0x5;
const AVATAR_PREVENT_STEP: u32 = 0x6;

/// `tile_transition_state` value while the avatar is crossing between tiles
pub const TILE_TRANSITION_IN_PROGRESS: u8 = 1;

// Object table: 0x24-byte entries
const OBJECT_EVENT_SIZE: u32 = 0x24;
const OBJECT_FLAGS: u32 = 0x0;
const OBJECT_CURRENT_X: u32 = 0x10;
const OBJECT_CURRENT_Y: u32 = 0x12;
const OBJECT_FACING: u32 = 0x18;

const OBJECT_FLAG_ACTIVE: u8 = 1 << 0;
const OBJECT_FLAG_SINGLE_MOVEMENT: u8 = 1 << 1;
const OBJECT_FLAG_HELD_MOVEMENT: u8 = 1 << 6;

// Engine-state block
const MAIN_CALLBACK2: u32 = 0x4;
const MAIN_IN_BATTLE_BYTE: u32 = 0x439;
const MAIN_IN_BATTLE_BIT: u8 = 0x02;

/// Base addresses supplied by `bridge.controlInit`, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlAddresses {
    /// Player avatar block
    pub avatar: u32,
    /// Object event table
    pub object_table: u32,
    /// Engine-state block (top-level callbacks, battle flag)
    pub engine_state: u32,
    /// Expected overworld top-level callback pointer
    pub overworld_callback: u32,
    /// Field-control lock byte
    pub field_lock: u32,
}

impl ControlAddresses {
    /// Build from the five-element init list, in wire order. Rejects lists
    /// of the wrong length and addresses outside the u32 range.
    pub fn from_list(addrs: &[i64]) -> Option<ControlAddresses> {
        match addrs {
            &[avatar, objects, main, callback, lock] => Some(ControlAddresses {
                avatar: u32::try_from(avatar).ok()?,
                object_table: u32::try_from(objects).ok()?,
                engine_state: u32::try_from(main).ok()?,
                overworld_callback: u32::try_from(callback).ok()?,
                field_lock: u32::try_from(lock).ok()?,
            }),
            _ => None,
        }
    }
}

/// Per-tick view of the player avatar block
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AvatarSnapshot {
    pub flags: u8,
    pub running_state: u8,
    pub tile_transition_state: u8,
    pub object_event_id: u8,
    pub prevent_step: bool,
}

impl AvatarSnapshot {
    /// True while the avatar is crossing between tiles
    pub fn in_tile_transition(&self) -> bool {
        self.tile_transition_state == TILE_TRANSITION_IN_PROGRESS
    }
}

/// Per-tick view of one object table entry
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ObjectSnapshot {
    pub x: u16,
    pub y: u16,
    pub facing: u8,
    pub active: bool,
    pub single_movement_active: bool,
    pub held_movement_active: bool,
}

/// Controllability gate inputs, kept individually for `controlStatus`
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ControlGate {
    pub callback_match: bool,
    pub field_lock: u8,
    pub in_battle: bool,
    pub prevent_step: bool,
}

impl ControlGate {
    /// True when every gate condition allows trusting overworld state
    pub fn controllable(&self) -> bool {
        self.callback_match && self.field_lock == 0 && !self.in_battle && !self.prevent_step
    }
}

/// Read the avatar block.
pub fn read_avatar(bus: &dyn MemoryBus, addrs: &ControlAddresses) -> AvatarSnapshot {
    AvatarSnapshot {
        flags: bus.read8(addrs.avatar + AVATAR_FLAGS),
        running_state: bus.read8(addrs.avatar + AVATAR_RUNNING_STATE),
        tile_transition_state: bus.read8(addrs.avatar + AVATAR_TILE_TRANSITION_STATE),
        object_event_id: bus.read8(addrs.avatar + AVATAR_OBJECT_EVENT_ID),
        prevent_step: bus.read8(addrs.avatar + AVATAR_PREVENT_STEP) != 0,
    }
}

/// Read one object table entry.
pub fn read_object(bus: &dyn MemoryBus, addrs: &ControlAddresses, index: u8) -> ObjectSnapshot {
    let base = addrs.object_table + index as u32 * OBJECT_EVENT_SIZE;
    let flags = bus.read8(base + OBJECT_FLAGS);
    ObjectSnapshot {
        x: bus.read16(base + OBJECT_CURRENT_X),
        y: bus.read16(base + OBJECT_CURRENT_Y),
        facing: bus.read8(base + OBJECT_FACING) & 0x0F,
        active: flags & OBJECT_FLAG_ACTIVE != 0,
        single_movement_active: flags & OBJECT_FLAG_SINGLE_MOVEMENT != 0,
        held_movement_active: flags & OBJECT_FLAG_HELD_MOVEMENT != 0,
    }
}

/// Evaluate the controllability gates.
pub fn read_gate(bus: &dyn MemoryBus, addrs: &ControlAddresses) -> ControlGate {
    let callback = read32(bus, addrs.engine_state + MAIN_CALLBACK2);
    // Thumb callbacks carry bit 0; compare with it masked off.
    let callback_match = (callback & !1) == (addrs.overworld_callback & !1);
    ControlGate {
        callback_match,
        field_lock: bus.read8(addrs.field_lock),
        in_battle: bus.read8(addrs.engine_state + MAIN_IN_BATTLE_BYTE) & MAIN_IN_BATTLE_BIT != 0,
        prevent_step: bus.read8(addrs.avatar + AVATAR_PREVENT_STEP) != 0,
    }
}

//! GBA key register bitmasks and button names

use crate::error::{BridgeError, Result};

/// Raw KEYINPUT bit values
pub mod key_mask {
    pub const A: u16 = 0x0001;
    pub const B: u16 = 0x0002;
    pub const SELECT: u16 = 0x0004;
    pub const START: u16 = 0x0008;
    pub const RIGHT: u16 = 0x0010;
    pub const LEFT: u16 = 0x0020;
    pub const UP: u16 = 0x0040;
    pub const DOWN: u16 = 0x0080;
    pub const R: u16 = 0x0100;
    pub const L: u16 = 0x0200;
}

/// A single GBA button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Right,
    Left,
    Up,
    Down,
    R,
    L,
}

impl Button {
    /// Key register bit for this button
    pub fn mask(self) -> u16 {
        match self {
            Button::A => key_mask::A,
            Button::B => key_mask::B,
            Button::Select => key_mask::SELECT,
            Button::Start => key_mask::START,
            Button::Right => key_mask::RIGHT,
            Button::Left => key_mask::LEFT,
            Button::Up => key_mask::UP,
            Button::Down => key_mask::DOWN,
            Button::R => key_mask::R,
            Button::L => key_mask::L,
        }
    }

    /// Wire name for this button
    pub fn name(self) -> &'static str {
        match self {
            Button::A => "a",
            Button::B => "b",
            Button::Select => "select",
            Button::Start => "start",
            Button::Right => "right",
            Button::Left => "left",
            Button::Up => "up",
            Button::Down => "down",
            Button::R => "r",
            Button::L => "l",
        }
    }

    /// Parse a button from its wire name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Button> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Button::A),
            "b" => Some(Button::B),
            "select" => Some(Button::Select),
            "start" => Some(Button::Start),
            "right" => Some(Button::Right),
            "left" => Some(Button::Left),
            "up" => Some(Button::Up),
            "down" => Some(Button::Down),
            "r" => Some(Button::R),
            "l" => Some(Button::L),
            _ => None,
        }
    }
}

/// Parse a `;`-separated key list (as sent by `bridge.pressButtons`) into a
/// combined bitmask.
pub fn keys_mask(keys: &str) -> Result<u16> {
    let mut mask = 0u16;
    for name in keys.split(';').filter(|part| !part.trim().is_empty()) {
        let button = Button::from_name(name)
            .ok_or_else(|| BridgeError::Dispatch(format!("unknown button: {}", name.trim())))?;
        mask |= button.mask();
    }
    if mask == 0 {
        return Err(BridgeError::Dispatch("empty key list".into()));
    }
    Ok(mask)
}

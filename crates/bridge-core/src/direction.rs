//! Overworld directions

use crate::buttons::Button;
use serde::Serialize;

/// A cardinal overworld direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    Up,
    Left,
    Right,
}

impl Direction {
    /// Parse a bare direction word ("down", "up", "left", "right")
    pub fn from_token(token: &str) -> Option<Direction> {
        match token {
            "down" => Some(Direction::Down),
            "up" => Some(Direction::Up),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    /// D-pad button for this direction
    pub fn button(self) -> Button {
        match self {
            Direction::Down => Button::Down,
            Direction::Up => Button::Up,
            Direction::Left => Button::Left,
            Direction::Right => Button::Right,
        }
    }

    /// Facing value stored in the object table (south 1, north 2, west 3, east 4)
    pub fn facing_value(self) -> u8 {
        match self {
            Direction::Down => 1,
            Direction::Up => 2,
            Direction::Left => 3,
            Direction::Right => 4,
        }
    }

    /// Wire name for this direction
    pub fn name(self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

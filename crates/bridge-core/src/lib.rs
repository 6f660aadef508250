//! # bridge-core
//!
//! Core types for the mGBA socket bridge protocol.
//!
//! This crate provides the pieces shared by the control engine and the
//! socket listener:
//! - GBA key register bitmasks and button names
//! - Overworld directions and their facing values
//! - Wire markers (`<|END|>`, `<|SUCCESS|>`, `<|ERROR|>`)
//! - The comma-separated command grammar and its bracket tokenizer
//! - Error types

pub mod buttons;
pub mod command;
pub mod direction;
pub mod error;
pub mod wire;

pub use buttons::{Button, keys_mask};
pub use command::{Argument, Command};
pub use direction::Direction;
pub use error::{BridgeError, Result};
pub use wire::{ERROR_MARKER, SUCCESS_MARKER, TERMINATOR, error_response};

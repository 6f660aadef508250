//! # bridge-server
//!
//! Socket listener serving the mGBA bridge text protocol.
//!
//! Wire format: text messages, comma-separated fields, terminated by
//! `<|END|>`. One framed response per message, ending with the same marker.
//! The listener shares a [`bridge_control::ControlEngine`] with the
//! embedding frontend, which advances it once per emulated frame.

pub mod listener;

pub use listener::{BridgeListener, ListenerConfig};

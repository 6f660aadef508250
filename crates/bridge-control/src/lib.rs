//! # bridge-control
//!
//! The emulator-side control engine for the mGBA socket bridge:
//! - Memory snapshot reader over the collaborator traits ([`memory`])
//! - Frame-keyed input scheduler ([`scheduler`])
//! - Overworld movement controller state machine ([`controller`])
//! - Command dispatcher and tick driver ([`engine`])
//! - In-memory collaborators for tests and headless runs ([`harness`])
//!
//! The engine is advanced by the embedding frontend calling
//! [`ControlEngine::tick`] once per emulated frame; the socket listener feeds
//! it framed messages through [`ControlEngine::dispatch`].

pub mod controller;
pub mod engine;
pub mod harness;
pub mod memory;
pub mod scheduler;

pub use controller::{ControlStatus, MovementController, QUEUE_CAPACITY};
pub use engine::ControlEngine;
pub use memory::{AvatarSnapshot, ControlAddresses, InputPort, MemoryBus, ObjectSnapshot};
pub use scheduler::InputScheduler;

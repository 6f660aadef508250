//! Command dispatcher and frame tick driver
//!
//! [`ControlEngine`] owns the input scheduler and movement controller plus
//! the collaborator handles (memory bus, key register). The socket listener
//! calls [`ControlEngine::dispatch`] once per framed message; the embedding
//! emulator calls [`ControlEngine::tick`] once per simulation frame.

use bridge_core::{
    Argument, BridgeError, Command, Result, SUCCESS_MARKER, error_response, keys_mask,
};
use tracing::{debug, warn};

use crate::controller::MovementController;
use crate::memory::{ControlAddresses, InputPort, MemoryBus, read32};
use crate::scheduler::InputScheduler;

/// Default hold duration for `bridge.pressButtons`, in frames
pub const DEFAULT_PRESS_FRAMES: u64 = 15;

/// Maximum `bridge.readRangeHex` length. Dispatch runs under the same lock
/// as the frame tick, so a range read must stay small enough to finish well
/// inside one frame.
pub const MAX_READ_RANGE_BYTES: u64 = 4096;

/// The emulator-side control engine.
pub struct ControlEngine {
    bus: Box<dyn MemoryBus>,
    port: Box<dyn InputPort>,
    scheduler: InputScheduler,
    controller: MovementController,
    frame: u64,
}

impl ControlEngine {
    pub fn new(bus: Box<dyn MemoryBus>, port: Box<dyn InputPort>) -> Self {
        Self {
            bus,
            port,
            scheduler: InputScheduler::new(),
            controller: MovementController::new(),
            frame: 0,
        }
    }

    /// Current frame tick
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advance one simulation frame: movement controller first, then the
    /// scheduler, so taps the controller schedules land the same tick.
    pub fn tick(&mut self) {
        self.frame += 1;
        self.controller.tick(
            self.frame,
            self.bus.as_ref(),
            self.port.as_mut(),
            &mut self.scheduler,
        );
        self.scheduler.tick(self.frame, self.port.as_mut());
    }

    /// Execute one framed message and produce the response body (terminator
    /// not included). Errors never escape: they become error responses.
    pub fn dispatch(&mut self, message: &str) -> String {
        match self.dispatch_inner(message) {
            Ok(body) => body,
            Err(err) => {
                warn!(%err, message, "command failed");
                error_response(&err.to_string())
            }
        }
    }

    fn dispatch_inner(&mut self, message: &str) -> Result<String> {
        let command = Command::parse(message)?;
        match command.name.as_str() {
            "bridge.pressButtons" => {
                let keys = text_arg(&command, 0)?;
                let duration = opt_frames_arg(&command, 1)?.unwrap_or(DEFAULT_PRESS_FRAMES);
                let mask = keys_mask(keys)?;
                self.scheduler.enqueue(mask, duration, self.frame);
                Ok(SUCCESS_MARKER.into())
            }
            "bridge.holdButton" => {
                let keys = text_arg(&command, 0)?;
                let duration = opt_frames_arg(&command, 1)?.unwrap_or(DEFAULT_PRESS_FRAMES);
                let mask = keys_mask(keys)?;
                self.scheduler.enqueue(mask, duration, self.frame);
                Ok(SUCCESS_MARKER.into())
            }
            "bridge.controlInit" => {
                let list = command
                    .args
                    .first()
                    .and_then(Argument::as_list)
                    .ok_or_else(|| {
                        BridgeError::Dispatch("controlInit expects a bracketed address list".into())
                    })?;
                let addrs = ControlAddresses::from_list(list).ok_or_else(|| {
                    BridgeError::Dispatch(format!(
                        "controlInit expects 5 unsigned 32-bit addresses, got {list:?}"
                    ))
                })?;
                self.controller.init(addrs);
                Ok("controlInit.ok".into())
            }
            "bridge.control" => {
                let text = text_arg(&command, 0)?;
                self.controller
                    .enqueue(text, &mut self.scheduler, self.frame)?;
                Ok("control.ok".into())
            }
            "bridge.controlStatus" => {
                let status = self.controller.status(self.bus.as_ref());
                Ok(serde_json::to_string(&status)?)
            }
            "bridge.read8" => {
                let addr = addr_arg(&command, 0)?;
                Ok(self.bus.read8(addr).to_string())
            }
            "bridge.read16" => {
                let addr = addr_arg(&command, 0)?;
                Ok(self.bus.read16(addr).to_string())
            }
            "bridge.read32" => {
                let addr = addr_arg(&command, 0)?;
                Ok(read32(self.bus.as_ref(), addr).to_string())
            }
            "bridge.readRangeHex" => {
                let addr = addr_arg(&command, 0)?;
                let length = opt_frames_arg(&command, 1)?
                    .ok_or_else(|| BridgeError::Dispatch("readRangeHex expects a length".into()))?;
                if length > MAX_READ_RANGE_BYTES {
                    return Err(BridgeError::Dispatch(format!(
                        "readRangeHex length {length} exceeds {MAX_READ_RANGE_BYTES}"
                    )));
                }
                let bytes: Vec<u8> = (0..length)
                    .map(|offset| self.bus.read8(addr.wrapping_add(offset as u32)))
                    .collect();
                Ok(hex::encode(bytes))
            }
            name => {
                // Unknown commands are logged, never failed.
                debug!(name, "ignoring unknown command");
                Ok(SUCCESS_MARKER.into())
            }
        }
    }
}

/// Required textual argument at `idx`.
fn text_arg<'a>(command: &'a Command, idx: usize) -> Result<&'a str> {
    command
        .args
        .get(idx)
        .and_then(Argument::as_text)
        .ok_or_else(|| {
            BridgeError::Dispatch(format!("{} expects a text argument {}", command.name, idx + 1))
        })
}

/// Optional non-negative frame count at `idx`.
fn opt_frames_arg(command: &Command, idx: usize) -> Result<Option<u64>> {
    match command.args.get(idx) {
        None => Ok(None),
        Some(arg) => {
            let value = arg.as_number().ok_or_else(|| {
                BridgeError::Dispatch(format!("{} expects a numeric argument {}", command.name, idx + 1))
            })?;
            u64::try_from(value).map(Some).map_err(|_| {
                BridgeError::Dispatch(format!("negative frame count: {value}"))
            })
        }
    }
}

/// Required address argument at `idx`.
fn addr_arg(command: &Command, idx: usize) -> Result<u32> {
    let value = command
        .args
        .get(idx)
        .and_then(Argument::as_number)
        .ok_or_else(|| {
            BridgeError::Dispatch(format!("{} expects an address argument", command.name))
        })?;
    u32::try_from(value)
        .map_err(|_| BridgeError::Dispatch(format!("address out of range: {value}")))
}

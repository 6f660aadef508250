//! mgba-bridge-server: headless bridge protocol server
//!
//! Serves the socket protocol against an in-memory RAM image, ticking the
//! engine at 60 frames per second. Useful for exercising clients without a
//! running emulator; real deployments embed the listener in the frontend and
//! drive ticks from its frame callback instead.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bridge_control::ControlEngine;
use bridge_control::harness::{MaskPort, RamBus};
use bridge_server::{BridgeListener, ListenerConfig};
use tokio::sync::Mutex;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// GBA EWRAM window
const RAM_BASE: u32 = 0x0200_0000;
const RAM_SIZE: usize = 256 * 1024;

const FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let config = if args.len() > 1 {
        ListenerConfig {
            port: args[1].parse()?,
            ..Default::default()
        }
    } else {
        ListenerConfig::default()
    };

    info!(port = config.port, "starting headless bridge server");

    let bus = RamBus::new(RAM_BASE, RAM_SIZE);
    let engine = ControlEngine::new(Box::new(bus), Box::new(MaskPort::new()));
    let listener = BridgeListener::new(engine, config);

    spawn_frame_ticker(listener.engine());

    listener.run().await?;
    Ok(())
}

/// Drive frame ticks the way an emulator frontend's frame callback would.
fn spawn_frame_ticker(engine: Arc<Mutex<ControlEngine>>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FRAME_INTERVAL);
        loop {
            interval.tick().await;
            engine.lock().await.tick();
        }
    });
}

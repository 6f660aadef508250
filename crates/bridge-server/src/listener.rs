//! TCP listener for the bridge text protocol
//!
//! Accepts any number of concurrent connections, frames byte streams on the
//! termination marker, and dispatches each message synchronously into the
//! shared control engine. Dispatch failures become error responses; only
//! transport errors drop a connection, and they never stop the listener.

use std::sync::Arc;

use bridge_control::ControlEngine;
use bridge_core::{BridgeError, Result, TERMINATOR};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind (default: 127.0.0.1)
    pub host: String,
    /// First port to try (default: 8888)
    pub port: u16,
    /// Successive ports to try when the port is occupied
    pub port_attempts: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8888,
            port_attempts: 9,
        }
    }
}

/// The socket listener, sharing one control engine across connections and
/// the embedding frontend's frame callback.
pub struct BridgeListener {
    engine: Arc<Mutex<ControlEngine>>,
    config: ListenerConfig,
}

impl BridgeListener {
    pub fn new(engine: ControlEngine, config: ListenerConfig) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            config,
        }
    }

    /// Handle to the shared engine, for the once-per-frame tick call
    /// (`blocking_lock().tick()` from a synchronous emulator callback).
    pub fn engine(&self) -> Arc<Mutex<ControlEngine>> {
        self.engine.clone()
    }

    /// Bind the listening socket, retrying successive ports while the
    /// configured one is occupied.
    pub async fn bind(&self) -> Result<TcpListener> {
        for attempt in 0..self.config.port_attempts.max(1) {
            let port = self.config.port.wrapping_add(attempt);
            match TcpListener::bind((self.config.host.as_str(), port)).await {
                Ok(listener) => {
                    info!(host = %self.config.host, port, "bridge listening");
                    return Ok(listener);
                }
                Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                    warn!(port, "port occupied, trying next");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(BridgeError::Io(format!(
            "no free port in {}..={}",
            self.config.port,
            self.config.port + self.config.port_attempts.saturating_sub(1)
        )))
    }

    /// Bind and serve until the process exits.
    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept loop over an already-bound socket.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    // Transient failures (ECONNABORTED, fd exhaustion) must
                    // not take the listener down with them.
                    warn!(%err, "accept failed");
                    continue;
                }
            };
            if let Err(err) = stream.set_nodelay(true) {
                debug!(%peer, %err, "failed to set TCP_NODELAY");
            }
            info!(%peer, "client connected");

            let engine = self.engine.clone();
            tokio::spawn(async move {
                match connection_task(stream, engine).await {
                    Ok(()) => info!(%peer, "client disconnected"),
                    Err(err) => warn!(%peer, %err, "connection dropped"),
                }
            });
        }
    }
}

/// Per-connection loop: accumulate bytes, split on the terminator, dispatch
/// each segment, write back one framed response per message.
async fn connection_task(mut stream: TcpStream, engine: Arc<Mutex<ControlEngine>>) -> Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = stream.read(&mut chunk).await.map_err(BridgeError::from)?;
        if read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);

        while let Some(idx) = find_terminator(&buffer) {
            let segment = String::from_utf8_lossy(&buffer[..idx]).into_owned();
            buffer.drain(..idx + TERMINATOR.len());

            let message = segment.trim_end();
            debug!(message, "dispatching");
            let response = engine.lock().await.dispatch(message);

            stream
                .write_all(response.as_bytes())
                .await
                .map_err(BridgeError::from)?;
            stream
                .write_all(TERMINATOR.as_bytes())
                .await
                .map_err(BridgeError::from)?;
            stream.flush().await.map_err(BridgeError::from)?;
        }
    }
}

/// Offset of the first terminator in the buffer, if complete.
fn find_terminator(buffer: &[u8]) -> Option<usize> {
    let marker = TERMINATOR.as_bytes();
    buffer
        .windows(marker.len())
        .position(|window| window == marker)
}

//! # AR.Drone Platform
//!
//! [`Platform`] implementation that drives an AR.Drone 2.0 over its UDP AT
//! command channel.
//!
//! Every directional command updates one axis of the held [`Pcmd`] state and
//! transmits the full state immediately, preceded by an `AT*REF` carrying the
//! current fly bit. The drone falls back to hovering when commands stop
//! arriving, which is why the control loops keep re-sending even zero speeds.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tracing::{debug, info};

use super::at::{encode_control_datagram, Pcmd};
use super::{MoveCommand, Platform};
use crate::error::{DroneDropError, Result};

/// Held command state shared by every send.
#[derive(Debug, Default)]
struct ControlState {
    pcmd: Pcmd,
    flying: bool,
}

/// AR.Drone connection handle
pub struct ArDrone {
    address: String,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    state: Mutex<ControlState>,
    seq: AtomicU32,
}

impl std::fmt::Debug for ArDrone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArDrone")
            .field("address", &self.address)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl ArDrone {
    /// Creates a disconnected handle for the drone at `address`
    /// (e.g. `192.168.1.1:5556`).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            socket: Mutex::new(None),
            state: Mutex::new(ControlState::default()),
            seq: AtomicU32::new(1),
        }
    }

    /// Drone command endpoint this handle connects to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Applies `command` to the held state.
    ///
    /// Returns the updated state to transmit.
    fn apply(&self, command: MoveCommand) -> (bool, Pcmd) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let pcmd = &mut state.pcmd;
        let v = command.speed() as f32;
        match command {
            MoveCommand::Forward(_) => pcmd.pitch = -v,
            MoveCommand::Backward(_) => pcmd.pitch = v,
            MoveCommand::Left(_) => pcmd.roll = -v,
            MoveCommand::Right(_) => pcmd.roll = v,
            MoveCommand::Up(_) => pcmd.gaz = v,
            MoveCommand::Down(_) => pcmd.gaz = -v,
            MoveCommand::Clockwise(_) => pcmd.yaw = v,
            MoveCommand::CounterClockwise(_) => pcmd.yaw = -v,
        }
        (state.flying, state.pcmd)
    }

    fn set_flying(&self, flying: bool) -> Pcmd {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.flying = flying;
        state.pcmd
    }

    fn current_socket(&self) -> Option<Arc<UdpSocket>> {
        self.socket
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn transmit(&self, flying: bool, pcmd: &Pcmd) -> Result<()> {
        let socket = self.current_socket().ok_or(DroneDropError::NotConnected)?;

        // REF and PCMD each consume a sequence number
        let seq = self.seq.fetch_add(2, Ordering::Relaxed);
        let datagram = encode_control_datagram(seq, flying, pcmd);

        socket.send(&datagram).await?;
        Ok(())
    }
}

#[async_trait]
impl Platform for ArDrone {
    async fn send(&self, command: MoveCommand) -> Result<()> {
        let (flying, pcmd) = self.apply(command);
        self.transmit(flying, &pcmd).await
    }

    async fn take_off(&self) -> Result<()> {
        info!("Taking off");
        let pcmd = self.set_flying(true);
        self.transmit(true, &pcmd).await
    }

    async fn land(&self) -> Result<()> {
        info!("Landing");
        let pcmd = self.set_flying(false);
        self.transmit(false, &pcmd).await
    }

    async fn connect(&self) -> Result<()> {
        let mut errors = Vec::new();

        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(e) => {
                errors.push(format!("bind failed: {}", e));
                return Err(DroneDropError::Connection(errors));
            }
        };

        if let Err(e) = socket.connect(&self.address).await {
            errors.push(format!("connect to {} failed: {}", self.address, e));
            return Err(DroneDropError::Connection(errors));
        }

        *self.socket.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(socket));
        info!("Connected to drone at {}", self.address);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let previous = self.socket.lock().unwrap_or_else(|e| e.into_inner()).take();
        if previous.is_some() {
            info!("Disconnected from drone at {}", self.address);
        } else {
            debug!("Disconnect requested while not connected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.socket
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

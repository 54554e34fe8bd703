//! # Serial Servo Module
//!
//! Drives the payload-release servo through a serial servo controller.
//!
//! This module handles:
//! - Opening the controller's serial port
//! - Encoding Mini SSC position frames
//! - Writing one frame per position command over a [`ServoLink`]

use async_trait::async_trait;
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use super::Actuator;
use crate::error::{DroneDropError, Result};

/// Mini SSC sync byte, starts every frame
pub const MINI_SSC_SYNC: u8 = 0xFF;

/// Highest position a Mini SSC frame can carry (0xFF is reserved for sync)
pub const MINI_SSC_MAX_POSITION: u8 = 0xFE;

/// Encode a Mini SSC "set position" frame
///
/// # Arguments
///
/// * `channel` - Servo channel on the controller
/// * `position` - Target position; 255 is sent as 254
///
/// # Examples
///
/// ```
/// use dronedrop::actuator::serial::encode_position_frame;
///
/// assert_eq!(encode_position_frame(0, 153), [0xFF, 0x00, 153]);
/// ```
pub fn encode_position_frame(channel: u8, position: u8) -> [u8; 3] {
    [
        MINI_SSC_SYNC,
        channel.min(MINI_SSC_MAX_POSITION),
        position.min(MINI_SSC_MAX_POSITION),
    ]
}

/// Mini SSC frame: sync, channel, position
pub type PositionFrame = [u8; 3];

/// Write side of a servo controller connection
#[async_trait]
pub trait ServoLink: Send {
    /// Hands one complete frame to the controller.
    async fn send_frame(&mut self, frame: PositionFrame) -> io::Result<()>;
}

#[async_trait]
impl ServoLink for SerialStream {
    async fn send_frame(&mut self, frame: PositionFrame) -> io::Result<()> {
        self.write_all(&frame).await?;
        self.flush().await
    }
}

/// Servo on a serial servo controller
pub struct SerialServo<P: ServoLink> {
    link: Mutex<P>,
    channel: u8,
    device_path: String,
}

impl<P: ServoLink> std::fmt::Debug for SerialServo<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialServo")
            .field("device_path", &self.device_path)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl SerialServo<SerialStream> {
    /// Open the servo controller at `path`
    ///
    /// # Errors
    ///
    /// Returns [`DroneDropError::Serial`] if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dronedrop::actuator::serial::SerialServo;
    ///
    /// let servo = SerialServo::open("/dev/ttyACM0", 9600, 0)?;
    /// println!("Servo controller at: {}", servo.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, baud_rate: u32, channel: u8) -> Result<Self> {
        debug!("Trying to open servo controller: {}", path);

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| DroneDropError::Serial(format!("Failed to open {}: {}", path, e)))?;

        info!("Opened servo controller at {} ({} baud, channel {})", path, baud_rate, channel);
        Ok(Self::with_link(port, path, channel))
    }
}

impl<P: ServoLink> SerialServo<P> {
    /// Drive the servo on `channel` through an already opened link.
    pub fn with_link(link: P, device_path: &str, channel: u8) -> Self {
        Self {
            link: Mutex::new(link),
            channel,
            device_path: device_path.to_string(),
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl<P: ServoLink> Actuator for SerialServo<P> {
    async fn move_to(&self, position: u8) -> Result<()> {
        if position > MINI_SSC_MAX_POSITION {
            warn!(
                "Servo position {} exceeds protocol range, sending {}",
                position, MINI_SSC_MAX_POSITION
            );
        }
        let frame = encode_position_frame(self.channel, position);

        self.link
            .lock()
            .await
            .send_frame(frame)
            .await
            .map_err(|e| DroneDropError::Serial(format!("Failed to send frame: {}", e)))?;

        debug!("Moved servo {} to {}", self.channel, position);
        Ok(())
    }
}

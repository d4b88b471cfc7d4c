//! # Serial Communication Module
//!
//! Handles the serial link to the flight controller.
//!
//! This module handles:
//! - Probing candidate device paths and opening the port (8N1, no flow control)
//! - Non-blocking byte availability checks and single-byte reads
//! - Frame writes
//! - Cloning the port into independent receive and transmit handles

mod transport;

pub use transport::Transport;

#[cfg(test)]
pub use transport::mocks;
#[cfg(test)]
pub use transport::MockTransport;

use std::io::{self, Read, Write};
use std::time::Duration;

use tokio_serial::SerialPort;
use tracing::{debug, info, warn};

use crate::error::{LinkError, Result};

/// Default MSP baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // USB-to-serial adapters
    "/dev/ttyACM0", // USB CDC flight controllers
    "/dev/ttyAMA0", // Raspberry Pi UART header
];

/// Serial port handle implementing [`Transport`]
///
/// Reads and writes block the calling thread; the link runs it on blocking
/// workers.
pub struct SerialTransport {
    /// Serial port handle
    port: Box<dyn SerialPort>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open the first available device from [`DEFAULT_DEVICE_PATHS`]
    ///
    /// # Errors
    ///
    /// Returns error if no device could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use msp_link::serial::{SerialTransport, DEFAULT_BAUD_RATE};
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = SerialTransport::open(DEFAULT_BAUD_RATE, Duration::from_millis(100))?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(baud_rate: u32, timeout: Duration) -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, baud_rate, timeout)
    }

    /// Open the first device that succeeds from `paths`
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
    /// * `baud_rate` - Line rate
    /// * `timeout` - Read/write timeout applied to the port
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, timeout: Duration) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate, timeout) {
                Ok(port) => {
                    info!("Opened flight controller link at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(LinkError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialPort>> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| LinkError::Serial(format!("Failed to open {}: {}", path, e)))
    }

    /// Second handle to the same device, so reads and writes can run on
    /// separate loops
    pub fn try_clone(&self) -> Result<Self> {
        let port = self.port.try_clone().map_err(|e| {
            LinkError::Serial(format!("Failed to clone {}: {}", self.device_path, e))
        })?;

        Ok(Self {
            port,
            device_path: self.device_path.clone(),
        })
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl Transport for SerialTransport {
    fn byte_available(&mut self) -> io::Result<bool> {
        Ok(self.port.bytes_to_read()? > 0)
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.port.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.port.write_all(&[byte])
    }

    // Hands the frame to the driver without draining the line
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.port.write_all(frame)
    }
}

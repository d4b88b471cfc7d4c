//! # MSP Protocol Constants and Types
//!
//! Core protocol definitions for MSP (MultiWii Serial Protocol) communication.
//!
//! ```text
//! offset  size  field
//! 0       1     '$'
//! 1       1     'M'
//! 2       1     direction ('<' to the flight controller, '>' from it)
//! 3       1     payload length N (0..64)
//! 4       1     command id
//! 5..5+N  N     payload
//! 5+N     1     checksum = N ^ command ^ payload[0] ^ ... ^ payload[N-1]
//! ```

use crate::error::{LinkError, Result};

/// First preamble byte
pub const MSP_PREAMBLE_1: u8 = b'$';

/// Second preamble byte
pub const MSP_PREAMBLE_2: u8 = b'M';

/// Direction marker for frames sent to the flight controller
pub const MSP_DIRECTION_REQUEST: u8 = b'<';

/// Direction marker for frames sent by the flight controller
pub const MSP_DIRECTION_RESPONSE: u8 = b'>';

/// Preamble + length + command
pub const MSP_HEADER_SIZE: usize = 5;

/// Maximum declared payload size
pub const MSP_MAX_PAYLOAD_SIZE: usize = 64;

/// Sensor report (raw IMU layout)
pub const MSP_SENSORS: u8 = 102;

/// Arm motors
pub const MSP_ARM: u8 = 151;

/// Disarm motors
pub const MSP_DISARM: u8 = 152;

/// Trim commands, one per direction
pub const MSP_TRIM_UP: u8 = 153;
pub const MSP_TRIM_DOWN: u8 = 154;
pub const MSP_TRIM_LEFT: u8 = 155;
pub const MSP_TRIM_RIGHT: u8 = 156;

/// Compact 5-channel RC update
pub const MSP_SET_TINY_RC: u8 = 200;

/// Accelerometer calibration
pub const MSP_ACC_CALIBRATION: u8 = 205;

/// Magnetometer calibration
pub const MSP_MAG_CALIBRATION: u8 = 206;

/// Persist settings to EEPROM
pub const MSP_EEPROM_WRITE: u8 = 250;

/// Control channel value range
pub const RC_MIN: i16 = 0;
pub const RC_MID: i16 = 125;
pub const RC_MAX: i16 = 250;

/// Number of channels in an `MSP_SET_TINY_RC` payload
pub const RC_CHANNEL_COUNT: usize = 5;

/// Channel order inside an `MSP_SET_TINY_RC` payload
pub mod channels {
    pub const ROLL: usize = 0;
    pub const PITCH: usize = 1;
    pub const YAW: usize = 2;
    pub const THROTTLE: usize = 3;
    /// Altitude-hold switch
    pub const AUX1: usize = 4;
}

/// Aux value sent while altitude hold is engaged
pub const ALT_HOLD_ENGAGED: i16 = 200;

/// Flow-compensation offsets are clamped to `[-FLOW_OUTPUT_LIMIT, FLOW_OUTPUT_LIMIT]`
pub const FLOW_OUTPUT_LIMIT: i16 = 20;

/// `MSP_SET_TINY_RC` payload
pub type RcPayload = [u8; RC_CHANNEL_COUNT];

/// Which way a frame travels; selects the third preamble byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to flight controller (`$M<`)
    Request,
    /// Flight controller to host (`$M>`)
    Response,
}

impl Direction {
    /// The direction marker byte
    pub fn marker(self) -> u8 {
        match self {
            Direction::Request => MSP_DIRECTION_REQUEST,
            Direction::Response => MSP_DIRECTION_RESPONSE,
        }
    }
}

/// A validated MSP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MspFrame {
    /// Command id
    pub command: u8,

    /// Payload data
    pub payload: Vec<u8>,
}

impl MspFrame {
    /// Create a new MSP frame
    ///
    /// # Errors
    ///
    /// Returns error if payload exceeds MSP_MAX_PAYLOAD_SIZE (64 bytes)
    pub fn new(command: u8, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MSP_MAX_PAYLOAD_SIZE {
            return Err(LinkError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                payload.len(),
                MSP_MAX_PAYLOAD_SIZE
            )));
        }

        Ok(Self { command, payload })
    }

    /// Declared payload length byte
    ///
    /// Only meaningful for frames built through [`MspFrame::new`]
    pub fn length(&self) -> u8 {
        self.payload.len() as u8
    }
}

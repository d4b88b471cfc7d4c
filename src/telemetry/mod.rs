//! # Telemetry Module
//!
//! The sensor report kept as the link's latest telemetry snapshot.
//!
//! The record is stored exactly as it arrived on the wire (nine little-endian
//! `i16`s) and only interpreted on request:
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0..6   | Accelerometer x, y, z |
//! | 6..12  | Gyroscope x, y, z |
//! | 12..18 | Magnetometer x, y, z |

use serde::Serialize;

use crate::error::{LinkError, Result};

/// Size of the sensor report record in bytes
pub const SENSOR_REPORT_SIZE: usize = 18;

/// Raw sensor report as last received from the flight controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorReport {
    raw: [u8; SENSOR_REPORT_SIZE],
}

/// Decoded sensor vectors, for structured logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImuReading {
    pub accelerometer: [i16; 3],
    pub gyroscope: [i16; 3],
    pub magnetometer: [i16; 3],
}

impl SensorReport {
    /// Build a record from a sensor-report payload
    ///
    /// Bytes past [`SENSOR_REPORT_SIZE`] are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is shorter than the record
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < SENSOR_REPORT_SIZE {
            return Err(LinkError::Protocol(format!(
                "Sensor report payload too short: {} bytes",
                payload.len()
            )));
        }

        let mut raw = [0u8; SENSOR_REPORT_SIZE];
        raw.copy_from_slice(&payload[..SENSOR_REPORT_SIZE]);
        Ok(Self { raw })
    }

    pub fn as_bytes(&self) -> &[u8; SENSOR_REPORT_SIZE] {
        &self.raw
    }

    pub fn accelerometer(&self) -> [i16; 3] {
        self.vector(0)
    }

    pub fn gyroscope(&self) -> [i16; 3] {
        self.vector(6)
    }

    pub fn magnetometer(&self) -> [i16; 3] {
        self.vector(12)
    }

    pub fn reading(&self) -> ImuReading {
        ImuReading {
            accelerometer: self.accelerometer(),
            gyroscope: self.gyroscope(),
            magnetometer: self.magnetometer(),
        }
    }

    fn vector(&self, offset: usize) -> [i16; 3] {
        let r = &self.raw[offset..offset + 6];
        [
            i16::from_le_bytes([r[0], r[1]]),
            i16::from_le_bytes([r[2], r[3]]),
            i16::from_le_bytes([r[4], r[5]]),
        ]
    }
}

//! # MSP Frame Encoder
//!
//! Encodes outbound command and payload frames.

use bytes::{BufMut, Bytes, BytesMut};

use super::checksum::msp_checksum;
use super::protocol::*;
use crate::error::{LinkError, Result};

/// Encode a zero-payload command frame (`$M<`)
///
/// # Examples
///
/// ```
/// use msp_link::msp::encoder::encode_command;
///
/// let frame = encode_command(105);
/// assert_eq!(&frame[..], &[0x24, 0x4D, 0x3C, 0x00, 0x69, 0x69]);
/// ```
pub fn encode_command(command: u8) -> Bytes {
    build_frame(Direction::Request, command, &[])
}

/// Encode a payload frame (`$M<`)
///
/// # Errors
///
/// Returns error if payload exceeds MSP_MAX_PAYLOAD_SIZE (64 bytes)
pub fn encode_payload(command: u8, payload: &[u8]) -> Result<Bytes> {
    encode_frame(Direction::Request, command, payload)
}

/// Encode a frame for either direction
///
/// Outbound traffic always uses [`Direction::Request`]; the response direction
/// exists for simulating a flight controller.
///
/// # Errors
///
/// Returns error if payload exceeds MSP_MAX_PAYLOAD_SIZE (64 bytes)
pub fn encode_frame(direction: Direction, command: u8, payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MSP_MAX_PAYLOAD_SIZE {
        return Err(LinkError::Protocol(format!(
            "Payload size {} exceeds maximum {}",
            payload.len(),
            MSP_MAX_PAYLOAD_SIZE
        )));
    }

    Ok(build_frame(direction, command, payload))
}

/// Payload length must already be checked against MSP_MAX_PAYLOAD_SIZE
fn build_frame(direction: Direction, command: u8, payload: &[u8]) -> Bytes {
    let length = payload.len() as u8;
    let mut frame = BytesMut::with_capacity(MSP_HEADER_SIZE + payload.len() + 1);
    frame.put_u8(MSP_PREAMBLE_1);
    frame.put_u8(MSP_PREAMBLE_2);
    frame.put_u8(direction.marker());
    frame.put_u8(length);
    frame.put_u8(command);
    frame.put_slice(payload);
    frame.put_u8(msp_checksum(length, command, payload));

    frame.freeze()
}

/// Clamp a biased channel value into the control channel range
///
/// # Examples
///
/// ```
/// use msp_link::msp::encoder::clamp_rc_value;
///
/// assert_eq!(clamp_rc_value(125), 125);
/// assert_eq!(clamp_rc_value(-3), 0);
/// assert_eq!(clamp_rc_value(400), 250);
/// ```
pub fn clamp_rc_value(value: i16) -> u8 {
    value.clamp(RC_MIN, RC_MAX) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command_bytes() {
        let frame = encode_command(105);
        assert_eq!(&frame[..], &[0x24, 0x4D, 0x3C, 0x00, 0x69, 0x69]);
    }

    #[test]
    fn test_encode_command_length() {
        // Header (5) + checksum (1)
        assert_eq!(encode_command(MSP_ARM).len(), 6);
    }

    #[test]
    fn test_encode_payload_structure() {
        let payload = [125u8, 125, 125, 0, 0];
        let frame = encode_payload(200, &payload).unwrap();

        assert_eq!(frame.len(), 11);
        assert_eq!(&frame[..3], b"$M<");
        assert_eq!(frame[3], 5);
        assert_eq!(frame[4], 200);
        assert_eq!(&frame[5..10], &payload);
        assert_eq!(frame[10], 200 ^ 5 ^ 125 ^ 125 ^ 125 ^ 0 ^ 0);
    }

    #[test]
    fn test_encode_payload_max_size() {
        let frame = encode_payload(MSP_SENSORS, &[0xA5; MSP_MAX_PAYLOAD_SIZE]).unwrap();
        assert_eq!(frame.len(), MSP_HEADER_SIZE + MSP_MAX_PAYLOAD_SIZE + 1);
        assert_eq!(frame[3], 64);
    }

    #[test]
    fn test_encode_payload_too_large() {
        let result = encode_payload(MSP_SENSORS, &[0u8; MSP_MAX_PAYLOAD_SIZE + 1]);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_response_direction() {
        let frame = encode_frame(Direction::Response, MSP_SENSORS, &[1, 2]).unwrap();
        assert_eq!(&frame[..3], b"$M>");
        assert_eq!(frame[6], 2 ^ MSP_SENSORS ^ 1 ^ 2);
    }

    #[test]
    fn test_clamp_rc_value() {
        assert_eq!(clamp_rc_value(RC_MIN), 0);
        assert_eq!(clamp_rc_value(RC_MID), 125);
        assert_eq!(clamp_rc_value(RC_MAX), 250);
        assert_eq!(clamp_rc_value(-1), 0);
        assert_eq!(clamp_rc_value(251), 250);
        assert_eq!(clamp_rc_value(i16::MAX), 250);
    }

    #[test]
    fn test_different_commands_different_checksum() {
        let a = encode_command(MSP_ARM);
        let b = encode_command(MSP_DISARM);
        assert_ne!(a[5], b[5]);
    }
}

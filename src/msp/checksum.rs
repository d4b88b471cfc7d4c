//! # MSP XOR Checksum
//!
//! The MSP v1 checksum is a running XOR over the length byte, the command byte
//! and every payload byte. The preamble is not covered.

/// Calculate the checksum for a frame body
///
/// # Arguments
///
/// * `length` - Declared payload length byte
/// * `command` - Command id
/// * `payload` - Payload bytes
///
/// # Examples
///
/// ```
/// use msp_link::msp::checksum::msp_checksum;
///
/// // An empty payload degenerates to the command byte
/// assert_eq!(msp_checksum(0, 105, &[]), 105);
/// ```
pub fn msp_checksum(length: u8, command: u8, payload: &[u8]) -> u8 {
    let mut checksum = Checksum::new();
    checksum.update(length);
    checksum.update(command);
    checksum.update_slice(payload);
    checksum.value()
}

/// Incremental checksum accumulator, folded one byte at a time by the decoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum(u8);

impl Checksum {
    /// Start an empty accumulator
    pub fn new() -> Self {
        Self(0)
    }

    /// Fold one byte into the checksum
    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.0 ^= byte;
    }

    /// Fold every byte of `bytes`, in order
    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.update(byte);
        }
    }

    /// Checksum of everything folded so far
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Clear back to the empty state
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

//! # MSP Frame Decoder
//!
//! Byte-at-a-time state machine that turns an unreliable serial stream into
//! checksum-valid frames.
//!
//! ```text
//! AwaitPreamble1 -> AwaitPreamble2 -> AwaitDirection -> AwaitLength
//!     ^                                                      |
//!     |                                                      v
//!     +---------- (checksum byte) <---- AwaitPayload <- AwaitCommand
//! ```
//!
//! Any unexpected preamble byte, an oversize length, or a checksum mismatch
//! drops the decoder back to `AwaitPreamble1` with no partial state kept.
//! None of these are reported as errors; they are only counted.

use std::io;

use tracing::trace;

use super::checksum::Checksum;
use super::protocol::*;
use crate::serial::Transport;

/// Current position in the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    AwaitPreamble1,
    AwaitPreamble2,
    AwaitDirection,
    AwaitLength,
    AwaitCommand,
    /// Collecting payload bytes; once all declared bytes are in, the next byte
    /// is the transmitted checksum
    AwaitPayload,
}

/// Counters for frames the decoder produced or threw away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Checksum-valid frames handed out
    pub frames: u64,

    /// Complete frames dropped on checksum mismatch
    pub checksum_errors: u64,

    /// Partial headers abandoned (preamble mismatch after `$`, oversize length)
    pub framing_errors: u64,
}

/// Result of one [`FrameDecoder::poll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No byte was available; nothing was read
    Idle,
    /// One byte was consumed without completing a frame
    Pending,
    /// One byte was consumed and completed a valid frame
    Frame(MspFrame),
}

impl PollOutcome {
    pub fn into_frame(self) -> Option<MspFrame> {
        match self {
            PollOutcome::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Stateful MSP frame decoder
///
/// One decoder per link; it owns its buffer and checksum accumulator.
///
/// # Examples
///
/// ```
/// use msp_link::msp::decoder::FrameDecoder;
/// use msp_link::msp::encoder::encode_frame;
/// use msp_link::msp::protocol::{Direction, MSP_SENSORS};
///
/// let mut decoder = FrameDecoder::new();
/// let bytes = encode_frame(Direction::Response, MSP_SENSORS, &[1, 2, 3]).unwrap();
///
/// let mut frames = bytes.iter().filter_map(|&b| decoder.feed(b));
/// let frame = frames.next().unwrap();
/// assert_eq!(frame.command, MSP_SENSORS);
/// assert_eq!(frame.payload, vec![1, 2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    direction: Direction,
    state: DecoderState,
    command: u8,
    declared_size: usize,
    buffer: [u8; MSP_MAX_PAYLOAD_SIZE],
    received: usize,
    checksum: Checksum,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Decoder for frames sent by the flight controller (`$M>`)
    pub fn new() -> Self {
        Self::with_direction(Direction::Response)
    }

    /// Decoder that expects the given direction marker
    pub fn with_direction(direction: Direction) -> Self {
        Self {
            direction,
            state: DecoderState::AwaitPreamble1,
            command: 0,
            declared_size: 0,
            buffer: [0u8; MSP_MAX_PAYLOAD_SIZE],
            received: 0,
            checksum: Checksum::new(),
            stats: DecoderStats::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed one byte; returns a frame when this byte completes a valid one
    pub fn feed(&mut self, byte: u8) -> Option<MspFrame> {
        match self.state {
            DecoderState::AwaitPreamble1 => {
                if byte == MSP_PREAMBLE_1 {
                    self.state = DecoderState::AwaitPreamble2;
                }
                None
            }
            DecoderState::AwaitPreamble2 => {
                if byte == MSP_PREAMBLE_2 {
                    self.state = DecoderState::AwaitDirection;
                } else {
                    self.abort_header(byte);
                }
                None
            }
            DecoderState::AwaitDirection => {
                if byte == self.direction.marker() {
                    self.state = DecoderState::AwaitLength;
                } else {
                    self.abort_header(byte);
                }
                None
            }
            DecoderState::AwaitLength => {
                let size = byte as usize;
                if size > MSP_MAX_PAYLOAD_SIZE {
                    trace!("Rejecting oversize MSP length {}", size);
                    self.stats.framing_errors += 1;
                    self.reset();
                } else {
                    self.declared_size = size;
                    self.checksum.update(byte);
                    self.state = DecoderState::AwaitCommand;
                }
                None
            }
            DecoderState::AwaitCommand => {
                self.command = byte;
                self.checksum.update(byte);
                self.state = DecoderState::AwaitPayload;
                None
            }
            DecoderState::AwaitPayload => {
                if self.received < self.declared_size {
                    self.buffer[self.received] = byte;
                    self.checksum.update(byte);
                    self.received += 1;
                    return None;
                }

                let frame = if byte == self.checksum.value() {
                    self.stats.frames += 1;
                    Some(MspFrame {
                        command: self.command,
                        payload: self.buffer[..self.declared_size].to_vec(),
                    })
                } else {
                    trace!(
                        "Dropping MSP frame cmd={}: checksum 0x{:02X}, expected 0x{:02X}",
                        self.command,
                        byte,
                        self.checksum.value()
                    );
                    self.stats.checksum_errors += 1;
                    None
                };

                self.reset();
                frame
            }
        }
    }

    /// Read and decode one byte if the transport has one
    ///
    /// Never blocks: returns [`PollOutcome::Idle`] without touching the
    /// transport's read side when nothing is buffered.
    pub fn poll<T: Transport + ?Sized>(&mut self, transport: &mut T) -> io::Result<PollOutcome> {
        if !transport.byte_available()? {
            return Ok(PollOutcome::Idle);
        }

        let byte = transport.read_byte()?;
        Ok(match self.feed(byte) {
            Some(frame) => PollOutcome::Frame(frame),
            None => PollOutcome::Pending,
        })
    }

    /// Drop any in-flight frame
    pub fn reset(&mut self) {
        self.state = DecoderState::AwaitPreamble1;
        self.command = 0;
        self.declared_size = 0;
        self.received = 0;
        self.checksum.reset();
    }

    fn abort_header(&mut self, byte: u8) {
        trace!("MSP preamble mismatch at {:?}: 0x{:02X}", self.state, byte);
        self.stats.framing_errors += 1;
        self.reset();
    }
}

//! # Receive Loop
//!
//! Feeds inbound bytes to the frame decoder and stores sensor reports.
//! Frames with any other command id are dropped.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use super::state::LinkState;
use super::stop_requested;
use crate::msp::decoder::{FrameDecoder, PollOutcome};
use crate::msp::protocol::{MspFrame, MSP_SENSORS};
use crate::serial::Transport;
use crate::telemetry::SensorReport;

/// Upper bound on bytes consumed by a single [`ReceiveLoop::poll`]
pub const MAX_BYTES_PER_POLL: usize = 512;

/// Drives the inbound half of the link
#[derive(Debug)]
pub struct ReceiveLoop {
    state: Arc<LinkState>,
    decoder: FrameDecoder,
}

impl ReceiveLoop {
    pub fn new(state: Arc<LinkState>) -> Self {
        Self {
            state,
            decoder: FrameDecoder::new(),
        }
    }

    /// Decode the bytes the transport currently has buffered
    ///
    /// The decoder still consumes one byte per step; this only keeps stepping
    /// until the transport runs dry or the per-poll budget is spent. Returns the
    /// number of frames completed.
    pub fn poll<T: Transport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let mut frames = 0;

        for _ in 0..MAX_BYTES_PER_POLL {
            match self.decoder.poll(transport) {
                Ok(PollOutcome::Idle) => break,
                Ok(PollOutcome::Pending) => {}
                Ok(PollOutcome::Frame(frame)) => {
                    frames += 1;
                    self.dispatch(frame);
                }
                Err(e) => {
                    warn!("Failed to read from transport: {}", e);
                    self.state.record_io_error();
                    break;
                }
            }
        }

        self.state.record_decoder(self.decoder.stats());
        frames
    }

    fn dispatch(&self, frame: MspFrame) {
        match frame.command {
            MSP_SENSORS => match SensorReport::from_payload(&frame.payload) {
                Ok(report) => {
                    trace!("Sensor report: {:?}", report.reading());
                    self.state.replace_telemetry(report);
                }
                Err(e) => debug!("Ignoring sensor report: {}", e),
            },
            other => trace!("Ignoring MSP frame cmd={} ({} bytes)", other, frame.payload.len()),
        }
    }

    /// Poll, then sleep `poll_interval`, until `shutdown` turns true or its
    /// sender is dropped
    ///
    /// Blocks the calling thread.
    pub fn run<T: Transport>(
        mut self,
        mut transport: T,
        poll_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) {
        info!("Receive loop started ({:?} poll interval)", poll_interval);

        while !stop_requested(&shutdown) {
            self.poll(&mut transport);
            thread::sleep(poll_interval);
        }

        info!("Receive loop stopped");
    }
}

//! # Transmit Scheduler
//!
//! Fixed-cadence uplink. Each tick runs one phase of a three-phase cycle:
//!
//! | Phase | Frames |
//! |-------|--------|
//! | Commands | One zero-payload frame per pending request, in priority order |
//! | Controls | One `MSP_SET_TINY_RC` frame |
//! | TelemetryRequest | One zero-payload `MSP_SENSORS` request |
//!
//! At the default 6.666 ms tick this is ~150 phases/s, so every phase repeats
//! at ~50 Hz.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::LinkState;
use super::stop_requested;
use crate::msp::encoder::{encode_command, encode_payload};
use crate::msp::protocol::{MSP_SENSORS, MSP_SET_TINY_RC};
use crate::serial::Transport;

/// Scheduler phase, in cycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Commands,
    Controls,
    TelemetryRequest,
}

impl Phase {
    pub fn next(self) -> Self {
        match self {
            Phase::Commands => Phase::Controls,
            Phase::Controls => Phase::TelemetryRequest,
            Phase::TelemetryRequest => Phase::Commands,
        }
    }
}

/// Drives the outbound half of the link
#[derive(Debug)]
pub struct TransmitScheduler {
    state: Arc<LinkState>,
    phase: Phase,
}

impl TransmitScheduler {
    pub fn new(state: Arc<LinkState>) -> Self {
        Self {
            state,
            phase: Phase::Commands,
        }
    }

    /// Phase the next tick will run
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the current phase and advance to the next one
    ///
    /// Returns the number of frames written. A request whose frame fails to
    /// write is not retried.
    pub fn tick<T: Transport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let phase = self.phase;
        self.phase = phase.next();

        match phase {
            Phase::Commands => self.send_requests(transport),
            Phase::Controls => self.send_controls(transport),
            Phase::TelemetryRequest => {
                usize::from(self.send(transport, &encode_command(MSP_SENSORS), false))
            }
        }
    }

    fn send_requests<T: Transport + ?Sized>(&self, transport: &mut T) -> usize {
        let mut sent = 0;
        for request in self.state.requests().drain() {
            debug!("Sending {:?} (cmd {})", request, request.command());
            if self.send(transport, &encode_command(request.command()), true) {
                sent += 1;
            }
        }
        sent
    }

    fn send_controls<T: Transport + ?Sized>(&self, transport: &mut T) -> usize {
        let rc = self.state.controls().rc_payload();

        match encode_payload(MSP_SET_TINY_RC, &rc) {
            Ok(frame) => usize::from(self.send(transport, &frame, false)),
            Err(e) => {
                warn!("Failed to encode RC frame: {}", e);
                0
            }
        }
    }

    fn send<T: Transport + ?Sized>(&self, transport: &mut T, frame: &[u8], is_command: bool) -> bool {
        match transport.write_frame(frame) {
            Ok(()) => {
                self.state.record_frame_sent(is_command);
                true
            }
            Err(e) => {
                warn!("Failed to send frame: {}", e);
                self.state.record_io_error();
                false
            }
        }
    }

    /// Tick every `period` until `shutdown` turns true or its sender is dropped
    ///
    /// Blocks the calling thread; the transport writes synchronously. A tick
    /// that overruns its slot pushes the following ones back rather than
    /// bursting to catch up.
    pub fn run<T: Transport>(
        mut self,
        mut transport: T,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) {
        info!("Transmit scheduler started ({:?} per phase)", period);

        let mut deadline = Instant::now();
        while !stop_requested(&shutdown) {
            self.tick(&mut transport);

            deadline += period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                deadline = now;
            }
        }

        info!("Transmit scheduler stopped");
    }
}

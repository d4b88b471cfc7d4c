//! # Shared Link State
//!
//! Everything the caller, the transmit scheduler and the receive loop share:
//! one-shot command requests, continuous control inputs, the latest sensor
//! report, and link counters.
//!
//! - Requests are atomics; the scheduler takes each one with a swap, so a
//!   request is delivered at most once and a repeat before delivery collapses
//!   into the pending one.
//! - Control inputs and the sensor report sit behind mutexes that are held
//!   only for a copy in or out, never across transport I/O.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::msp::decoder::DecoderStats;
use crate::msp::encoder::clamp_rc_value;
use crate::msp::protocol::*;
use crate::telemetry::SensorReport;

/// Trim nudge direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimDirection {
    Up,
    Down,
    Left,
    Right,
}

impl TrimDirection {
    pub fn command(self) -> u8 {
        match self {
            TrimDirection::Up => MSP_TRIM_UP,
            TrimDirection::Down => MSP_TRIM_DOWN,
            TrimDirection::Left => MSP_TRIM_LEFT,
            TrimDirection::Right => MSP_TRIM_RIGHT,
        }
    }

    // 0 is reserved for "no trim pending"
    fn code(self) -> u8 {
        match self {
            TrimDirection::Up => 1,
            TrimDirection::Down => 2,
            TrimDirection::Left => 3,
            TrimDirection::Right => 4,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TrimDirection::Up),
            2 => Some(TrimDirection::Down),
            3 => Some(TrimDirection::Left),
            4 => Some(TrimDirection::Right),
            _ => None,
        }
    }
}

/// One-shot command a caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Arm,
    Disarm,
    AccCalibration,
    MagCalibration,
    EepromWrite,
    Trim(TrimDirection),
}

impl Request {
    /// Zero-payload command id sent for this request
    pub fn command(self) -> u8 {
        match self {
            Request::Arm => MSP_ARM,
            Request::Disarm => MSP_DISARM,
            Request::AccCalibration => MSP_ACC_CALIBRATION,
            Request::MagCalibration => MSP_MAG_CALIBRATION,
            Request::EepromWrite => MSP_EEPROM_WRITE,
            Request::Trim(direction) => direction.command(),
        }
    }
}

/// Pending one-shot requests
///
/// Only a single trim direction is held; a newer trim request replaces an
/// undelivered one.
#[derive(Debug, Default)]
pub struct PendingRequests {
    arm: AtomicBool,
    disarm: AtomicBool,
    acc_calibration: AtomicBool,
    mag_calibration: AtomicBool,
    eeprom_write: AtomicBool,
    trim: AtomicU8,
}

impl PendingRequests {
    pub fn set(&self, request: Request) {
        match request {
            Request::Arm => self.arm.store(true, Ordering::Release),
            Request::Disarm => self.disarm.store(true, Ordering::Release),
            Request::AccCalibration => self.acc_calibration.store(true, Ordering::Release),
            Request::MagCalibration => self.mag_calibration.store(true, Ordering::Release),
            Request::EepromWrite => self.eeprom_write.store(true, Ordering::Release),
            Request::Trim(direction) => self.trim.store(direction.code(), Ordering::Release),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, request: Request) -> bool {
        match request {
            Request::Arm => self.arm.load(Ordering::Acquire),
            Request::Disarm => self.disarm.load(Ordering::Acquire),
            Request::AccCalibration => self.acc_calibration.load(Ordering::Acquire),
            Request::MagCalibration => self.mag_calibration.load(Ordering::Acquire),
            Request::EepromWrite => self.eeprom_write.load(Ordering::Acquire),
            Request::Trim(direction) => self.trim.load(Ordering::Acquire) == direction.code(),
        }
    }

    /// Take every pending request, clearing each flag
    ///
    /// Order: arm, disarm, accelerometer calibration, magnetometer
    /// calibration, EEPROM write, trim.
    pub fn drain(&self) -> Vec<Request> {
        let mut taken = Vec::with_capacity(6);

        for (flag, request) in [
            (&self.arm, Request::Arm),
            (&self.disarm, Request::Disarm),
            (&self.acc_calibration, Request::AccCalibration),
            (&self.mag_calibration, Request::MagCalibration),
            (&self.eeprom_write, Request::EepromWrite),
        ] {
            if flag.swap(false, Ordering::AcqRel) {
                taken.push(request);
            }
        }

        if let Some(direction) = TrimDirection::from_code(self.trim.swap(0, Ordering::AcqRel)) {
            taken.push(Request::Trim(direction));
        }

        taken
    }
}

/// Continuous control inputs, as offsets from each channel's bias
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlInputs {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    pub throttle: u8,
    pub altitude_hold: bool,
    /// Optical-flow compensation (x adds to roll, y to pitch), already clamped
    pub flow: [i16; 2],
}

impl ControlInputs {
    /// Build the `MSP_SET_TINY_RC` payload
    ///
    /// Roll, pitch and yaw are biased to the channel midpoint, throttle and the
    /// altitude-hold switch to the channel minimum. Every channel is clamped to
    /// the channel range.
    pub fn rc_payload(&self) -> RcPayload {
        let mut rc = [0u8; RC_CHANNEL_COUNT];
        rc[channels::ROLL] = clamp_rc_value(RC_MID.saturating_add(self.roll).saturating_add(self.flow[0]));
        rc[channels::PITCH] = clamp_rc_value(RC_MID.saturating_add(self.pitch).saturating_add(self.flow[1]));
        rc[channels::YAW] = clamp_rc_value(RC_MID.saturating_add(self.yaw));
        rc[channels::THROTTLE] = clamp_rc_value(RC_MIN + i16::from(self.throttle));
        rc[channels::AUX1] = clamp_rc_value(if self.altitude_hold {
            RC_MIN + ALT_HOLD_ENGAGED
        } else {
            RC_MIN
        });
        rc
    }
}

/// Clamp a flow-compensation offset to `[-FLOW_OUTPUT_LIMIT, FLOW_OUTPUT_LIMIT]`
pub fn clamp_flow(value: i16) -> i16 {
    value.clamp(-FLOW_OUTPUT_LIMIT, FLOW_OUTPUT_LIMIT)
}

/// Snapshot of link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Frames written to the transport
    pub frames_sent: u64,

    /// One-shot command frames among `frames_sent`
    pub commands_sent: u64,

    /// Checksum-valid frames decoded
    pub frames_received: u64,

    /// Sensor reports stored
    pub telemetry_updates: u64,

    /// Frames dropped on checksum mismatch
    pub checksum_errors: u64,

    /// Partial headers abandoned
    pub framing_errors: u64,

    /// Transport read/write failures
    pub io_errors: u64,
}

#[derive(Debug, Default)]
struct LinkCounters {
    frames_sent: AtomicU64,
    commands_sent: AtomicU64,
    frames_received: AtomicU64,
    telemetry_updates: AtomicU64,
    checksum_errors: AtomicU64,
    framing_errors: AtomicU64,
    io_errors: AtomicU64,
}

/// State shared between the caller and both background loops
#[derive(Debug, Default)]
pub struct LinkState {
    controls: Mutex<ControlInputs>,
    requests: PendingRequests,
    telemetry: Mutex<SensorReport>,
    counters: LinkCounters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Plain data: a panicked writer cannot leave a torn value behind
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LinkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current control inputs
    pub fn controls(&self) -> ControlInputs {
        *lock(&self.controls)
    }

    /// Apply an update to the control inputs under the lock
    pub fn update_controls(&self, update: impl FnOnce(&mut ControlInputs)) {
        update(&mut lock(&self.controls));
    }

    pub fn requests(&self) -> &PendingRequests {
        &self.requests
    }

    /// Copy of the latest sensor report
    pub fn telemetry(&self) -> SensorReport {
        *lock(&self.telemetry)
    }

    /// Replace the sensor report as a whole
    pub fn replace_telemetry(&self, report: SensorReport) {
        *lock(&self.telemetry) = report;
        self.counters.telemetry_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> LinkStats {
        let c = &self.counters;
        LinkStats {
            frames_sent: c.frames_sent.load(Ordering::Relaxed),
            commands_sent: c.commands_sent.load(Ordering::Relaxed),
            frames_received: c.frames_received.load(Ordering::Relaxed),
            telemetry_updates: c.telemetry_updates.load(Ordering::Relaxed),
            checksum_errors: c.checksum_errors.load(Ordering::Relaxed),
            framing_errors: c.framing_errors.load(Ordering::Relaxed),
            io_errors: c.io_errors.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_frame_sent(&self, is_command: bool) {
        self.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
        if is_command {
            self.counters.commands_sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_io_error(&self) {
        self.counters.io_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the receive loop's decoder totals
    pub(crate) fn record_decoder(&self, stats: DecoderStats) {
        let c = &self.counters;
        c.frames_received.store(stats.frames, Ordering::Relaxed);
        c.checksum_errors.store(stats.checksum_errors, Ordering::Relaxed);
        c.framing_errors.store(stats.framing_errors, Ordering::Relaxed);
    }
}

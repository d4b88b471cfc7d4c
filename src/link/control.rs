//! # Control Surface
//!
//! Caller-facing setters and getters over [`LinkState`].
//!
//! Every setter touches one field (or, for [`ControlSurface::reset_attitude`],
//! the three attitude axes together) and returns immediately. The transmit
//! scheduler picks the new values up on its next control phase; one-shot
//! requests go out on the next command phase.
//!
//! ## Named Steps
//!
//! | Operation | Channel | Offset |
//! |-----------|---------|--------|
//! | `left` / `right` | Roll | `-roll_step` / `+roll_step` |
//! | `forward` / `backward` | Pitch | `+pitch_step` / `-pitch_step` |
//! | `turn_left` / `turn_right` | Yaw | `-yaw_step` / `+yaw_step` |
//!
//! Steps replace the axis value rather than accumulating.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use msp_link::config::ControlConfig;
//! use msp_link::link::control::ControlSurface;
//! use msp_link::link::state::LinkState;
//!
//! let surface = ControlSurface::new(Arc::new(LinkState::new()), ControlConfig::default());
//! surface.forward();
//! surface.set_throttle(90);
//! surface.arm();
//!
//! assert_eq!(surface.controls().pitch, 12);
//! ```

use std::sync::Arc;

use super::state::{clamp_flow, ControlInputs, LinkState, LinkStats, Request, TrimDirection};
use crate::config::ControlConfig;
use crate::telemetry::SensorReport;

/// Handle the caller uses to steer the link
///
/// Cheap to clone; all clones share the same state.
#[derive(Debug, Clone)]
pub struct ControlSurface {
    state: Arc<LinkState>,
    steps: ControlConfig,
}

impl ControlSurface {
    pub fn new(state: Arc<LinkState>, steps: ControlConfig) -> Self {
        Self { state, steps }
    }

    pub fn set_roll(&self, offset: i16) {
        self.state.update_controls(|c| c.roll = offset);
    }

    pub fn set_pitch(&self, offset: i16) {
        self.state.update_controls(|c| c.pitch = offset);
    }

    pub fn set_yaw(&self, offset: i16) {
        self.state.update_controls(|c| c.yaw = offset);
    }

    pub fn left(&self) {
        self.set_roll(-self.steps.roll_step);
    }

    pub fn right(&self) {
        self.set_roll(self.steps.roll_step);
    }

    pub fn forward(&self) {
        self.set_pitch(self.steps.pitch_step);
    }

    pub fn backward(&self) {
        self.set_pitch(-self.steps.pitch_step);
    }

    pub fn turn_left(&self) {
        self.set_yaw(-self.steps.yaw_step);
    }

    pub fn turn_right(&self) {
        self.set_yaw(self.steps.yaw_step);
    }

    /// Zero roll, pitch and yaw in a single update
    pub fn reset_attitude(&self) {
        self.state.update_controls(|c| {
            c.roll = 0;
            c.pitch = 0;
            c.yaw = 0;
        });
    }

    /// Throttle magnitude above the channel minimum
    pub fn set_throttle(&self, throttle: u8) {
        self.state.update_controls(|c| c.throttle = throttle);
    }

    pub fn engage_altitude_hold(&self) {
        self.state.update_controls(|c| c.altitude_hold = true);
    }

    pub fn disengage_altitude_hold(&self) {
        self.state.update_controls(|c| c.altitude_hold = false);
    }

    /// Set the optical-flow compensation pair
    ///
    /// Each axis is clamped to `[-FLOW_OUTPUT_LIMIT, FLOW_OUTPUT_LIMIT]` here,
    /// before it is stored.
    pub fn set_flow_output(&self, x: i16, y: i16) {
        let flow = [clamp_flow(x), clamp_flow(y)];
        self.state.update_controls(|c| c.flow = flow);
    }

    pub fn arm(&self) {
        self.state.requests().set(Request::Arm);
    }

    pub fn disarm(&self) {
        self.state.requests().set(Request::Disarm);
    }

    pub fn calibrate_accelerometer(&self) {
        self.state.requests().set(Request::AccCalibration);
    }

    pub fn calibrate_magnetometer(&self) {
        self.state.requests().set(Request::MagCalibration);
    }

    /// Ask the flight controller to persist its settings
    pub fn write_eeprom(&self) {
        self.state.requests().set(Request::EepromWrite);
    }

    /// Request a trim nudge; replaces any trim not yet sent
    pub fn trim(&self, direction: TrimDirection) {
        self.state.requests().set(Request::Trim(direction));
    }

    /// Copy of the latest sensor report
    pub fn telemetry(&self) -> SensorReport {
        self.state.telemetry()
    }

    pub fn controls(&self) -> ControlInputs {
        self.state.controls()
    }

    pub fn stats(&self) -> LinkStats {
        self.state.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msp::protocol::channels;

    fn create_surface() -> (Arc<LinkState>, ControlSurface) {
        let state = Arc::new(LinkState::new());
        let surface = ControlSurface::new(state.clone(), ControlConfig::default());
        (state, surface)
    }

    #[test]
    fn test_named_steps_use_defaults() {
        let (_, surface) = create_surface();

        surface.left();
        surface.backward();
        surface.turn_right();
        let c = surface.controls();
        assert_eq!((c.roll, c.pitch, c.yaw), (-12, -12, 25));

        surface.right();
        surface.forward();
        surface.turn_left();
        let c = surface.controls();
        assert_eq!((c.roll, c.pitch, c.yaw), (12, 12, -25));
    }

    #[test]
    fn test_custom_steps() {
        let state = Arc::new(LinkState::new());
        let steps = ControlConfig {
            roll_step: 30,
            pitch_step: 5,
            yaw_step: 100,
        };
        let surface = ControlSurface::new(state, steps);

        surface.right();
        surface.forward();
        surface.turn_left();
        assert_eq!(surface.controls().rc_payload()[..3], [155, 130, 25]);
    }

    #[test]
    fn test_last_write_wins() {
        let (_, surface) = create_surface();
        surface.left();
        surface.left();
        surface.set_roll(3);
        assert_eq!(surface.controls().roll, 3);
    }

    #[test]
    fn test_reset_attitude_keeps_other_inputs() {
        let (_, surface) = create_surface();
        surface.set_roll(10);
        surface.set_pitch(-10);
        surface.set_yaw(40);
        surface.set_throttle(120);
        surface.engage_altitude_hold();

        surface.reset_attitude();

        let c = surface.controls();
        assert_eq!((c.roll, c.pitch, c.yaw), (0, 0, 0));
        assert_eq!(c.throttle, 120);
        assert!(c.altitude_hold);
    }

    #[test]
    fn test_altitude_hold_channel() {
        let (_, surface) = create_surface();

        surface.engage_altitude_hold();
        assert_eq!(surface.controls().rc_payload()[channels::AUX1], 200);

        surface.disengage_altitude_hold();
        assert_eq!(surface.controls().rc_payload()[channels::AUX1], 0);
    }

    #[test]
    fn test_flow_output_clamped_on_write() {
        let (_, surface) = create_surface();

        surface.set_flow_output(50, -50);
        assert_eq!(surface.controls().flow, [20, -20]);
        assert_eq!(surface.controls().rc_payload()[..2], [145, 105]);

        surface.set_flow_output(-7, 20);
        assert_eq!(surface.controls().flow, [-7, 20]);
    }

    #[test]
    fn test_requests_reach_shared_state() {
        let (state, surface) = create_surface();

        surface.arm();
        surface.disarm();
        surface.calibrate_accelerometer();
        surface.calibrate_magnetometer();
        surface.write_eeprom();
        surface.trim(TrimDirection::Up);
        surface.trim(TrimDirection::Left);

        assert_eq!(
            state.requests().drain(),
            vec![
                Request::Arm,
                Request::Disarm,
                Request::AccCalibration,
                Request::MagCalibration,
                Request::EepromWrite,
                Request::Trim(TrimDirection::Left),
            ]
        );
    }

    #[test]
    fn test_telemetry_is_a_copy() {
        let (state, surface) = create_surface();

        let report = SensorReport::from_payload(&[3u8; 18]).unwrap();
        state.replace_telemetry(report);

        let copy = surface.telemetry();
        state.replace_telemetry(SensorReport::default());

        assert_eq!(copy, report);
        assert_eq!(surface.telemetry(), SensorReport::default());
        assert_eq!(surface.stats().telemetry_updates, 2);
    }

    #[test]
    fn test_clones_share_state() {
        let (_, surface) = create_surface();
        let other = surface.clone();

        other.set_throttle(77);
        assert_eq!(surface.controls().throttle, 77);
    }
}

//! # MSP Link Library
//!
//! Drive a MultiWii Serial Protocol (v1) flight controller over a serial port.
//!
//! This library provides the frame codec, the shared link state, and the two
//! background loops that keep RC inputs and one-shot commands flowing to the
//! flight controller while collecting its sensor reports.

pub mod config;
pub mod error;
pub mod link;
pub mod msp;
pub mod serial;
pub mod telemetry;

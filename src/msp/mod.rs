//! # MSP Protocol Module
//!
//! Implementation of the MultiWii Serial Protocol (v1) framing.
//!
//! This module handles:
//! - Command and payload frame encoding
//! - Stream decoding with resynchronization
//! - XOR checksum calculation

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod checksum;

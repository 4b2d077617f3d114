//! Core utilities for the ISDN D-channel stack
//!
//! This crate provides fundamental types and utilities used across the stack:
//! - OctetBuffer, a bounds-checked cursor for octet-oriented PDUs
//! - PriTime and the Clock abstraction used by the scheduler
//! - Node, switch and SAP identifiers shared by all layers
//! - Logging setup driven by the debug flags

pub mod debug;
pub mod names;
pub mod octet_buffer;
pub mod pdu_parse_error;
pub mod pri_common;
pub mod pri_entities;
pub mod pri_time;

// Re-export commonly used items
pub use octet_buffer::OctetBuffer;
pub use pdu_parse_error::PduParseErr;
pub use pri_common::*;
pub use pri_time::{Clock, ManualClock, PriTime, SystemClock};

/// Index of a protocol instance (D-channel or subchannel) inside the instance arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InstanceId(pub usize);

impl core::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "inst{}", self.0)
    }
}

/// Internal call reference: 15-bit value, 0x8000 set when we originated the call.
pub type CallRef = u16;

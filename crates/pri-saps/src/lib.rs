//! Primitives passed between the entities of the D-channel stack.
//!
//! PH-SAP carries raw HDLC frames between the frame I/O and the Q.921 entity,
//! DL-SAP the data link service between Q.921 and Q.931, and CC-SAP the
//! events reported to the application.

pub mod cc;
pub mod dl;
pub mod ph;
pub mod sapmsg;

pub use sapmsg::*;

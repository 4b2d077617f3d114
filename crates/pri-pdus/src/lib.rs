//! Wire codecs for the D-channel protocols
//!
//! - `q921`: LAPD frame headers, control fields and TEI management messages
//! - `q931`: message header, message types, call states and information elements
//! - `rose`: ASN.1 BER reader and builder plus the Q.932 supplementary service operations
//! - `fcs16`: HDLC frame check sequence

pub mod fcs16;
pub mod q921;
pub mod q931;
pub mod rose;

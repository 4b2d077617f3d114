use core::fmt;

use pri_core::{CallRef, PduParseErr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// All timer slots are in use
    NoFreeSlot,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::NoFreeSlot => write!(f, "no more room in scheduler"),
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Errors reported by the host API
#[derive(Debug)]
pub enum PriError {
    /// The call reference is not in the call pool
    NoSuchCall(CallRef),
    InvalidArgument(&'static str),
    /// The request can't be carried out for these calls or this switch type
    Incompatible(&'static str),
    Scheduler(SchedulerError),
    Io(std::io::Error),
    /// A message or APDU could not be encoded
    Encode(PduParseErr),
}

impl fmt::Display for PriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriError::NoSuchCall(cr) => write!(f, "no call with reference {}", cr),
            PriError::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            PriError::Incompatible(what) => write!(f, "incompatible request: {}", what),
            PriError::Scheduler(e) => write!(f, "scheduler: {}", e),
            PriError::Io(e) => write!(f, "frame i/o: {}", e),
            PriError::Encode(e) => write!(f, "unable to encode: {}", e),
        }
    }
}

impl std::error::Error for PriError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PriError::Scheduler(e) => Some(e),
            PriError::Io(e) => Some(e),
            PriError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchedulerError> for PriError {
    fn from(e: SchedulerError) -> Self {
        PriError::Scheduler(e)
    }
}

impl From<std::io::Error> for PriError {
    fn from(e: std::io::Error) -> Self {
        PriError::Io(e)
    }
}

impl From<PduParseErr> for PriError {
    fn from(e: PduParseErr) -> Self {
        PriError::Encode(e)
    }
}

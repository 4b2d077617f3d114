//! Remote operations (Q.932 / ROSE) carried in Facility elements

pub mod ber;
pub mod component;
pub mod ops;
pub mod party;

pub use component::{FacilityApdu, parse_facility};
pub use ops::{Invoke, InvokeArg, OpCode, Reject, ReturnError, ReturnResult, RoseComponent, decode_component};

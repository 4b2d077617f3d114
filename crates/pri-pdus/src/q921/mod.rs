pub mod frame;
pub mod tei_mgmt;

pub use frame::*;
pub use tei_mgmt::*;

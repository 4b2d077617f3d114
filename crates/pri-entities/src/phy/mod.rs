pub mod frame_io;
pub mod phy_io;

pub use frame_io::{FrameIo, LinkedFrameIo, UnixDatagramIo, linked_pair};
pub use phy_io::PhyIo;

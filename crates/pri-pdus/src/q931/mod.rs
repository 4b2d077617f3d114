pub mod dump;
pub mod enums;
pub mod header;
pub mod ie;
pub mod message;

pub use enums::call_state::*;
pub use enums::ie_kind::*;
pub use enums::msg_type::*;
pub use header::*;
pub use message::*;

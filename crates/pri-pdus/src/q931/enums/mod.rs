pub mod call_state;
pub mod ie_kind;
pub mod msg_type;

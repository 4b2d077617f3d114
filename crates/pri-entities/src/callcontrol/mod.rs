pub mod call;
pub mod cc_entity;
mod facility;
mod inbound;
mod outbound;
pub mod setup_request;

pub use call::Call;
pub use cc_entity::{CallControl, CcLink};
pub use setup_request::SetupRequest;

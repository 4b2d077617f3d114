#![allow(dead_code)]

pub mod callcontrol;
pub mod entity_trait;
pub mod error;
pub mod host;
pub mod lapd;
pub mod messagerouter;
pub mod phy;
pub mod pri;
pub mod scheduler;

// Re-export commonly used items from router
pub use entity_trait::PriEntityTrait;
pub use error::{PriError, SchedulerError};
pub use messagerouter::{MessageQueue, MessageRouter};
pub use pri::Pri;
pub use callcontrol::SetupRequest;
pub use scheduler::{Scheduler, TimerEvent, TimerHandle};

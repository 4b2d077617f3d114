mod events;

pub use events::*;

/// Event reported towards the application
#[derive(Debug, Clone)]
pub struct CcEventInd {
    pub event: PriEvent,
}

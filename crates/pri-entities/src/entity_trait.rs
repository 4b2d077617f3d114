use as_any::AsAny;
use pri_core::pri_entities::PriEntity;
use pri_saps::SapMsg;

use crate::MessageQueue;
use crate::scheduler::{Scheduler, TimerEvent};

/// One layer of the D-channel stack. The router hands it primitives addressed to
/// `entity()` and the timers it armed.
pub trait PriEntityTrait: Send + AsAny {
    /// Returns the entity type identifier
    fn entity(&self) -> PriEntity;

    /// Handle incoming SAP primitive
    fn rx_prim(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, message: SapMsg);

    /// Handle an expired timer owned by this entity. The timer slot is already free.
    fn rx_timer(&mut self, _queue: &mut MessageQueue, _sched: &mut Scheduler, _event: TimerEvent) {}

    /// Called once all queued messages of a run have been delivered
    fn run_end(&mut self, _queue: &mut MessageQueue, _sched: &mut Scheduler) {}
}

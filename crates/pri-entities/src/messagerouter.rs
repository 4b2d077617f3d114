use std::collections::VecDeque;

use pri_core::{PriTime, pri_entities::PriEntity};
use pri_saps::SapMsg;

use crate::PriEntityTrait;
use crate::scheduler::Scheduler;

/// Deliveries in one drain before the router assumes two entities are bouncing
/// primitives at each other and drops the rest
const MAX_DELIVERIES: usize = 4096;

/// Primitives waiting to be handed to their destination layer, oldest first
#[derive(Default)]
pub struct MessageQueue {
    pending: VecDeque<SapMsg>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, message: SapMsg) {
        self.pending.push_back(message);
    }

    pub fn pop_front(&mut self) -> Option<SapMsg> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Owns the layers of one D-channel together with the primitive queue between
/// them and the timer scheduler they share.
pub struct MessageRouter {
    /// In registration order, which is also the order of `run_end` callbacks
    entities: Vec<Box<dyn PriEntityTrait>>,
    queue: MessageQueue,
    sched: Scheduler,
}

impl MessageRouter {
    pub fn new(sched: Scheduler) -> Self {
        Self { entities: Vec::with_capacity(4), queue: MessageQueue::new(), sched }
    }

    /// Adds a layer. A second registration for the same entity replaces the first.
    pub fn register_entity(&mut self, entity: Box<dyn PriEntityTrait>) {
        let kind = entity.entity();
        tracing::debug!("registering {:?}", kind);
        match self.entities.iter().position(|e| e.entity() == kind) {
            Some(idx) => self.entities[idx] = entity,
            None => self.entities.push(entity),
        }
    }

    /// Concrete entity together with the queue and scheduler it works on, for
    /// direct calls from the host API
    pub fn entity_ctx<T: PriEntityTrait + 'static>(&mut self, kind: PriEntity) -> Option<(&mut T, &mut MessageQueue, &mut Scheduler)> {
        let entity = self.entities.iter_mut().find(|e| e.entity() == kind)?;
        let entity = entity.as_mut().as_any_mut().downcast_mut::<T>()?;
        Some((entity, &mut self.queue, &mut self.sched))
    }

    pub fn entity_ref<T: PriEntityTrait + 'static>(&self, kind: PriEntity) -> Option<&T> {
        self.entities.iter().find(|e| e.entity() == kind)?.as_ref().as_any().downcast_ref::<T>()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.sched
    }

    /// Hands queued primitives to their destinations until the queue is empty,
    /// including whatever the handlers queue in turn
    fn drain(&mut self) {
        let mut delivered = 0;
        while let Some(message) = self.queue.pop_front() {
            if delivered == MAX_DELIVERIES {
                tracing::error!("primitive loop, dropping {} queued after {}", self.queue.len() + 1, message.msg);
                self.queue.clear();
                return;
            }
            delivered += 1;

            let dest = *message.get_dest();
            tracing::trace!("{:?} {:?} -> {:?}: {}", message.get_sap(), message.get_source(), dest, message.msg);
            let Some(idx) = self.entities.iter().position(|e| e.entity() == dest) else {
                tracing::warn!("no {:?} registered, dropping {}", dest, message.msg);
                continue;
            };
            self.entities[idx].rx_prim(&mut self.queue, &mut self.sched, message);
        }
    }

    /// Delivers everything queued, then lets every entity finish the run.
    /// Lapd sends its deferred acknowledgements here.
    pub fn run_end(&mut self) {
        self.drain();
        for entity in self.entities.iter_mut() {
            entity.run_end(&mut self.queue, &mut self.sched);
        }
        self.drain();
    }

    /// Fires every timer due at `now`, draining the queue after each.
    /// Returns the number of timers run.
    pub fn run_timers(&mut self, now: PriTime) -> usize {
        let mut fired = 0;
        while let Some((handle, event)) = self.sched.pop_due(now) {
            let dest = event.entity();
            tracing::trace!("timer slot {} fired: {} for {:?}", handle.index(), event, dest);
            let (queue, sched) = (&mut self.queue, &mut self.sched);
            match self.entities.iter_mut().find(|e| e.entity() == dest) {
                Some(entity) => entity.rx_timer(queue, sched, event),
                None => tracing::warn!("no {:?} registered for timer {}", dest, event),
            }
            self.drain();
            fired += 1;
        }
        if fired > 0 {
            self.run_end();
        }
        fired
    }
}

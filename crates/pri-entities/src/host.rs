use std::collections::VecDeque;

use pri_config::SharedConfig;
use pri_core::pri_entities::PriEntity;
use pri_saps::cc::PriEvent;
use pri_saps::{SapMsg, SapMsgInner};

use crate::scheduler::Scheduler;
use crate::{MessageQueue, PriEntityTrait};

/// Application side of the CC-SAP. Keeps every event the stack reports, in order,
/// until the application picks it up.
pub struct Host {
    config: SharedConfig,
    events: VecDeque<PriEvent>,
}

impl Host {
    pub fn new(config: SharedConfig) -> Self {
        Self { config, events: VecDeque::new() }
    }

    pub fn pop_event(&mut self) -> Option<PriEvent> {
        self.events.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

impl PriEntityTrait for Host {
    fn entity(&self) -> PriEntity {
        PriEntity::Host
    }

    fn rx_prim(&mut self, _queue: &mut MessageQueue, _sched: &mut Scheduler, message: SapMsg) {
        match message.msg {
            SapMsgInner::CcEventInd(prim) => {
                tracing::debug!("<- {} from {:?}", prim.event, message.src);
                self.events.push_back(prim.event);
            }
            other => tracing::warn!("Host: unexpected primitive {} from {:?}", other, message.src),
        }
    }
}

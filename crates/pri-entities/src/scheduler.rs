//! One-shot timers of a D-channel and its subchannel.
//!
//! All instances of a D-channel share the scheduler of the master instance. Every
//! event remembers the instance it was armed for so that due subchannel timers can be
//! run ahead of the master's.

use core::fmt;

use pri_core::pri_entities::PriEntity;
use pri_core::{CallRef, Clock, InstanceId, PriTime};

use crate::error::SchedulerError;

/// Number of timer slots. Slot 0 is never handed out.
pub const MAX_SCHED: usize = 128;

/// Handle of an armed timer, valid until the timer fires or is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(usize);

impl TimerHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LapdTimer {
    /// Retransmission / acknowledgement timer
    T200,
    /// Idle link supervision
    T203,
    /// TEI identity request retry
    T202,
    /// SABME retransmission while establishing, runs with the T200 value
    Sabme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTimer {
    /// SETUP sent, nothing heard back
    T303,
    /// DISCONNECT sent, waiting for RELEASE
    T305,
    /// RELEASE sent, waiting for RELEASE COMPLETE
    T308,
    /// Second T308 expiry
    T308Final,
    /// CONNECT sent, waiting for CONNECT ACKNOWLEDGE
    T313,
    /// Data link lost with the call active
    T309,
    /// Data link lost, clear the call on the next scheduler run
    DlDownCancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Lapd { inst: InstanceId, timer: LapdTimer },
    Call { cr: CallRef, timer: CallTimer },
}

impl TimerEvent {
    /// Entity the event is dispatched to
    pub fn entity(&self) -> PriEntity {
        match self {
            TimerEvent::Lapd { .. } => PriEntity::Lapd,
            TimerEvent::Call { .. } => PriEntity::CallControl,
        }
    }
}

impl fmt::Display for TimerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerEvent::Lapd { inst, timer } => write!(f, "{:?} on {}", timer, inst),
            TimerEvent::Call { cr, timer } => write!(f, "{:?} for call {}", timer, cr),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SchedEntry {
    when: PriTime,
    inst: InstanceId,
    event: TimerEvent,
}

pub struct Scheduler {
    clock: Box<dyn Clock>,
    master: InstanceId,
    slots: Vec<Option<SchedEntry>>,
}

impl Scheduler {
    pub fn new(clock: Box<dyn Clock>, master: InstanceId) -> Self {
        Self {
            clock,
            master,
            slots: vec![None; MAX_SCHED],
        }
    }

    pub fn now(&self) -> PriTime {
        self.clock.now()
    }

    /// Arms a one-shot timer `delay_ms` from now for `inst`
    pub fn schedule_event(&mut self, delay_ms: u64, event: TimerEvent, inst: InstanceId) -> Result<TimerHandle, SchedulerError> {
        let Some(x) = (1..MAX_SCHED).find(|&x| self.slots[x].is_none()) else {
            tracing::error!("No more room in scheduler, dropping {}", event);
            return Err(SchedulerError::NoFreeSlot);
        };
        let when = self.clock.now().add_ms(delay_ms);
        tracing::trace!("schedule_event {} at {} in slot {}", event, when, x);
        self.slots[x] = Some(SchedEntry { when, inst, event });
        Ok(TimerHandle(x))
    }

    pub fn schedule_del(&mut self, handle: TimerHandle) {
        match self.slots.get_mut(handle.0) {
            Some(slot) => *slot = None,
            None => tracing::error!("Asked to delete sched id {}???", handle.0),
        }
    }

    /// Earliest deadline of all armed timers
    pub fn schedule_next(&self) -> Option<PriTime> {
        self.slots.iter().flatten().map(|e| e.when).min()
    }

    /// Removes and returns the next due event, subchannel events first. The slot is
    /// free again once this returns, so the handler may arm new timers.
    pub fn pop_due(&mut self, now: PriTime) -> Option<(TimerHandle, TimerEvent)> {
        let due = |e: &SchedEntry| e.when <= now;
        let pick = self
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| due(e) && e.inst != self.master))
            .or_else(|| self.slots.iter().position(|s| s.as_ref().is_some_and(due)))?;
        let entry = self.slots[pick].take()?;
        tracing::trace!("firing {} (slot {})", entry.event, pick);
        Some((TimerHandle(pick), entry.event))
    }

    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.slots.get(handle.0).is_some_and(|s| s.is_some())
    }

    /// Number of armed timers
    pub fn pending(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

use std::collections::BTreeMap;

use pri_config::{SharedConfig, TimerIdx};
use pri_core::pri_entities::PriEntity;
use pri_core::{CallRef, DebugFlags, InstanceId, Sap};
use pri_pdus::q931::dump::dump_message;
use pri_pdus::q931::ie::IeContext;
use pri_pdus::q931::ie::cause::cause;
use pri_pdus::q931::{CallState, IeKind, MsgType, Q931Header, build_message};
use pri_saps::cc::{CcEventInd, PriEvent};
use pri_saps::dl::{DlDataReq, DlLinkInfo};
use pri_saps::{SapMsg, SapMsgInner};

use crate::callcontrol::call::Call;
use crate::error::PriError;
use crate::lapd::ROOT;
use crate::scheduler::{CallTimer, Scheduler, TimerEvent};
use crate::{MessageQueue, PriEntityTrait};

/// Call control's view of one data link
#[derive(Debug, Clone)]
pub struct CcLink {
    pub info: DlLinkInfo,
    /// Last call reference handed out on this link
    pub cref: u16,
    /// Multiple frame operation established
    pub up: bool,
    pub rx_count: u64,
    pub tx_count: u64,
}

impl CcLink {
    fn new(info: DlLinkInfo) -> Self {
        Self { info, cref: 1, up: false, rx_count: 0, tx_count: 0 }
    }
}

/// Q.931 entity. Owns the call pool of the D-channel and runs the call state
/// machine for every link Q.921 announces.
pub struct CallControl {
    pub(super) config: SharedConfig,
    pub(super) links: BTreeMap<InstanceId, CcLink>,
    pub(super) calls: BTreeMap<CallRef, Call>,
    pub(super) invoke_id: u8,
}

impl CallControl {
    pub fn new(config: SharedConfig) -> Self {
        Self { config, links: BTreeMap::new(), calls: BTreeMap::new(), invoke_id: 0 }
    }

    pub fn link(&self, inst: InstanceId) -> Option<&CcLink> {
        self.links.get(&inst)
    }

    pub fn links(&self) -> impl Iterator<Item = &CcLink> {
        self.links.values()
    }

    pub fn call(&self, cr: CallRef) -> Option<&Call> {
        self.calls.get(&cr)
    }

    pub fn calls(&self) -> impl Iterator<Item = &Call> {
        self.calls.values()
    }

    pub(super) fn call_mut(&mut self, cr: CallRef) -> Result<&mut Call, PriError> {
        self.calls.get_mut(&cr).ok_or(PriError::NoSuchCall(cr))
    }

    pub(super) fn debug(&self, flag: u32) -> bool {
        self.config.debug().has(flag)
    }

    pub(super) fn trace_state(&self) -> bool {
        self.debug(DebugFlags::Q931_STATE)
    }

    pub(super) fn set_state(&mut self, cr: CallRef, ours: CallState, peer: Option<CallState>) {
        let trace = self.trace_state();
        if let Some(call) = self.calls.get_mut(&cr) {
            call.set_our_state(ours, trace);
            if let Some(peer) = peer {
                call.peer_state = peer;
            }
        }
    }

    pub(super) fn next_invoke_id(&mut self) -> u8 {
        self.invoke_id = if self.invoke_id >= 0x7f { 1 } else { self.invoke_id + 1 };
        self.invoke_id
    }

    /// Element coding context for messages on `inst`
    pub(super) fn ie_context(&self, inst: InstanceId, msg_type: u8, our_state: CallState) -> Option<IeContext> {
        let link = self.links.get(&inst)?;
        let state = self.config.state_read();
        let mut ctx = IeContext::new(link.info.switch, link.info.node);
        ctx.bri = link.info.bri;
        ctx.gr303_sub = link.info.gr303_master;
        ctx.msg_type = msg_type;
        ctx.overlapdial = state.overlapdial;
        ctx.nsf = state.nsf;
        ctx.our_state = our_state as u8;
        Some(ctx)
    }

    pub(super) fn emit(queue: &mut MessageQueue, event: PriEvent) {
        queue.push_back(SapMsg::new(
            Sap::CcSap,
            PriEntity::CallControl,
            PriEntity::Host,
            SapMsgInner::CcEventInd(CcEventInd { event }),
        ));
    }

    /// Link outgoing calls are placed on. A BRI terminal signals on its TEI
    /// subchannel, everything else on the D-channel itself.
    pub(super) fn outbound_link(&self) -> Option<InstanceId> {
        let root = self.links.get(&ROOT)?;
        if root.info.bri {
            if let Some(sub) = self.links.values().find(|l| l.info.master == Some(ROOT)) {
                return Some(sub.info.inst);
            }
        }
        Some(ROOT)
    }

    /// Allocates a call reference for an outgoing call
    pub fn new_call(&mut self) -> Result<CallRef, PriError> {
        let inst = self.outbound_link().ok_or(PriError::InvalidArgument("no data link for new calls"))?;
        let Some(link) = self.links.get_mut(&inst) else {
            return Err(PriError::InvalidArgument("no data link for new calls"));
        };
        let max: u16 = if link.info.bri { 127 } else { 32767 };
        let mut cref = link.cref;
        for _ in 0..max {
            cref += 1;
            if cref > max {
                cref = 1;
            }
            let cr = cref | 0x8000;
            if !self.calls.contains_key(&cr) {
                link.cref = cref;
                let call = Call::new(cr, inst);
                self.calls.insert(cr, call);
                if self.trace_state() {
                    tracing::debug!("-- Making new call for cr {} on {}", cr, inst);
                }
                return Ok(cr);
            }
        }
        tracing::error!("All call references in use on {}", inst);
        Err(PriError::InvalidArgument("no free call reference"))
    }

    /// User-user information for the next message of the call
    pub fn set_useruser(&mut self, cr: CallRef, info: &str) -> Result<(), PriError> {
        self.call_mut(cr)?.info.useruserinfo = info.to_string();
        Ok(())
    }

    /// Moves a call to another call reference value, as GR-303 assigns them. Returns the new reference.
    pub fn set_crv(&mut self, sched: &mut Scheduler, cr: CallRef, crv: u16, callmode: u8) -> Result<CallRef, PriError> {
        let mut call = self.calls.remove(&cr).ok_or(PriError::NoSuchCall(cr))?;
        let old = call.cr;
        call.set_crv(crv, callmode);
        if call.cr != old && self.calls.contains_key(&call.cr) {
            let taken = call.cr;
            call.cr = old;
            self.calls.insert(old, call);
            return Err(PriError::Incompatible(if taken & 0x7fff == 0 { "dummy call reference" } else { "call reference in use" }));
        }
        // Timers are keyed by call reference
        if let Some(h) = call.retranstimer.take() {
            sched.schedule_del(h);
        }
        let new = call.cr;
        self.calls.insert(new, call);
        Ok(new)
    }

    /// Looks up the call a received message refers to, creating it when unknown
    pub(super) fn getcall(&mut self, cr: CallRef, inst: InstanceId) -> &mut Call {
        let trace = self.trace_state();
        self.calls.entry(cr).or_insert_with(|| {
            if trace {
                tracing::debug!("-- Making new call for cr {} on {}", cr, inst);
            }
            Call::new(cr, inst)
        })
    }

    pub fn destroy_call(&mut self, sched: &mut Scheduler, cr: CallRef) {
        let Some(mut call) = self.calls.remove(&cr) else {
            tracing::error!("Can't destroy call {}!", cr);
            return;
        };
        if let Some(h) = call.retranstimer.take() {
            sched.schedule_del(h);
        }
        if let Some(other) = call.bridged_call.and_then(|b| self.calls.get_mut(&b)) {
            other.bridged_call = None;
        }
        if self.trace_state() {
            tracing::debug!(
                "NEW_HANGUP DEBUG: Destroying the call, ourstate {}, peerstate {}",
                call.our_state,
                call.peer_state
            );
        }
    }

    /// Replaces the retransmission timer of a call. A disabled timer leaves the call without one.
    pub(super) fn start_timer(&mut self, sched: &mut Scheduler, cr: CallRef, timer: CallTimer, idx: TimerIdx) {
        let delay = self.config.state_read().timers.delay_ms(idx);
        self.start_timer_ms(sched, cr, timer, delay);
    }

    pub(super) fn start_timer_ms(&mut self, sched: &mut Scheduler, cr: CallRef, timer: CallTimer, delay: Option<u64>) {
        let Some(call) = self.calls.get_mut(&cr) else {
            return;
        };
        if let Some(h) = call.retranstimer.take() {
            sched.schedule_del(h);
        }
        if let Some(delay) = delay {
            call.retranstimer = sched.schedule_event(delay, TimerEvent::Call { cr, timer }, call.inst).ok();
        }
    }

    pub(super) fn stop_timer(&mut self, sched: &mut Scheduler, cr: CallRef) {
        if let Some(h) = self.calls.get_mut(&cr).and_then(|c| c.retranstimer.take()) {
            sched.schedule_del(h);
        }
    }

    /// Encodes a message for a call from an element list
    pub(super) fn encode(&mut self, cr: CallRef, msg: MsgType, ies: &[IeKind]) -> Result<Vec<u8>, PriError> {
        let (inst, our_state, forceinvert) = {
            let call = self.call_mut(cr)?;
            (call.inst, call.our_state, call.forceinvert)
        };
        let Some(info) = self.links.get(&inst).map(|l| l.info) else {
            tracing::error!("Call {} refers to {} which is gone", cr, inst);
            return Err(PriError::InvalidArgument("call on a removed link"));
        };
        let Some(ctx) = self.ie_context(inst, msg as u8, our_state) else {
            return Err(PriError::InvalidArgument("call on a removed link"));
        };
        let header = Q931Header::for_call(info.protodisc, cr, forceinvert, info.bri, info.gr303_master);
        let call = self.call_mut(cr)?;
        match build_message(&header, msg as u8, ies, &ctx, &mut call.info) {
            Ok(payload) => {
                call.info.apdus.retain(|a| !a.sent);
                Ok(payload)
            }
            Err(e) => {
                tracing::error!("!! Unable to add IE to {}: {}", msg.name(), e);
                Err(e.into())
            }
        }
    }

    /// Hands an encoded message to Q.921
    pub(super) fn xmit(&mut self, queue: &mut MessageQueue, inst: InstanceId, cr: Option<CallRef>, payload: Vec<u8>) {
        if self.debug(DebugFlags::Q931_DUMP) {
            for line in dump_message(&payload, true) {
                tracing::debug!("{}", line);
            }
        }
        if let Some(link) = self.links.get_mut(&inst) {
            link.tx_count += 1;
        }
        queue.push_back(SapMsg::new(
            Sap::DlSap,
            PriEntity::CallControl,
            PriEntity::Lapd,
            SapMsgInner::DlDataReq(DlDataReq { inst, cr, payload }),
        ));
    }

    pub(super) fn send_message(&mut self, queue: &mut MessageQueue, cr: CallRef, msg: MsgType, ies: &[IeKind]) -> Result<(), PriError> {
        let payload = self.encode(cr, msg, ies)?;
        let call = self.call_mut(cr)?;
        call.acked = true;
        let inst = call.inst;
        self.xmit(queue, inst, Some(cr), payload);
        Ok(())
    }

    /// Clears a call without any message from the peer. Reports HANGUP to the
    /// application while it holds the call, HANGUP_ACK when one is owed.
    pub(super) fn internal_clear(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, cr: CallRef) {
        self.stop_timer(sched, cr);
        let trace = self.trace_state();
        let Ok(call) = self.call_mut(cr) else {
            tracing::debug!("Call {} already gone, nothing to clear", cr);
            return;
        };
        call.info.sugcallstate = None;
        call.set_our_state(CallState::Null, trace);
        call.peer_state = CallState::Null;
        let ev = call.hangup_event();
        let cause = call.event_cause();
        if call.alive {
            call.alive = false;
            Self::emit(queue, PriEvent::Hangup(ev));
            return;
        }
        if call.sendhangupack {
            Self::emit(queue, PriEvent::HangupAck(ev));
        }
        if let Err(e) = self.hangup(queue, sched, cr, cause) {
            tracing::warn!("Clearing call {} failed: {}, dropping it", cr, e);
            if self.calls.contains_key(&cr) {
                self.destroy_call(sched, cr);
            }
        }
    }

    fn rx_dl_data(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, link: DlLinkInfo, payload: Vec<u8>) {
        if !self.links.contains_key(&link.inst) {
            self.links.insert(link.inst, CcLink::new(link));
        }
        self.receive(queue, sched, link, &payload);
    }

    fn rx_link_up(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, link: DlLinkInfo) {
        self.links.entry(link.inst).or_insert_with(|| CcLink::new(link)).up = true;
        if self.config.state_read().timers.delay_ms(TimerIdx::T309).is_none() {
            return;
        }
        tracing::info!("{}: link is UP", link.inst);
        let held: Vec<CallRef> = self
            .calls
            .values()
            .filter(|c| c.inst == link.inst && c.our_state == CallState::Active && c.retranstimer.is_some())
            .map(|c| c.cr)
            .collect();
        for cr in held {
            self.stop_timer(sched, cr);
            if self.trace_state() {
                tracing::debug!("cancel T309 for call {}", cr);
            }
            if let Err(e) = self.status(queue, cr, cause::NORMAL_UNSPECIFIED) {
                tracing::warn!("STATUS for call {} after link recovery failed: {}", cr, e);
            }
        }
    }

    fn rx_link_down(&mut self, sched: &mut Scheduler, link: DlLinkInfo) {
        if let Some(l) = self.links.get_mut(&link.inst) {
            l.up = false;
        }
        if self.config.state_read().timers.delay_ms(TimerIdx::T309).is_none() {
            return;
        }
        tracing::info!("{}: link is DOWN", link.inst);
        let affected: Vec<(CallRef, CallState, bool)> = self
            .calls
            .values()
            .filter(|c| c.inst == link.inst)
            .map(|c| (c.cr, c.our_state, c.retranstimer.is_some()))
            .collect();
        for (cr, state, timer_running) in affected {
            match state {
                CallState::Active => {
                    if !timer_running {
                        tracing::info!("activate T309 for call {}", cr);
                        self.start_timer(sched, cr, CallTimer::T309, TimerIdx::T309);
                    }
                }
                CallState::Null => {}
                other => {
                    tracing::info!("cancel call {} in state {} ({})", cr, other as u8, other);
                    self.start_timer_ms(sched, cr, CallTimer::DlDownCancel, Some(0));
                }
            }
        }
    }

    /// The link is gone for good, with every call on it
    fn rx_link_removed(&mut self, sched: &mut Scheduler, inst: InstanceId) {
        self.links.remove(&inst);
        let gone: Vec<CallRef> = self.calls.values().filter(|c| c.inst == inst).map(|c| c.cr).collect();
        for cr in gone {
            tracing::debug!("Dropping call {} of removed {}", cr, inst);
            self.destroy_call(sched, cr);
        }
    }

    fn call_timer_expired(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, cr: CallRef, timer: CallTimer) {
        let trace = self.trace_state();
        let Some(call) = self.calls.get_mut(&cr) else {
            tracing::debug!("{:?} for a call that is gone", timer);
            return;
        };
        // The slot is already free and may have been handed out again
        call.retranstimer = None;

        let res = match timer {
            CallTimer::T303 => {
                if !call.t303_expired {
                    call.t303_expired = true;
                    if trace {
                        tracing::debug!("T303 timed out, resending SETUP");
                    }
                    let inst = call.inst;
                    if let Some(setup) = call.setup_msg.clone() {
                        self.xmit(queue, inst, Some(cr), setup);
                    }
                    self.start_timer(sched, cr, CallTimer::T303, TimerIdx::T303);
                } else {
                    if trace {
                        tracing::debug!("T303 timed out again, clearing the call");
                    }
                    call.info.cause = pri_pdus::q931::ie::CauseInfo::new(cause::RECOVERY_ON_TIMER_EXPIRE);
                    self.internal_clear(queue, sched, cr);
                }
                Ok(())
            }
            CallTimer::T305 => {
                if trace {
                    tracing::debug!("Timed out looking for release");
                }
                call.alive = true;
                self.release(queue, sched, cr, cause::NORMAL_CLEARING as i32)
            }
            CallTimer::T308 => {
                if trace {
                    tracing::debug!("Timed out looking for release complete");
                }
                call.t308_timedout += 1;
                call.alive = true;
                let cause = call.event_cause();
                self.release(queue, sched, cr, cause)
            }
            CallTimer::T308Final => {
                if trace {
                    tracing::debug!("Final time-out looking for release complete");
                }
                call.alive = true;
                call.t308_timedout += 1;
                call.set_our_state(CallState::Null, trace);
                call.peer_state = CallState::Null;
                let ev = call.hangup_event();
                let cause = call.event_cause();
                Self::emit(queue, PriEvent::HangupAck(ev));
                self.hangup(queue, sched, cr, cause)
            }
            CallTimer::T313 => {
                if trace {
                    tracing::debug!("Timed out looking for connect acknowledge");
                }
                self.disconnect(queue, sched, cr, cause::NORMAL_CLEARING as i32)
            }
            CallTimer::T309 | CallTimer::DlDownCancel => {
                if trace {
                    if timer == CallTimer::T309 {
                        tracing::debug!("Timed out waiting for data link re-establishment");
                    } else {
                        tracing::debug!("Cancel non active call after data link failure");
                    }
                }
                call.info.cause = pri_pdus::q931::ie::CauseInfo::new(cause::DESTINATION_OUT_OF_ORDER);
                call.aoc_units = -1;
                self.internal_clear(queue, sched, cr);
                Ok(())
            }
        };
        if let Err(e) = res {
            tracing::warn!("{:?} handling for call {} failed: {}", timer, cr, e);
        }
    }
}

impl PriEntityTrait for CallControl {
    fn entity(&self) -> PriEntity {
        PriEntity::CallControl
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, message: SapMsg) {
        tracing::trace!("rx_prim: {}", message.msg);
        match message.msg {
            SapMsgInner::DlAssignInd(prim) => {
                tracing::debug!("<- DL-ASSIGN {} (tei {})", prim.link.inst, prim.link.tei);
                let link = self.links.entry(prim.link.inst).or_insert_with(|| CcLink::new(prim.link));
                link.info = prim.link;
            }
            SapMsgInner::DlRemoveInd(prim) => self.rx_link_removed(sched, prim.inst),
            SapMsgInner::DlEstablishInd(prim) => self.rx_link_up(queue, sched, prim.link),
            SapMsgInner::DlReleaseInd(prim) => self.rx_link_down(sched, prim.link),
            SapMsgInner::DlDataInd(prim) => self.rx_dl_data(queue, sched, prim.link, prim.payload),
            SapMsgInner::DlUnitdataInd(prim) => self.rx_dl_data(queue, sched, prim.link, prim.payload),
            other => tracing::warn!("CallControl: unexpected primitive {} from {:?}", other, message.src),
        }
    }

    fn rx_timer(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, event: TimerEvent) {
        let TimerEvent::Call { cr, timer } = event else {
            tracing::warn!("CallControl: foreign timer {}", event);
            return;
        };
        self.call_timer_expired(queue, sched, cr, timer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pri_config::InterfaceKind;
    use pri_core::{ManualClock, NodeType, SwitchType, protodisc, sapi, tei};

    fn link(inst: usize, master: Option<usize>, bri: bool) -> DlLinkInfo {
        DlLinkInfo {
            inst: InstanceId(inst),
            master: master.map(InstanceId),
            node: NodeType::Cpe,
            switch: SwitchType::Ni2,
            bri,
            sapi: sapi::CALL_CTRL,
            tei: if master.is_some() { 64 } else { tei::PRI },
            protodisc: protodisc::Q931,
            gr303_master: false,
        }
    }

    fn cc_with(links: &[DlLinkInfo]) -> CallControl {
        let mut cc = CallControl::new(SharedConfig::new(NodeType::Cpe, SwitchType::Ni2, InterfaceKind::Pri));
        for l in links {
            cc.links.insert(l.inst, CcLink::new(*l));
        }
        cc
    }

    #[test]
    fn call_references_skip_those_in_use() {
        let mut cc = cc_with(&[link(0, None, false)]);
        let a = cc.new_call().unwrap();
        assert_eq!(a, 0x8002);
        cc.calls.insert(0x8003, Call::new(0x8003, ROOT));
        let b = cc.new_call().unwrap();
        assert_eq!(b, 0x8004);
    }

    #[test]
    fn bri_call_references_wrap_at_127() {
        let mut cc = cc_with(&[link(0, None, true), link(1, Some(0), true)]);
        cc.links.get_mut(&InstanceId(1)).unwrap().cref = 126;
        assert_eq!(cc.new_call().unwrap(), 0x8000 | 127);
        assert_eq!(cc.new_call().unwrap(), 0x8000 | 1);
        // Terminals place calls on their TEI link
        assert!(cc.calls().all(|c| c.inst == InstanceId(1)));
    }

    #[test]
    fn no_link_no_call() {
        let mut cc = cc_with(&[]);
        assert!(matches!(cc.new_call(), Err(PriError::InvalidArgument(_))));
    }

    #[test]
    fn removed_link_takes_its_calls() {
        let mut cc = cc_with(&[link(0, None, true), link(1, Some(0), true)]);
        let mut sched = Scheduler::new(Box::new(ManualClock::new()), ROOT);
        let cr = cc.new_call().unwrap();
        cc.start_timer(&mut sched, cr, CallTimer::T303, TimerIdx::T303);
        assert!(sched.schedule_next().is_some());
        cc.rx_link_removed(&mut sched, InstanceId(1));
        assert!(cc.call(cr).is_none());
        assert!(sched.schedule_next().is_none());
    }

    #[test]
    fn clearing_a_gone_call_is_harmless() {
        let mut cc = cc_with(&[link(0, None, false)]);
        let mut sched = Scheduler::new(Box::new(ManualClock::new()), ROOT);
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        cc.destroy_call(&mut sched, cr);

        cc.internal_clear(&mut queue, &mut sched, cr);
        assert!(cc.calls().next().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn cleared_call_owing_an_ack_leaves_the_pool() {
        let mut cc = cc_with(&[link(0, None, false)]);
        let mut sched = Scheduler::new(Box::new(ManualClock::new()), ROOT);
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        cc.call_mut(cr).unwrap().sendhangupack = true;
        cc.start_timer(&mut sched, cr, CallTimer::T303, TimerIdx::T303);
        cc.links.clear();

        cc.internal_clear(&mut queue, &mut sched, cr);
        assert!(cc.call(cr).is_none());
        assert!(sched.schedule_next().is_none());
        let ev = queue.pop_front().map(|m| m.msg);
        assert!(matches!(ev, Some(SapMsgInner::CcEventInd(CcEventInd { event: PriEvent::HangupAck(_) }))), "{:?}", ev);
    }

    #[test]
    fn crv_moves_the_call() {
        let mut cc = cc_with(&[link(0, None, false)]);
        let mut sched = Scheduler::new(Box::new(ManualClock::new()), ROOT);
        let a = cc.new_call().unwrap();
        let b = cc.new_call().unwrap();
        let moved = cc.set_crv(&mut sched, a, 40, 2).unwrap();
        assert_eq!(moved, (40 << 3) | 2);
        assert!(cc.call(a).is_none());
        assert_eq!(cc.call(moved).unwrap().crv(), (40, 2));
        let (crv, mode) = cc.call(moved).unwrap().crv();
        assert!(matches!(cc.set_crv(&mut sched, b, crv, mode), Err(PriError::Incompatible(_))));
        assert!(cc.call(b).is_some());
        assert!(matches!(cc.set_useruser(0x8100, "x"), Err(PriError::NoSuchCall(0x8100))));
    }

    #[test]
    fn invoke_ids_stay_positive() {
        let mut cc = cc_with(&[]);
        cc.invoke_id = 0x7e;
        assert_eq!(cc.next_invoke_id(), 0x7f);
        assert_eq!(cc.next_invoke_id(), 1);
    }
}

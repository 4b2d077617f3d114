//! Received Q.931 messages: element walk, mandatory element checks and the
//! per-message state machine that turns messages into application events.

use pri_core::{CallRef, DebugFlags, NodeType, SwitchType, protodisc};
use pri_pdus::q931::dump::dump_message;
use pri_pdus::q931::ie::cause::cause;
use pri_pdus::q931::ie::progress::prog_mask;
use pri_pdus::q931::ie::{CallInfo, CauseInfo, ChanFlags, ProgressInfo, can_receive, receive_ie};
use pri_pdus::q931::{
    CallState, IeKind, MAINT_SERVICE, MAINT_SERVICE_ACKNOWLEDGE, MsgType, Q931Message, WalkEvent, msg_name,
};
use pri_saps::cc::{
    EvAnswer, EvFacname, EvKeypadDigit, EvNotify, EvProceeding, EvRestart, EvRing, EvSetupAck, PriEvent,
};
use pri_saps::dl::DlLinkInfo;

use crate::MessageQueue;
use crate::callcontrol::call::Call;
use crate::callcontrol::cc_entity::CallControl;
use crate::error::PriError;
use crate::scheduler::Scheduler;

/// Dummy call reference of a RESTART we originate
const DUMMY_OUTBOUND: CallRef = 0x8000;

/// Dummy call reference used by RESTART
fn is_dummy(cr: CallRef) -> bool {
    cr & 0x7fff == 0
}

fn ring_event(call: &mut Call) -> EvRing {
    let info = &mut call.info;
    EvRing {
        channel: info.channel.event_channel(),
        callingpres: info.callerpres as i32,
        callingplanani: info.callerplanani as i32,
        callingplan: info.callerplan as i32,
        callingani: info.callerani.clone(),
        callingnum: info.callernum.clone(),
        callingname: info.callername.clone(),
        calledplan: info.calledplan as i32,
        ani2: info.ani2,
        callednum: info.callednum.clone(),
        redirectingnum: info.redirectingnum.clone(),
        redirectingname: info.redirectingname.clone(),
        redirectingreason: info.redirectingreason as i32,
        callingplanrdnis: info.redirectingplan as i32,
        useruserinfo: std::mem::take(&mut info.useruserinfo),
        flexible: info.channel.flags != ChanFlags::Exclusive,
        cref: call.cr as i32,
        ctype: info.bearer.transcapability as i32,
        layer1: info.bearer.userl1.map_or(-1, |l| l as i32),
        complete: info.complete,
        call: call.cr,
        callingsubaddr: info.callingsubaddr.clone(),
        progress: if info.progress.mask == 0 { -1 } else { info.progress.progress as i32 },
        progressmask: info.progress.mask as i32,
        origcalledname: info.origcalledname.clone(),
        origcallednum: info.origcallednum.clone(),
        callingplanorigcalled: info.origcalledplan.map_or(-1, |p| p as i32),
        origredirectingreason: info.origredirectingreason.map_or(-1, |r| r as i32),
    }
}

fn answer_event(call: &mut Call) -> EvAnswer {
    EvAnswer {
        channel: call.event_channel(),
        cref: call.cr as i32,
        progress: call.event_progress(),
        progressmask: call.info.progress.mask as i32,
        call: call.cr,
        useruserinfo: std::mem::take(&mut call.info.useruserinfo),
    }
}

fn proceeding_event(call: &Call, cause: i32) -> EvProceeding {
    EvProceeding {
        channel: call.event_channel(),
        cref: call.cr as i32,
        progress: call.event_progress(),
        progressmask: call.info.progress.mask as i32,
        cause,
        call: call.cr,
    }
}

/// Fields a message overwrites, cleared before its elements are decoded.
/// Returns false for message types we don't handle.
fn pre_clear(call: &mut Call, msg: MsgType) -> bool {
    let info = &mut call.info;
    match msg {
        MsgType::Restart => {
            info.channel.channelno = None;
            info.channel.slotmap = None;
            info.channel.flags = ChanFlags::None;
            info.channel.ds1no = 0;
            info.channel.ds1explicit = false;
            info.ri = 0;
        }
        MsgType::Facility => info.callername.clear(),
        MsgType::Setup => {
            let apdus = std::mem::take(&mut info.apdus);
            *info = CallInfo { apdus, ..CallInfo::default() };
            call.aoc_units = -1;
        }
        MsgType::Connect | MsgType::Alerting | MsgType::Progress => {
            info.useruserinfo.clear();
            info.cause = CauseInfo::default();
            info.progress = ProgressInfo::default();
        }
        MsgType::CallProceeding => info.progress = ProgressInfo::default(),
        MsgType::Release | MsgType::Disconnect => {
            info.cause = CauseInfo::default();
            info.useruserinfo.clear();
            call.aoc_units = -1;
        }
        MsgType::ReleaseComplete | MsgType::Status => {
            info.useruserinfo.clear();
            info.cause = CauseInfo::default();
            info.sugcallstate = None;
            call.aoc_units = -1;
        }
        MsgType::RestartAcknowledge => info.channel.channelno = None,
        MsgType::Information => info.callednum.clear(),
        MsgType::ConnectAcknowledge | MsgType::StatusEnquiry | MsgType::SetupAcknowledge | MsgType::Notify => {}
        _ => return false,
    }
    true
}

/// Messages whose arrival stops the running retransmission timer
fn stops_timer(msg: MsgType, our_state: CallState) -> bool {
    match msg {
        MsgType::ConnectAcknowledge | MsgType::Release | MsgType::Disconnect | MsgType::ReleaseComplete => true,
        // Any answer to our SETUP ends T303
        MsgType::CallProceeding
        | MsgType::Alerting
        | MsgType::Connect
        | MsgType::SetupAcknowledge
        | MsgType::Progress
        | MsgType::Status => our_state == CallState::CallInitiated,
        _ => false,
    }
}

impl CallControl {
    /// Processes one Q.931 message received on `link`
    pub(super) fn receive(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, link: DlLinkInfo, payload: &[u8]) {
        let msg = match Q931Message::from_bytes(payload) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("Received undecodable Q.931 message on {}: {}", link.inst, e);
                return;
            }
        };

        match msg.header.pd {
            protodisc::ATT_MAINTENANCE | protodisc::NEW_ATT_MAINTENANCE => {
                self.maintenance(queue, link, &msg, payload);
                return;
            }
            pd if pd != link.protodisc => {
                tracing::warn!(
                    "Warning: unknown/inappropriate protocol discriminator received (0x{:02x}/{}), expected 0x{:02x}",
                    pd,
                    pd,
                    link.protodisc
                );
                return;
            }
            _ => {}
        }

        if let Some(l) = self.links.get_mut(&link.inst) {
            l.rx_count += 1;
        }
        if self.debug(DebugFlags::Q931_DUMP) {
            for line in dump_message(payload, false) {
                tracing::debug!("{}", line);
            }
        }

        let cr = msg.header.call_ref();
        if let Err(e) = self.process(queue, sched, link, &msg, cr) {
            tracing::warn!("Processing {} for call {} failed: {}", msg_name(msg.msg_type, false), cr, e);
        }
    }

    /// SERVICE is echoed back as SERVICE ACKNOWLEDGE, anything else on the maintenance
    /// discriminators is dropped
    fn maintenance(&mut self, queue: &mut MessageQueue, link: DlLinkInfo, msg: &Q931Message, payload: &[u8]) {
        if msg.msg_type != MAINT_SERVICE {
            tracing::warn!("Ignoring maintenance message 0x{:02x} on {}", msg.msg_type, link.inst);
            return;
        }
        let mut echo = payload.to_vec();
        echo[msg.msg_type_offset()] = MAINT_SERVICE_ACKNOWLEDGE;
        if self.debug(DebugFlags::Q931_STATE) {
            tracing::debug!("Acknowledging maintenance SERVICE on {}", link.inst);
        }
        self.xmit(queue, link.inst, None, echo);
    }

    fn process(
        &mut self,
        queue: &mut MessageQueue,
        sched: &mut Scheduler,
        link: DlLinkInfo,
        msg: &Q931Message,
        cr: CallRef,
    ) -> Result<(), PriError> {
        let call = self.getcall(cr, link.inst);
        let newcall = call.newcall;
        let our_state = call.our_state;
        let known = MsgType::try_from(msg.msg_type as u64).ok().filter(|mt| pre_clear(call, *mt));
        let Some(mt) = known else {
            tracing::error!("!! Don't know how to pre-handle message type {} (0x{:02x})", msg_name(msg.msg_type, false), msg.msg_type);
            self.status(queue, cr, cause::MESSAGE_TYPE_NONEXIST)?;
            if newcall {
                self.destroy_call(sched, cr);
            }
            return Ok(());
        };
        if stops_timer(mt, our_state) {
            self.stop_timer(sched, cr);
        }

        let facilities = match self.walk_elements(link, msg, mt, cr, our_state) {
            Some(walk) => walk,
            // Message longer than it should be, nothing more to do
            None => return Ok(()),
        };
        let (missing, facilities) = facilities;
        for data in facilities {
            self.handle_facility(queue, cr, link, &data);
        }
        self.post_handle(queue, sched, link, mt, cr, newcall, missing)
    }

    /// Decodes the elements into the call. Returns whether a mandatory element is
    /// missing and the contents of the Facility elements for ROSE.
    fn walk_elements(
        &mut self,
        link: DlLinkInfo,
        msg: &Q931Message,
        mt: MsgType,
        cr: CallRef,
        our_state: CallState,
    ) -> Option<(bool, Vec<Vec<u8>>)> {
        let ctx = self.ie_context(link.inst, msg.msg_type, our_state)?;
        let anomaly = self.debug(DebugFlags::Q931_ANOMALY);
        let dump = self.debug(DebugFlags::Q931_DUMP);
        let call = self.calls.get_mut(&cr)?;

        let mut mandatory: Vec<IeKind> = mt.mandatory_ies().to_vec();
        let mut facilities = Vec::new();
        // Codeset 0 elements below 0x10 that could not be handled, by name
        let mut broken: Vec<String> = Vec::new();

        for ev in msg.walk() {
            match ev {
                Err(e) => {
                    tracing::error!("XXX Message longer than it should be?? XXX ({})", e);
                    return None;
                }
                Ok(WalkEvent::InvalidLockingShift) => tracing::error!("!! Invalid locking shift to codeset 0 !!"),
                Ok(WalkEvent::LockingShift { from, to, after_non_locking }) => {
                    if anomaly && after_non_locking {
                        tracing::warn!("XXX Locking shift immediately follows non-locking shift ({} -> {}) XXX", from, to);
                    }
                    if anomaly && to < from {
                        tracing::warn!("!! Locking shift to lower codeset ({} -> {})", from, to);
                    }
                }
                Ok(WalkEvent::NonLockingShift { .. }) => {}
                Ok(WalkEvent::Ie { ie, temporary, out_of_order }) => {
                    if anomaly && out_of_order {
                        tracing::warn!("XXX Out-of-order IE {} at codeset {} XXX", ie.id, ie.codeset);
                    }
                    let kind = ie.kind();
                    if let Some(k) = kind {
                        mandatory.retain(|m| m.full_id() != k.full_id());
                    }
                    if temporary && matches!(link.switch, SwitchType::Lucent5e | SwitchType::Att4ess) {
                        if dump {
                            tracing::debug!("Ignoring element 0x{:02x} under non-locking shift", ie.id);
                        }
                        continue;
                    }
                    let handled = match kind {
                        Some(IeKind::Facility | IeKind::FacilityCs6) => {
                            facilities.push(ie.data);
                            true
                        }
                        Some(k) if can_receive(k) => match receive_ie(k, &ie.data, &ctx, &mut call.info) {
                            Ok(()) => true,
                            Err(e) => {
                                tracing::warn!("Unable to decode {}: {}", k.name(), e);
                                false
                            }
                        },
                        Some(k) => {
                            tracing::debug!("!! Don't know how to handle IE {}", k.name());
                            false
                        }
                        None => {
                            tracing::debug!("!! Unknown IE {} (cs{}, len {})", ie.id, ie.codeset, ie.data.len());
                            false
                        }
                    };
                    if !handled && ie.codeset == 0 && ie.id & 0xf0 == 0 {
                        broken.push(kind.map_or_else(|| format!("0x{:02x}", ie.id), |k| k.name().to_string()));
                    }
                }
            }
        }

        mandatory.retain(|m| match (mt, m) {
            (MsgType::Setup, IeKind::ChannelIdent) => link.node != NodeType::Network,
            (MsgType::Progress, IeKind::ProgressIndicator) => false,
            _ => true,
        });
        let missing: Vec<String> = mandatory.iter().map(|m| m.name().to_string()).chain(broken).collect();
        for name in &missing {
            tracing::warn!("XXX Missing handling for mandatory IE {} XXX", name);
        }
        Some((!missing.is_empty(), facilities))
    }

    /// Sends FACILITY when APDUs are queued for it
    fn flush_facility(&mut self, queue: &mut MessageQueue, cr: CallRef) -> Result<(), PriError> {
        let pending = self
            .calls
            .get(&cr)
            .is_some_and(|c| c.info.apdus.iter().any(|a| !a.sent && a.message == MsgType::Facility as u8));
        if pending { self.facility(queue, cr) } else { Ok(()) }
    }

    #[allow(clippy::too_many_arguments)]
    fn post_handle(
        &mut self,
        queue: &mut MessageQueue,
        sched: &mut Scheduler,
        link: DlLinkInfo,
        mt: MsgType,
        cr: CallRef,
        newcall: bool,
        missing: bool,
    ) -> Result<(), PriError> {
        let trace = self.trace_state();
        let inband_disconnect = self.config.state_read().inband_disconnect;

        // A message other than SETUP for a call we never heard of
        if newcall
            && matches!(
                mt,
                MsgType::Alerting
                    | MsgType::Connect
                    | MsgType::Facility
                    | MsgType::CallProceeding
                    | MsgType::ConnectAcknowledge
                    | MsgType::Disconnect
                    | MsgType::Information
                    | MsgType::StatusEnquiry
                    | MsgType::SetupAcknowledge
            )
        {
            return self.release_complete(queue, sched, cr, cause::INVALID_CALL_REFERENCE as i32);
        }

        match mt {
            MsgType::Restart => {
                if missing {
                    self.status(queue, cr, cause::MANDATORY_IE_MISSING)?;
                    self.destroy_call(sched, cr);
                    return Ok(());
                }
                if trace {
                    tracing::debug!("-- Processing Q.931 Restart");
                }
                self.set_state(cr, CallState::Restart, Some(CallState::RestartRequest));
                let channel = self.call_mut(cr)?.event_channel();
                let acked = self.restart_ack(queue, cr);
                Self::emit(queue, PriEvent::Restart(EvRestart { channel }));
                if is_dummy(cr) {
                    self.destroy_call(sched, cr);
                }
                acked
            }
            MsgType::Setup => {
                if missing {
                    return self.release_complete(queue, sched, cr, cause::MANDATORY_IE_MISSING as i32);
                }
                let call = self.call_mut(cr)?;
                // SETUP for a call in progress
                if !call.newcall {
                    return Ok(());
                }
                if trace {
                    tracing::debug!("-- Processing Q.931 Call Setup");
                }
                if call.info.progress.mask & prog_mask::CALLER_NOT_ISDN != 0 {
                    call.info.nonisdn = true;
                }
                call.newcall = false;
                call.set_our_state(CallState::CallPresent, trace);
                call.peer_state = CallState::CallInitiated;
                call.alive = false;
                if !call.info.bearer.is_64k_circuit() {
                    // Bearer capability not implemented
                    return self.release_complete(queue, sched, cr, 65);
                }
                let ev = ring_event(call);
                Self::emit(queue, PriEvent::Ring(Box::new(ev)));
                Ok(())
            }
            MsgType::Alerting => {
                self.set_state(cr, CallState::CallDelivered, Some(CallState::CallReceived));
                let ev = answer_event(self.call_mut(cr)?);
                Self::emit(queue, PriEvent::Ringing(ev));
                self.flush_facility(queue, cr)
            }
            MsgType::Connect => {
                let call = self.call_mut(cr)?;
                if call.our_state == CallState::Active {
                    return self.status(queue, cr, cause::WRONG_CALL_STATE);
                }
                call.set_our_state(CallState::Active, trace);
                call.peer_state = CallState::ConnectRequest;
                let justsignalling = call.info.channel.justsignalling;
                let ev = answer_event(call);
                self.connect_ack(queue, cr)?;
                if justsignalling {
                    // Call independent signalling ends with the connection
                    self.release(queue, sched, cr, cause::NORMAL_CLEARING as i32)
                } else {
                    Self::emit(queue, PriEvent::Answer(ev));
                    Ok(())
                }
            }
            MsgType::Facility => {
                let call = self.call_mut(cr)?;
                let ev = EvFacname {
                    callingname: call.info.callername.clone(),
                    callingnum: call.info.callernum.clone(),
                    channel: call.event_channel(),
                    cref: call.cr as i32,
                    call: call.cr,
                    callingpres: call.info.callerpres as i32,
                    callingplan: call.info.callerplan as i32,
                };
                Self::emit(queue, PriEvent::Facname(ev));
                Ok(())
            }
            MsgType::Progress | MsgType::CallProceeding => {
                if missing {
                    self.status(queue, cr, cause::MANDATORY_IE_MISSING)?;
                    self.destroy_call(sched, cr);
                    return Ok(());
                }
                if newcall {
                    return self.release_complete(queue, sched, cr, cause::INVALID_CALL_REFERENCE as i32);
                }
                let call = self.call_mut(cr)?;
                if !matches!(
                    call.our_state,
                    CallState::CallInitiated
                        | CallState::OverlapSending
                        | CallState::CallDelivered
                        | CallState::OutgoingCallProceeding
                ) {
                    return self.status(queue, cr, cause::WRONG_MESSAGE);
                }
                if mt == MsgType::Progress {
                    let ev = proceeding_event(call, call.event_cause());
                    Self::emit(queue, PriEvent::Progress(ev));
                } else {
                    call.set_our_state(CallState::OutgoingCallProceeding, trace);
                    call.peer_state = CallState::IncomingCallProceeding;
                    let ev = proceeding_event(call, -1);
                    Self::emit(queue, PriEvent::Proceeding(ev));
                }
                self.flush_facility(queue, cr)
            }
            MsgType::ConnectAcknowledge => {
                let call = self.call_mut(cr)?;
                let overlapping_connect = call.our_state == CallState::Active
                    && (link.node == NodeType::Network || link.switch == SwitchType::Qsig);
                if call.our_state != CallState::ConnectRequest && !overlapping_connect {
                    return self.status(queue, cr, cause::WRONG_MESSAGE);
                }
                call.set_our_state(CallState::Active, trace);
                call.peer_state = CallState::Active;
                Ok(())
            }
            MsgType::Status => {
                if missing {
                    self.status(queue, cr, cause::MANDATORY_IE_MISSING)?;
                    self.destroy_call(sched, cr);
                    return Ok(());
                }
                if newcall {
                    if !is_dummy(cr) {
                        return self.release_complete(queue, sched, cr, cause::WRONG_CALL_STATE as i32);
                    }
                    self.destroy_call(sched, cr);
                    return Ok(());
                }
                let anomaly = self.debug(DebugFlags::Q931_ANOMALY);
                let call = self.call_mut(cr)?;
                if anomaly && call.info.cause.value != cause::INTERWORKING {
                    tracing::warn!(
                        "Received unsolicited status: cause {}, remote state {:?}",
                        call.info.cause.value,
                        call.info.sugcallstate
                    );
                }
                if call.info.sugcallstate == Some(CallState::Null as u8) {
                    call.set_our_state(CallState::Null, trace);
                    call.peer_state = CallState::Null;
                    self.peer_cleared(queue, sched, cr)?;
                }
                Ok(())
            }
            MsgType::ReleaseComplete => {
                self.set_state(cr, CallState::Null, Some(CallState::Null));
                self.peer_cleared(queue, sched, cr)
            }
            MsgType::Release => {
                let call = self.call_mut(cr)?;
                if missing {
                    call.info.cause = CauseInfo::new(cause::MANDATORY_IE_MISSING);
                }
                call.peer_state = if call.our_state == CallState::ReleaseRequest {
                    CallState::Null
                } else {
                    CallState::ReleaseRequest
                };
                call.set_our_state(CallState::Null, trace);
                if newcall {
                    return self.release_complete(queue, sched, cr, cause::INVALID_CALL_REFERENCE as i32);
                }
                let ev = call.hangup_event();
                Self::emit(queue, PriEvent::Hangup(ev));
                Ok(())
            }
            MsgType::Disconnect => {
                let call = self.call_mut(cr)?;
                if missing {
                    call.info.cause = CauseInfo::new(cause::MANDATORY_IE_MISSING);
                }
                call.set_our_state(CallState::DisconnectIndication, trace);
                call.peer_state = CallState::DisconnectRequest;
                call.sendhangupack = true;
                // Wait for the application to play the announcement
                if inband_disconnect && call.info.progress.mask & prog_mask::INBAND_AVAILABLE != 0 {
                    return Ok(());
                }
                let ev = call.hangup_event();
                if call.alive {
                    Self::emit(queue, PriEvent::HangupReq(ev));
                    Ok(())
                } else {
                    let cause = call.event_cause();
                    self.hangup(queue, sched, cr, cause)
                }
            }
            MsgType::RestartAcknowledge => {
                self.set_state(cr, CallState::Null, Some(CallState::Null));
                let channel = self.call_mut(cr)?.event_channel();
                Self::emit(queue, PriEvent::RestartAck(EvRestart { channel }));
                if is_dummy(cr) {
                    self.destroy_call(sched, cr);
                    // Our own RESTART went out on the flagged dummy reference
                    if cr != DUMMY_OUTBOUND && self.calls.contains_key(&DUMMY_OUTBOUND) {
                        self.destroy_call(sched, DUMMY_OUTBOUND);
                    }
                }
                Ok(())
            }
            MsgType::Information => {
                let call = self.call_mut(cr)?;
                if call.our_state != CallState::OverlapReceiving {
                    let channel = call.info.channel.channelno.map_or(-1, |c| c as i32) | ((call.info.channel.ds1no as i32) << 8);
                    let ev = EvKeypadDigit { channel, call: cr, digits: std::mem::take(&mut call.info.keypad_digits) };
                    Self::emit(queue, PriEvent::KeypadDigit(ev));
                } else {
                    let ev = EvRing {
                        call: cr,
                        channel: call.event_channel(),
                        callednum: call.info.callednum.clone(),
                        callingsubaddr: call.info.callingsubaddr.clone(),
                        complete: call.info.complete,
                        ..EvRing::default()
                    };
                    Self::emit(queue, PriEvent::InfoReceived(Box::new(ev)));
                }
                Ok(())
            }
            MsgType::StatusEnquiry => self.status(queue, cr, 0),
            MsgType::SetupAcknowledge => {
                self.set_state(cr, CallState::OverlapSending, Some(CallState::OverlapReceiving));
                let channel = self.call_mut(cr)?.event_channel();
                Self::emit(queue, PriEvent::SetupAck(EvSetupAck { channel, call: cr }));
                self.flush_facility(queue, cr)
            }
            MsgType::Notify => {
                let call = self.call_mut(cr)?;
                let ev = EvNotify {
                    channel: call.info.channel.channelno.map_or(-1, |c| c as i32),
                    info: call.info.notify.map_or(-1, |n| n as i32),
                };
                Self::emit(queue, PriEvent::Notify(ev));
                if newcall {
                    self.destroy_call(sched, cr);
                }
                Ok(())
            }
            other => {
                tracing::error!("!! Don't know how to post-handle message type {}", other.name());
                Ok(())
            }
        }
    }

    /// The peer cleared the call. The application hears HANGUP while it holds the
    /// call, HANGUP_ACK when it asked for the clearing itself.
    fn peer_cleared(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, cr: CallRef) -> Result<(), PriError> {
        let call = self.call_mut(cr)?;
        let ev = call.hangup_event();
        let cause = call.event_cause();
        if call.alive {
            call.alive = false;
            Self::emit(queue, PriEvent::Hangup(ev));
            Ok(())
        } else if call.sendhangupack {
            Self::emit(queue, PriEvent::HangupAck(ev));
            self.hangup(queue, sched, cr, cause)
        } else {
            self.hangup(queue, sched, cr, cause)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pri_config::{InterfaceKind, SharedConfig};
    use pri_core::{ManualClock, sapi, tei};
    use pri_pdus::q931::Q931Header;
    use pri_saps::SapMsgInner;

    use crate::callcontrol::cc_entity::CcLink;
    use crate::callcontrol::setup_request::SetupRequest;
    use crate::lapd::ROOT;

    fn link(node: NodeType) -> DlLinkInfo {
        DlLinkInfo {
            inst: ROOT,
            master: None,
            node,
            switch: SwitchType::Ni2,
            bri: false,
            sapi: sapi::CALL_CTRL,
            tei: tei::PRI,
            protodisc: protodisc::Q931,
            gr303_master: false,
        }
    }

    struct Side {
        cc: CallControl,
        link: DlLinkInfo,
        queue: MessageQueue,
        sched: Scheduler,
    }

    impl Side {
        fn new(node: NodeType) -> Self {
            let mut cc = CallControl::new(SharedConfig::new(node, SwitchType::Ni2, InterfaceKind::Pri));
            let link = link(node);
            cc.links.insert(ROOT, CcLink { info: link, cref: 1, up: true, rx_count: 0, tx_count: 0 });
            Self { cc, link, queue: MessageQueue::new(), sched: Scheduler::new(Box::new(ManualClock::new()), ROOT) }
        }

        fn receive(&mut self, payload: &[u8]) {
            self.cc.receive(&mut self.queue, &mut self.sched, self.link, payload);
        }

        /// Drains the queue into Q.931 payloads and events
        fn drain(&mut self) -> (Vec<Vec<u8>>, Vec<PriEvent>) {
            let (mut frames, mut events) = (Vec::new(), Vec::new());
            while let Some(msg) = self.queue.pop_front() {
                match msg.msg {
                    SapMsgInner::DlDataReq(req) => frames.push(req.payload),
                    SapMsgInner::CcEventInd(ind) => events.push(ind.event),
                    _ => {}
                }
            }
            (frames, events)
        }
    }

    fn msg_type(payload: &[u8]) -> u8 {
        Q931Message::from_bytes(payload).unwrap().msg_type
    }

    /// Passes everything `from` sent to `to`
    fn pump(from: &mut Side, to: &mut Side) -> Vec<PriEvent> {
        let (frames, events) = from.drain();
        for f in frames {
            to.receive(&f);
        }
        events
    }

    fn dial(cpe: &mut Side, net: &mut Side) -> (CallRef, CallRef) {
        let cr = cpe.cc.new_call().unwrap();
        let req = SetupRequest::new("5551000", 0x21).channel(3, true, false);
        cpe.cc.setup(&mut cpe.queue, &mut cpe.sched, cr, &req).unwrap();
        pump(cpe, net);
        let (_, events) = net.drain();
        let PriEvent::Ring(ring) = &events[0] else { panic!("expected RING, got {:?}", events) };
        (cr, ring.call)
    }

    #[test]
    fn setup_rings_the_other_side() {
        let mut cpe = Side::new(NodeType::Cpe);
        let mut net = Side::new(NodeType::Network);
        let cr = cpe.cc.new_call().unwrap();
        let req = SetupRequest::new("5551000", 0x21).channel(3, true, false).caller("2000", "", 0x21, 0);
        cpe.cc.setup(&mut cpe.queue, &mut cpe.sched, cr, &req).unwrap();
        pump(&mut cpe, &mut net);
        let (frames, events) = net.drain();
        assert!(frames.is_empty());
        let PriEvent::Ring(ring) = &events[0] else { panic!("expected RING, got {:?}", events) };
        assert_eq!(ring.callednum, "5551000");
        assert_eq!(ring.callingnum, "2000");
        assert_eq!(ring.channel & 0xff, 3);
        assert!(!ring.flexible);
        assert_eq!(ring.call, cr & 0x7fff);
        let call = net.cc.call(ring.call).unwrap();
        assert_eq!(call.our_state, CallState::CallPresent);
        assert_eq!(call.peer_state, CallState::CallInitiated);
    }

    #[test]
    fn call_reaches_active_on_both_sides() {
        let mut cpe = Side::new(NodeType::Cpe);
        let mut net = Side::new(NodeType::Network);
        let (ours, theirs) = dial(&mut cpe, &mut net);

        net.cc.alerting(&mut net.queue, theirs, 3, false).unwrap();
        pump(&mut net, &mut cpe);
        let (_, events) = cpe.drain();
        assert!(matches!(events[0], PriEvent::Proceeding(_)));
        assert!(matches!(events[1], PriEvent::Ringing(_)));
        assert_eq!(cpe.sched.pending(), 0, "T303 stops on the first answer");

        net.cc.connect(&mut net.queue, &mut net.sched, theirs, 3, false).unwrap();
        pump(&mut net, &mut cpe);
        let (frames, events) = cpe.drain();
        assert!(matches!(events[0], PriEvent::Answer(_)));
        assert_eq!(frames.len(), 1);
        assert_eq!(msg_type(&frames[0]), MsgType::ConnectAcknowledge as u8);
        assert_eq!(cpe.cc.call(ours).unwrap().our_state, CallState::Active);

        for f in frames {
            net.receive(&f);
        }
        assert_eq!(net.cc.call(theirs).unwrap().our_state, CallState::Active);
        assert_eq!(net.cc.call(theirs).unwrap().peer_state, CallState::Active);
    }

    #[test]
    fn disconnect_teardown_events() {
        let mut cpe = Side::new(NodeType::Cpe);
        let mut net = Side::new(NodeType::Network);
        let (ours, theirs) = dial(&mut cpe, &mut net);
        net.cc.connect(&mut net.queue, &mut net.sched, theirs, 3, false).unwrap();
        pump(&mut net, &mut cpe);
        pump(&mut cpe, &mut net);
        net.drain();

        // Network clears, the CPE application is asked to hang up
        net.cc.hangup(&mut net.queue, &mut net.sched, theirs, 16).unwrap();
        pump(&mut net, &mut cpe);
        let (frames, events) = cpe.drain();
        assert!(frames.is_empty());
        assert_eq!(events.len(), 1);
        let PriEvent::HangupReq(ev) = &events[0] else { panic!("expected HANGUP_REQ, got {:?}", events) };
        assert_eq!(ev.cause, 16);

        cpe.cc.hangup(&mut cpe.queue, &mut cpe.sched, ours, 16).unwrap();
        pump(&mut cpe, &mut net);
        let (_, events) = net.drain();
        assert!(matches!(events.as_slice(), [PriEvent::Hangup(_)]));

        net.cc.hangup(&mut net.queue, &mut net.sched, theirs, 16).unwrap();
        assert!(net.cc.call(theirs).is_none());
        pump(&mut net, &mut cpe);
        let (frames, events) = cpe.drain();
        assert!(frames.is_empty());
        assert!(matches!(events.as_slice(), [PriEvent::HangupAck(_)]));
        assert!(cpe.cc.call(ours).is_none());
        assert_eq!(cpe.sched.pending(), 0);
    }

    #[test]
    fn setup_without_bearer_is_released_with_cause_96() {
        let mut net = Side::new(NodeType::Network);
        // SETUP, call reference 5 from the originator, called number only
        let payload = [0x08, 0x02, 0x00, 0x05, 0x05, 0x70, 0x04, 0xa1, b'1', b'2', b'3'];
        net.receive(&payload);
        let (frames, events) = net.drain();
        assert!(events.is_empty());
        assert_eq!(frames.len(), 1);
        let rc = Q931Message::from_bytes(&frames[0]).unwrap();
        assert_eq!(rc.msg_type, MsgType::ReleaseComplete as u8);
        assert_eq!(rc.header.call_ref(), 0x8005);
        // Cause element: coding/location, then 96 with the extension bit
        assert!(rc.body.windows(4).any(|w| w[0] == 0x08 && w[1] == 0x02 && w[3] == 0x80 | 96));
        assert!(net.cc.call(0x0005).is_none());
    }

    #[test]
    fn unhandled_low_codeset0_element_counts_as_missing() {
        // Bearer capability, one element of codeset 0, called number
        let setup = |id: u8| {
            vec![0x08, 0x02, 0x00, 0x06, 0x05, 0x04, 0x03, 0x80, 0x90, 0xa2, id, 0x01, 0x00, 0x70, 0x04, 0xa1, b'1', b'2', b'3']
        };

        let mut net = Side::new(NodeType::Network);
        net.receive(&setup(0x0f));
        let (frames, events) = net.drain();
        assert!(events.is_empty(), "{:?}", events);
        assert_eq!(frames.len(), 1);
        let rc = Q931Message::from_bytes(&frames[0]).unwrap();
        assert_eq!(rc.msg_type, MsgType::ReleaseComplete as u8);
        assert_eq!(rc.header.call_ref(), 0x8006);
        assert!(rc.body.windows(4).any(|w| w[0] == 0x08 && w[1] == 0x02 && w[3] == 0x80 | 96));
        assert!(net.cc.calls().next().is_none());

        // From 0x10 up an unknown element is only logged
        let mut net = Side::new(NodeType::Network);
        net.receive(&setup(0x1f));
        let (_, events) = net.drain();
        assert!(matches!(events.first(), Some(PriEvent::Ring(_))), "{:?}", events);
    }

    #[test]
    fn message_for_unknown_call_is_refused() {
        let mut cpe = Side::new(NodeType::Cpe);
        // ALERTING for a call reference nobody handed out
        cpe.receive(&[0x08, 0x02, 0x80, 0x22, 0x01]);
        let (frames, events) = cpe.drain();
        assert!(events.is_empty());
        assert_eq!(frames.len(), 1);
        let rc = Q931Message::from_bytes(&frames[0]).unwrap();
        assert_eq!(rc.msg_type, MsgType::ReleaseComplete as u8);
        assert!(rc.body.windows(4).any(|w| w[0] == 0x08 && w[3] == 0x80 | 81));
        assert!(cpe.cc.call(0x8022).is_none());
    }

    #[test]
    fn unknown_message_type_answers_status_97() {
        let mut cpe = Side::new(NodeType::Cpe);
        // HOLD is not handled
        cpe.receive(&[0x08, 0x02, 0x00, 0x07, 0x24]);
        let (frames, _) = cpe.drain();
        let status = Q931Message::from_bytes(&frames[0]).unwrap();
        assert_eq!(status.msg_type, MsgType::Status as u8);
        assert!(status.body.windows(4).any(|w| w[0] == 0x08 && w[3] == 0x80 | 97));
        assert!(cpe.cc.call(0x0007).is_none());
    }

    #[test]
    fn status_enquiry_reports_our_state() {
        let mut cpe = Side::new(NodeType::Cpe);
        let mut net = Side::new(NodeType::Network);
        let (ours, _) = dial(&mut cpe, &mut net);
        cpe.drain();
        let header = Q931Header::for_call(protodisc::Q931, ours & 0x7fff, false, false, false);
        let mut payload = vec![header.pd];
        payload.push(header.crv.len() as u8);
        payload.extend(&header.crv);
        payload.push(MsgType::StatusEnquiry as u8);
        cpe.receive(&payload);
        let (frames, _) = cpe.drain();
        let status = Q931Message::from_bytes(&frames[0]).unwrap();
        assert_eq!(status.msg_type, MsgType::Status as u8);
        // Call state element carries CALL INITIATED
        assert!(status.body.windows(3).any(|w| w == [0x14, 0x01, CallState::CallInitiated as u8]));
    }

    #[test]
    fn maintenance_service_is_acknowledged() {
        let mut net = Side::new(NodeType::Network);
        net.receive(&[protodisc::ATT_MAINTENANCE, 0x02, 0x00, 0x01, MAINT_SERVICE, 0x01, 0x01, 0x80]);
        let (frames, events) = net.drain();
        assert!(events.is_empty());
        assert_eq!(frames, vec![vec![protodisc::ATT_MAINTENANCE, 0x02, 0x00, 0x01, MAINT_SERVICE_ACKNOWLEDGE, 0x01, 0x01, 0x80]]);
        assert!(net.cc.calls().next().is_none());
    }

    #[test]
    fn foreign_discriminator_is_dropped() {
        let mut net = Side::new(NodeType::Network);
        net.receive(&[protodisc::GR303, 0x02, 0x00, 0x01, 0x05]);
        let (frames, events) = net.drain();
        assert!(frames.is_empty() && events.is_empty());
        assert_eq!(net.cc.link(ROOT).unwrap().rx_count, 0);
    }

    #[test]
    fn restart_on_dummy_reference_is_acknowledged() {
        let mut cpe = Side::new(NodeType::Cpe);
        let mut net = Side::new(NodeType::Network);
        net.cc.restart(&mut net.queue, 5).unwrap();
        pump(&mut net, &mut cpe);
        let (frames, events) = cpe.drain();
        let PriEvent::Restart(ev) = &events[0] else { panic!("expected RESTART, got {:?}", events) };
        assert_eq!(ev.channel & 0xff, 5);
        assert_eq!(msg_type(&frames[0]), MsgType::RestartAcknowledge as u8);
        assert!(cpe.cc.calls().next().is_none());

        for f in frames {
            net.receive(&f);
        }
        let (_, events) = net.drain();
        assert!(matches!(events.as_slice(), [PriEvent::RestartAck(ev)] if ev.channel & 0xff == 5));
        assert!(net.cc.calls().next().is_none());
    }

    #[test]
    fn inband_disconnect_waits_for_the_application() {
        let mut cpe = Side::new(NodeType::Cpe);
        let mut net = Side::new(NodeType::Network);
        cpe.cc.config.state_write().inband_disconnect = true;
        let (ours, theirs) = dial(&mut cpe, &mut net);
        cpe.drain();
        net.cc.alerting(&mut net.queue, theirs, 3, false).unwrap();
        pump(&mut net, &mut cpe);
        cpe.drain();
        // DISCONNECT, cause 17, progress "in-band information available"
        let hi = 0x80 | (ours >> 8) as u8 & 0x7f;
        cpe.receive(&[0x08, 0x02, hi, ours as u8, 0x45, 0x08, 0x02, 0x81, 0x91, 0x1e, 0x02, 0x81, 0x88]);
        let (frames, events) = cpe.drain();
        assert!(frames.is_empty());
        assert!(events.is_empty());
        let call = cpe.cc.call(ours).unwrap();
        assert_eq!(call.our_state, CallState::DisconnectIndication);
        assert!(call.sendhangupack);
    }

    #[test]
    fn keypad_digits_outside_overlap_receiving() {
        let mut cpe = Side::new(NodeType::Cpe);
        let mut net = Side::new(NodeType::Network);
        let (ours, theirs) = dial(&mut cpe, &mut net);
        cpe.drain();
        net.cc.connect(&mut net.queue, &mut net.sched, theirs, 3, false).unwrap();
        pump(&mut net, &mut cpe);
        pump(&mut cpe, &mut net);
        cpe.cc.keypad_facility(&mut cpe.queue, ours, "*72").unwrap();
        pump(&mut cpe, &mut net);
        let (_, events) = net.drain();
        let Some(PriEvent::KeypadDigit(ev)) = events.last() else { panic!("expected KEYPAD_DIGIT, got {:?}", events) };
        assert_eq!(ev.digits, "*72");
        assert_eq!(ev.call, theirs);
    }
}

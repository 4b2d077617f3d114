//! Messages we originate, one function per Q.931 procedure

use pri_config::TimerIdx;
use pri_core::{CallRef, NodeType, SwitchType};
use pri_pdus::q931::ie::bearer::trans_mode;
use pri_pdus::q931::ie::cause::{cause, coding, location};
use pri_pdus::q931::ie::numbers::pres;
use pri_pdus::q931::ie::progress::prog_mask;
use pri_pdus::q931::ie::misc::restart_ind;
use pri_pdus::q931::ie::{BearerCap, CauseInfo, ChanFlags};
use pri_pdus::q931::{CallState, IeKind, MsgType};

use crate::MessageQueue;
use crate::callcontrol::call::Call;
use crate::callcontrol::cc_entity::CallControl;
use crate::callcontrol::setup_request::SetupRequest;
use crate::error::PriError;
use crate::lapd::ROOT;
use crate::scheduler::{CallTimer, Scheduler};

const SETUP_IES: &[IeKind] = &[
    IeKind::BearerCapability,
    IeKind::ChannelIdent,
    IeKind::Facility,
    IeKind::ProgressIndicator,
    IeKind::NetworkSpecFac,
    IeKind::Display,
    IeKind::CallingPartyNumber,
    IeKind::CalledPartyNumber,
    IeKind::RedirectingNumber,
    IeKind::UserUser,
    IeKind::SendingComplete,
    IeKind::OriginatingLineInfo,
    IeKind::GenericDigits,
];
const GR303_SETUP_IES: &[IeKind] = &[IeKind::BearerCapability, IeKind::ChannelIdent];
const CIS_SETUP_IES: &[IeKind] =
    &[IeKind::BearerCapability, IeKind::ChannelIdent, IeKind::Facility, IeKind::CalledPartyNumber];
const CALL_PROCEEDING_IES: &[IeKind] = &[IeKind::ChannelIdent, IeKind::ProgressIndicator];
const ALERTING_IES: &[IeKind] = &[IeKind::ProgressIndicator, IeKind::UserUser];
const CONNECT_IES: &[IeKind] = &[IeKind::ChannelIdent, IeKind::ProgressIndicator];
const GR303_CONNECT_ACK_IES: &[IeKind] = &[IeKind::ChannelIdent];
const PROGRESS_IES: &[IeKind] = &[IeKind::ProgressIndicator];
const DISCONNECT_IES: &[IeKind] = &[IeKind::Cause, IeKind::UserUser];
const RELEASE_IES: &[IeKind] = &[IeKind::Cause, IeKind::UserUser];
const RELEASE_COMPLETE_IES: &[IeKind] = &[IeKind::UserUser];
const RESTART_IES: &[IeKind] = &[IeKind::ChannelIdent, IeKind::RestartIndicator];
const STATUS_IES: &[IeKind] = &[IeKind::Cause, IeKind::CallState];
const NOTIFY_IES: &[IeKind] = &[IeKind::NotifyInd];
const FACILITY_IES: &[IeKind] = &[IeKind::Facility];
const INFORMATION_IES: &[IeKind] = &[IeKind::KeypadFacility, IeKind::CalledPartyNumber];
const KEYPAD_FACILITY_IES: &[IeKind] = &[IeKind::KeypadFacility];

/// Cause element for a cause value as the application passes it, non-positive means none
pub(super) fn local_cause(value: i32) -> CauseInfo {
    if value <= 0 { CauseInfo::default() } else { CauseInfo::new((value & 0x7f) as u8) }
}

/// Takes a channel in the `channel | ds1 << 8 | ds1explicit << 16` encoding, 0 keeps the current one
fn apply_channel(call: &mut Call, channel: i32) {
    if channel != 0 {
        call.info.channel.ds1no = ((channel & 0xff00) >> 8) as u8;
        call.info.channel.ds1explicit = channel & 0x10000 != 0;
        call.info.channel.channelno = Some((channel & 0xff) as u8);
    }
}

fn set_progress(call: &mut Call, mask: u32) {
    if mask != 0 {
        call.info.progress.loc = location::PRIV_NET_LOCAL_USER;
        call.info.progress.code = coding::CCITT;
    }
    call.info.progress.mask = mask;
}

/// DMS-100 and 4ESS refuse user provided presentation values
fn switch_presentation(switch: SwitchType, pres_value: u8) -> u8 {
    if matches!(switch, SwitchType::Dms100 | SwitchType::Att4ess) && pres_value & 0x7c == 0 {
        pres::ALLOWED_NETWORK_NUMBER
    } else {
        pres_value
    }
}

impl CallControl {
    pub(super) fn link_of(&self, cr: CallRef) -> Result<pri_saps::dl::DlLinkInfo, PriError> {
        let inst = self.calls.get(&cr).ok_or(PriError::NoSuchCall(cr))?.inst;
        self.links.get(&inst).map(|l| l.info).ok_or(PriError::InvalidArgument("call on a removed link"))
    }

    pub fn setup(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, cr: CallRef, req: &SetupRequest) -> Result<(), PriError> {
        if req.called.is_empty() {
            return Err(PriError::InvalidArgument("no called number"));
        }
        let link = self.link_of(cr)?;
        let trace = self.trace_state();
        let call = self.call_mut(cr)?;

        call.info.bearer = BearerCap {
            transcapability: req.transmode,
            transmoderate: trans_mode::CIRCUIT_64,
            userl1: Some(req.userl1),
            userl2: None,
            userl3: None,
            ..BearerCap::default()
        };

        let (mut channel, mut exclusive) = (req.channel & 0xff, req.exclusive);
        if link.node == NodeType::Cpe && link.gr303_master {
            channel = 0;
            exclusive = false;
        }
        call.info.channel.ds1no = ((req.channel & 0xff00) >> 8) as u8;
        call.info.channel.ds1explicit = req.channel & 0x10000 != 0;
        call.info.channel.channelno = Some(channel as u8);
        call.info.channel.slotmap = None;
        call.info.channel.justsignalling = req.justsignalling;
        call.info.channel.flags = if exclusive {
            ChanFlags::Exclusive
        } else if channel != 0 {
            ChanFlags::Preferred
        } else {
            ChanFlags::None
        };
        call.info.nonisdn = req.nonisdn;
        call.info.complete = req.numcomplete;
        call.newcall = false;

        match &req.caller {
            Some(caller) => {
                call.info.callernum = caller.clone();
                call.info.callerplan = req.callerplan;
                call.info.callername = req.callername.clone();
                call.info.callerpres = switch_presentation(link.switch, req.callerpres);
            }
            None => {
                call.info.callernum.clear();
                call.info.callername.clear();
                call.info.callerplan = 0;
                call.info.callerpres = pres::NUMBER_NOT_AVAILABLE;
            }
        }
        match &req.redirectingnum {
            Some(num) => {
                call.info.redirectingnum = num.clone();
                call.info.redirectingplan = req.redirectingplan;
                call.info.redirectingpres = switch_presentation(link.switch, req.redirectingpres);
                call.info.redirectingreason = req.redirectingreason;
            }
            None => {
                call.info.redirectingnum.clear();
                call.info.redirectingplan = 0;
                call.info.redirectingpres = pres::NUMBER_NOT_AVAILABLE;
                call.info.redirectingreason = 0;
            }
        }
        call.info.callednum = req.called.clone();
        call.info.calledplan = req.calledplan;
        call.info.useruserinfo = req.useruserinfo.clone().unwrap_or_default();
        call.info.progress.mask =
            if req.nonisdn && link.switch == SwitchType::Ni2 { prog_mask::CALLER_NOT_ISDN } else { 0 };

        self.add_standard_apdus(cr);

        let ies = if link.gr303_master {
            GR303_SETUP_IES
        } else if req.justsignalling {
            CIS_SETUP_IES
        } else {
            SETUP_IES
        };
        let payload = self.encode(cr, MsgType::Setup, ies)?;
        let call = self.call_mut(cr)?;
        call.acked = true;
        call.setup_msg = Some(payload.clone());
        call.alive = true;
        // HANGUP_ACK is owed once RELEASE COMPLETE goes either way
        call.sendhangupack = true;
        call.set_our_state(CallState::CallInitiated, trace);
        call.peer_state = CallState::OverlapSending;
        call.t303_expired = false;
        let inst = call.inst;
        self.xmit(queue, inst, Some(cr), payload);
        self.start_timer(sched, cr, CallTimer::T303, TimerIdx::T303);
        Ok(())
    }

    pub fn call_proceeding(&mut self, queue: &mut MessageQueue, cr: CallRef, channel: i32, info: bool) -> Result<(), PriError> {
        let trace = self.trace_state();
        let call = self.call_mut(cr)?;
        apply_channel(call, channel);
        call.info.channel.flags = ChanFlags::Exclusive;
        call.set_our_state(CallState::IncomingCallProceeding, trace);
        call.peer_state = CallState::OutgoingCallProceeding;
        set_progress(call, if info { prog_mask::INBAND_AVAILABLE } else { 0 });
        call.proc_sent = true;
        call.alive = true;
        self.send_message(queue, cr, MsgType::CallProceeding, CALL_PROCEEDING_IES)
    }

    /// ALERTING, preceded by CALL PROCEEDING unless that went out already
    pub fn alerting(&mut self, queue: &mut MessageQueue, cr: CallRef, channel: i32, info: bool) -> Result<(), PriError> {
        if !self.call_mut(cr)?.proc_sent {
            self.call_proceeding(queue, cr, channel, false)?;
        }
        let trace = self.trace_state();
        let call = self.call_mut(cr)?;
        set_progress(call, if info { prog_mask::INBAND_AVAILABLE } else { 0 });
        call.set_our_state(CallState::CallReceived, trace);
        call.peer_state = CallState::CallDelivered;
        call.alive = true;
        self.send_message(queue, cr, MsgType::Alerting, ALERTING_IES)
    }

    pub fn setup_ack(&mut self, queue: &mut MessageQueue, cr: CallRef, channel: i32, nonisdn: bool) -> Result<(), PriError> {
        let switch = self.link_of(cr)?.switch;
        let trace = self.trace_state();
        let call = self.call_mut(cr)?;
        apply_channel(call, channel);
        call.info.channel.flags = ChanFlags::Exclusive;
        set_progress(call, if nonisdn && switch != SwitchType::Dms100 { prog_mask::CALLED_NOT_ISDN } else { 0 });
        call.set_our_state(CallState::OverlapReceiving, trace);
        call.peer_state = CallState::OverlapSending;
        call.alive = true;
        self.send_message(queue, cr, MsgType::SetupAcknowledge, CONNECT_IES)
    }

    pub fn connect(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, cr: CallRef, channel: i32, nonisdn: bool) -> Result<(), PriError> {
        let link = self.link_of(cr)?;
        let trace = self.trace_state();
        let call = self.call_mut(cr)?;
        apply_channel(call, channel);
        call.info.channel.flags = ChanFlags::Exclusive;
        set_progress(call, if nonisdn && link.switch != SwitchType::Dms100 { prog_mask::CALLED_NOT_ISDN } else { 0 });
        let state = if link.node == NodeType::Network || link.switch == SwitchType::Qsig {
            CallState::Active
        } else {
            CallState::ConnectRequest
        };
        call.set_our_state(state, trace);
        call.peer_state = CallState::Active;
        call.alive = true;
        self.stop_timer(sched, cr);
        if state == CallState::ConnectRequest && (link.bri || !link.gr303_master) {
            self.start_timer(sched, cr, CallTimer::T313, TimerIdx::T313);
        }
        self.send_message(queue, cr, MsgType::Connect, CONNECT_IES)
    }

    pub(super) fn connect_ack(&mut self, queue: &mut MessageQueue, cr: CallRef) -> Result<(), PriError> {
        let link = self.link_of(cr)?;
        if !link.gr303_master {
            self.send_message(queue, cr, MsgType::ConnectAcknowledge, &[])
        } else if link.node == NodeType::Cpe {
            self.send_message(queue, cr, MsgType::ConnectAcknowledge, GR303_CONNECT_ACK_IES)
        } else {
            Ok(())
        }
    }

    pub fn progress(&mut self, queue: &mut MessageQueue, cr: CallRef, channel: i32, info: bool) -> Result<(), PriError> {
        let call = self.call_mut(cr)?;
        apply_channel(call, channel);
        if info {
            set_progress(call, prog_mask::INBAND_AVAILABLE);
        } else {
            // The indicator is mandatory in PROGRESS
            tracing::error!("Progress message requested but no information is provided");
            call.info.progress.mask = 0;
        }
        call.alive = true;
        self.send_message(queue, cr, MsgType::Progress, PROGRESS_IES)
    }

    pub fn disconnect(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, cr: CallRef, cause_value: i32) -> Result<(), PriError> {
        let trace = self.trace_state();
        let call = self.call_mut(cr)?;
        call.set_our_state(CallState::DisconnectRequest, trace);
        call.peer_state = CallState::DisconnectIndication;
        if !call.alive {
            return Ok(());
        }
        call.alive = false;
        call.info.cause = local_cause(cause_value);
        call.sendhangupack = true;
        self.start_timer(sched, cr, CallTimer::T305, TimerIdx::T305);
        self.send_message(queue, cr, MsgType::Disconnect, DISCONNECT_IES)
    }

    /// RELEASE, guarded by T308. The second T308 expiry gives up on the peer.
    pub fn release(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, cr: CallRef, cause_value: i32) -> Result<(), PriError> {
        let trace = self.trace_state();
        let call = self.call_mut(cr)?;
        call.set_our_state(CallState::ReleaseRequest, trace);
        if !call.alive {
            return Ok(());
        }
        call.alive = false;
        call.info.cause = local_cause(cause_value);
        if call.acked {
            let timer = if call.t308_timedout == 0 { CallTimer::T308 } else { CallTimer::T308Final };
            self.start_timer(sched, cr, timer, TimerIdx::T308);
            self.send_message(queue, cr, MsgType::Release, RELEASE_IES)
        } else {
            // Nothing went out for the call yet, answer with the cause right away
            self.send_message(queue, cr, MsgType::ReleaseComplete, RELEASE_IES)
        }
    }

    /// RELEASE COMPLETE, then the call is gone
    pub(super) fn release_complete(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, cr: CallRef, cause_value: i32) -> Result<(), PriError> {
        let trace = self.trace_state();
        let call = self.call_mut(cr)?;
        call.set_our_state(CallState::Null, trace);
        call.peer_state = CallState::Null;
        let sent = if cause_value > -1 {
            call.info.cause = local_cause(cause_value);
            self.send_message(queue, cr, MsgType::ReleaseComplete, RELEASE_IES)
        } else {
            self.send_message(queue, cr, MsgType::ReleaseComplete, RELEASE_COMPLETE_IES)
        };
        if let Ok(call) = self.call_mut(cr) {
            call.alive = false;
        }
        let freed = self.hangup(queue, sched, cr, cause_value);
        sent.and(freed)
    }

    /// RESTART for a channel on the dummy call reference
    pub fn restart(&mut self, queue: &mut MessageQueue, channel: i32) -> Result<(), PriError> {
        if channel == 0 {
            return Err(PriError::InvalidArgument("restart needs a channel"));
        }
        let inst = self.outbound_link().unwrap_or(ROOT);
        let trace = self.trace_state();
        let call = self.getcall(0x8000, inst);
        call.info.ri = restart_ind::INDICATED_CHANNEL;
        call.info.channel.ds1no = ((channel & 0xff00) >> 8) as u8;
        call.info.channel.ds1explicit = channel & 0x10000 != 0;
        call.info.channel.channelno = Some((channel & 0xff) as u8);
        call.info.channel.flags = ChanFlags::Exclusive;
        call.set_our_state(CallState::Restart, trace);
        call.peer_state = CallState::RestartRequest;
        self.send_message(queue, 0x8000, MsgType::Restart, RESTART_IES)
    }

    pub(super) fn restart_ack(&mut self, queue: &mut MessageQueue, cr: CallRef) -> Result<(), PriError> {
        let trace = self.trace_state();
        let call = self.call_mut(cr)?;
        call.set_our_state(CallState::Null, trace);
        call.peer_state = CallState::Null;
        self.send_message(queue, cr, MsgType::RestartAcknowledge, RESTART_IES)
    }

    /// NOTIFY. Outside EuroISDN E1 only the user suspended/resumed/bearer change indications go out.
    pub fn notify(&mut self, queue: &mut MessageQueue, cr: CallRef, channel: i32, info: i32) -> Result<(), PriError> {
        let switch = self.link_of(cr)?.switch;
        if switch != SwitchType::EuroIsdnE1 && !(0..=2).contains(&info) {
            return Ok(());
        }
        let call = self.call_mut(cr)?;
        apply_channel(call, channel);
        call.info.notify = if info >= 0 { Some((info & 0x7f) as u8) } else { None };
        self.send_message(queue, cr, MsgType::Notify, NOTIFY_IES)
    }

    /// FACILITY carrying the APDUs queued for it
    pub fn facility(&mut self, queue: &mut MessageQueue, cr: CallRef) -> Result<(), PriError> {
        self.send_message(queue, cr, MsgType::Facility, FACILITY_IES)
    }

    /// One overlap dialling digit
    pub fn information(&mut self, queue: &mut MessageQueue, cr: CallRef, digit: char) -> Result<(), PriError> {
        let call = self.call_mut(cr)?;
        call.info.callednum = digit.to_string();
        self.send_message(queue, cr, MsgType::Information, INFORMATION_IES)
    }

    pub fn keypad_facility(&mut self, queue: &mut MessageQueue, cr: CallRef, digits: &str) -> Result<(), PriError> {
        let call = self.call_mut(cr)?;
        call.info.keypad_digits = digits.to_string();
        self.send_message(queue, cr, MsgType::Information, KEYPAD_FACILITY_IES)
    }

    /// STATUS with our call state. Cause 0 answers a STATUS ENQUIRY.
    pub(super) fn status(&mut self, queue: &mut MessageQueue, cr: CallRef, cause_value: u8) -> Result<(), PriError> {
        let value = if cause_value == 0 { cause::RESPONSE_TO_STATUS_ENQUIRY } else { cause_value };
        let call = self.call_mut(cr)?;
        call.info.cause = CauseInfo { code: coding::CCITT, loc: location::USER, value };
        self.send_message(queue, cr, MsgType::Status, STATUS_IES)
    }

    /// Clears a call from whatever state it is in. Cause -1 means normal clearing.
    ///
    /// Causes 1, 34, 44, 81 and 82 go out in RELEASE COMPLETE, 6, 7 and 26 in
    /// RELEASE, anything else in DISCONNECT, as far as the call states allow.
    pub fn hangup(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, cr: CallRef, cause_value: i32) -> Result<(), PriError> {
        let call = self.call_mut(cr)?;
        let (ours, peer) = (call.our_state, call.peer_state);
        let mut cause_value = cause_value;
        // A missing mandatory element insists on its own cause
        if call.info.cause.value == cause::MANDATORY_IE_MISSING {
            cause_value = cause::MANDATORY_IE_MISSING as i32;
        }
        if self.trace_state() {
            tracing::debug!("NEW_HANGUP DEBUG: Calling q931_hangup, ourstate {}, peerstate {}", ours, peer);
        }
        let release_compl = matches!(cause_value, 1 | 34 | 44 | 81 | 82);
        let disconnect = !release_compl && !matches!(cause_value, 6 | 7 | 26);

        match ours {
            CallState::Null => match peer {
                CallState::Null => self.destroy_call(sched, cr),
                CallState::ReleaseRequest => self.release_complete(queue, sched, cr, cause_value)?,
                _ => {}
            },
            CallState::CallInitiated
            | CallState::OverlapSending
            | CallState::OutgoingCallProceeding
            | CallState::CallDelivered
            | CallState::CallPresent
            | CallState::CallReceived
            | CallState::ConnectRequest
            | CallState::IncomingCallProceeding
            | CallState::OverlapReceiving => {
                let peer_clearing = matches!(
                    peer,
                    CallState::Null
                        | CallState::DisconnectRequest
                        | CallState::DisconnectIndication
                        | CallState::ReleaseRequest
                        | CallState::RestartRequest
                        | CallState::Restart
                );
                if peer_clearing {
                    tracing::warn!("Weird, doing nothing but this shouldn't happen, ourstate {}, peerstate {}", ours, peer);
                } else if disconnect {
                    self.disconnect(queue, sched, cr, cause_value)?;
                } else if release_compl {
                    self.release_complete(queue, sched, cr, cause_value)?;
                } else {
                    self.release(queue, sched, cr, cause_value)?;
                }
            }
            CallState::Active => self.disconnect(queue, sched, cr, cause_value)?,
            CallState::DisconnectRequest => self.release(queue, sched, cr, cause_value)?,
            CallState::DisconnectIndication => {
                if peer == CallState::DisconnectRequest {
                    self.call_mut(cr)?.alive = true;
                    self.release(queue, sched, cr, cause_value)?;
                }
            }
            // Waiting for RELEASE COMPLETE
            CallState::ReleaseRequest => {}
            CallState::Restart | CallState::RestartRequest => {
                tracing::error!("hangup shouldn't be called in this state, ourstate {}, peerstate {}", ours, peer);
            }
            other => {
                tracing::error!("Not yet handling hanging up when our state is {} ({}), peerstate {}", other as u8, other, peer);
                return Err(PriError::Incompatible("hangup in this call state"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pri_config::{InterfaceKind, SharedConfig};
    use pri_core::pri_entities::PriEntity;
    use pri_core::{InstanceId, ManualClock, protodisc, sapi, tei};
    use pri_pdus::q931::Q931Message;
    use pri_saps::SapMsgInner;
    use pri_saps::dl::DlLinkInfo;

    use crate::PriEntityTrait;
    use crate::scheduler::TimerEvent;

    fn cc(node: NodeType) -> (CallControl, Scheduler) {
        let config = SharedConfig::new(node, SwitchType::Ni2, InterfaceKind::Pri);
        let mut cc = CallControl::new(config);
        let info = DlLinkInfo {
            inst: ROOT,
            master: None,
            node,
            switch: SwitchType::Ni2,
            bri: false,
            sapi: sapi::CALL_CTRL,
            tei: tei::PRI,
            protodisc: protodisc::Q931,
            gr303_master: false,
        };
        let mut queue = MessageQueue::new();
        let mut sched = Scheduler::new(Box::new(ManualClock::new()), ROOT);
        cc.rx_prim(
            &mut queue,
            &mut sched,
            pri_saps::SapMsg::new(
                pri_core::Sap::DlSap,
                PriEntity::Lapd,
                PriEntity::CallControl,
                SapMsgInner::DlAssignInd(pri_saps::dl::DlAssignInd { link: info }),
            ),
        );
        (cc, sched)
    }

    /// Message types handed to Q.921, in order
    fn sent(queue: &mut MessageQueue) -> Vec<Q931Message> {
        let mut out = Vec::new();
        while let Some(msg) = queue.pop_front() {
            if let SapMsgInner::DlDataReq(req) = msg.msg {
                out.push(Q931Message::from_bytes(&req.payload).unwrap());
            }
        }
        out
    }

    #[test]
    fn setup_arms_t303_and_keeps_the_message() {
        let (mut cc, mut sched) = cc(NodeType::Cpe);
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        let req = SetupRequest::new("5551212", 0x21).channel(1, true, false);
        cc.setup(&mut queue, &mut sched, cr, &req).unwrap();

        let msgs = sent(&mut queue);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].msg_type, MsgType::Setup as u8);
        let call = cc.call(cr).unwrap();
        assert_eq!(call.our_state, CallState::CallInitiated);
        assert!(call.alive && call.sendhangupack);
        assert!(call.setup_msg.is_some());
        assert!(call.retranstimer.is_some());
        assert!(cc.links().all(|l| l.tx_count == 1));
    }

    #[test]
    fn setup_without_called_number_is_refused() {
        let (mut cc, mut sched) = cc(NodeType::Cpe);
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        let req = SetupRequest { called: String::new(), ..SetupRequest::default() };
        assert!(matches!(cc.setup(&mut queue, &mut sched, cr, &req), Err(PriError::InvalidArgument(_))));
        assert!(queue.is_empty());
    }

    #[test]
    fn alerting_sends_call_proceeding_first() {
        let (mut cc, _sched) = cc(NodeType::Network);
        let mut queue = MessageQueue::new();
        cc.getcall(0x0005, ROOT).our_state = CallState::CallPresent;
        cc.alerting(&mut queue, 0x0005, 3, false).unwrap();
        let types: Vec<u8> = sent(&mut queue).iter().map(|m| m.msg_type).collect();
        assert_eq!(types, vec![MsgType::CallProceeding as u8, MsgType::Alerting as u8]);
        assert_eq!(cc.call(0x0005).unwrap().our_state, CallState::CallReceived);
        assert_eq!(cc.call(0x0005).unwrap().event_channel(), 3);
    }

    #[test]
    fn hangup_of_active_call_disconnects_and_arms_t305() {
        let (mut cc, mut sched) = cc(NodeType::Network);
        let mut queue = MessageQueue::new();
        let call = cc.getcall(0x0007, ROOT);
        call.our_state = CallState::Active;
        call.peer_state = CallState::Active;
        call.alive = true;
        cc.hangup(&mut queue, &mut sched, 0x0007, 16).unwrap();
        let msgs = sent(&mut queue);
        assert_eq!(msgs[0].msg_type, MsgType::Disconnect as u8);
        let call = cc.call(0x0007).unwrap();
        assert_eq!(call.our_state, CallState::DisconnectRequest);
        assert!(call.sendhangupack);
        let due = sched.pop_due(pri_core::PriTime(30_000)).map(|(_, ev)| ev);
        assert_eq!(due, Some(TimerEvent::Call { cr: 0x0007, timer: CallTimer::T305 }));
    }

    #[test]
    fn busy_cause_before_answer_releases_complete() {
        let (mut cc, mut sched) = cc(NodeType::Network);
        let mut queue = MessageQueue::new();
        let call = cc.getcall(0x0009, ROOT);
        call.our_state = CallState::CallPresent;
        call.peer_state = CallState::CallInitiated;
        cc.hangup(&mut queue, &mut sched, 0x0009, 34).unwrap();
        let msgs = sent(&mut queue);
        assert_eq!(msgs[0].msg_type, MsgType::ReleaseComplete as u8);
        assert!(cc.call(0x0009).is_none());
    }

    #[test]
    fn null_call_is_destroyed() {
        let (mut cc, mut sched) = cc(NodeType::Cpe);
        let mut queue = MessageQueue::new();
        cc.getcall(0x8003, ROOT);
        cc.hangup(&mut queue, &mut sched, 0x8003, 16).unwrap();
        assert!(queue.is_empty());
        assert!(cc.call(0x8003).is_none());
    }

    #[test]
    fn notify_outside_euro_is_limited() {
        let (mut cc, _sched) = cc(NodeType::Cpe);
        let mut queue = MessageQueue::new();
        cc.getcall(0x8004, ROOT);
        cc.notify(&mut queue, 0x8004, 0, 5).unwrap();
        assert!(queue.is_empty());
        cc.notify(&mut queue, 0x8004, 0, 1).unwrap();
        assert_eq!(sent(&mut queue)[0].msg_type, MsgType::Notify as u8);
    }

    #[test]
    fn restart_uses_the_dummy_reference() {
        let (mut cc, _sched) = cc(NodeType::Network);
        let mut queue = MessageQueue::new();
        assert!(cc.restart(&mut queue, 0).is_err());
        cc.restart(&mut queue, 4).unwrap();
        let msg = &sent(&mut queue)[0];
        assert_eq!(msg.msg_type, MsgType::Restart as u8);
        assert_eq!(msg.header.crv, vec![0, 0]);
        assert_eq!(cc.call(0x8000).unwrap().our_state, CallState::Restart);
        assert_eq!(cc.link(InstanceId(0)).unwrap().tx_count, 1);
    }

    #[test]
    fn local_cause_ignores_missing_values() {
        assert_eq!(local_cause(-1).value, 0);
        assert_eq!(local_cause(16).value, 16);
        assert_eq!(local_cause(16).loc, location::PRIV_NET_LOCAL_USER);
    }
}

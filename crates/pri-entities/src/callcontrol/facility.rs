//! Supplementary services on top of call control: the APDUs attached to
//! outgoing calls, interpretation of received Facility elements and the
//! switch specific transfer and message waiting procedures.

use pri_core::{CallRef, DebugFlags, NodeType, SwitchType};
use pri_pdus::q931::MsgType;
use pri_pdus::q931::ie::facility::queue_apdu;
use pri_pdus::rose::ops::{self, rlt};
use pri_pdus::rose::{InvokeArg, RoseComponent, decode_component, parse_facility};
use pri_saps::dl::DlLinkInfo;

use crate::MessageQueue;
use crate::callcontrol::cc_entity::CallControl;
use crate::callcontrol::setup_request::SetupRequest;
use crate::error::PriError;
use crate::scheduler::Scheduler;

impl CallControl {
    fn attach_apdu(&mut self, cr: CallRef, message: MsgType, apdu: Result<Vec<u8>, pri_core::pdu_parse_error::PduParseErr>) -> Result<(), PriError> {
        let apdu = apdu?;
        let call = self.call_mut(cr)?;
        queue_apdu(&mut call.info.apdus, message as u8, apdu)?;
        Ok(())
    }

    /// Queues the APDUs every outgoing SETUP carries on this switch type
    pub(super) fn add_standard_apdus(&mut self, cr: CallRef) {
        if !self.config.state_read().sendfacility {
            return;
        }
        let Ok(link) = self.link_of(cr) else {
            return;
        };
        let Some((name, redirected)) = self.calls.get(&cr).map(|c| (c.info.callername.clone(), !c.info.redirectingnum.is_empty())) else {
            return;
        };

        let mut queued: Vec<(MsgType, Result<Vec<u8>, _>)> = Vec::new();
        match link.switch {
            SwitchType::Qsig => {
                if redirected {
                    let id = self.next_invoke_id();
                    let dli2 = self.calls.get(&cr).map(|c| ops::encode_dli2(link.switch, id, &c.info));
                    queued.extend(dli2.map(|a| (MsgType::Setup, a)));
                }
                if !name.is_empty() {
                    let id = self.next_invoke_id();
                    queued.push((MsgType::Setup, ops::encode_calling_name(true, id, &name)));
                }
            }
            SwitchType::Ni2 if !name.is_empty() => {
                if link.node == NodeType::Network {
                    // The name follows in a FACILITY once the call is answered
                    let id = self.next_invoke_id();
                    queued.push((MsgType::Setup, ops::encode_information_following(false, id)));
                    let id = self.next_invoke_id();
                    queued.push((MsgType::Facility, ops::encode_calling_name(false, id, &name)));
                } else {
                    let id = self.next_invoke_id();
                    queued.push((MsgType::Setup, ops::encode_calling_name(false, id, &name)));
                }
            }
            SwitchType::Dms100 if link.node == NodeType::Cpe => {
                queued.push((MsgType::Setup, ops::encode_rlt_operation_ind()));
            }
            SwitchType::EuroIsdnE1 if redirected => {
                let id = self.next_invoke_id();
                let dli2 = self.calls.get(&cr).map(|c| ops::encode_dli2(link.switch, id, &c.info));
                queued.extend(dli2.map(|a| (MsgType::Setup, a)));
            }
            _ => {}
        }

        for (message, apdu) in queued {
            if let Err(e) = self.attach_apdu(cr, message, apdu) {
                tracing::warn!("Unable to queue APDU for {} on call {}: {}", message.name(), cr, e);
            }
        }
    }

    /// Interprets the ROSE components of a received Facility element
    pub(super) fn handle_facility(&mut self, queue: &mut MessageQueue, cr: CallRef, link: DlLinkInfo, data: &[u8]) {
        let debug_apdu = self.debug(DebugFlags::APDU);
        let debug_aoc = self.debug(DebugFlags::AOC);
        let apdu = match parse_facility(data) {
            Ok(apdu) => apdu,
            Err(e) => {
                if debug_apdu {
                    tracing::debug!("Facility element not understood: {}", e);
                }
                return;
            }
        };
        if apdu.skipped > 0 && debug_apdu {
            tracing::debug!("Skipped {} facility components", apdu.skipped);
        }

        let mut forward = None;
        for comp in &apdu.components {
            let rose = match decode_component(link.switch, comp) {
                Ok(rose) => rose,
                Err(e) => {
                    tracing::warn!("Unable to decode ROSE component 0x{:02x}: {}", comp.tag, e);
                    continue;
                }
            };
            let Some(call) = self.calls.get_mut(&cr) else {
                return;
            };
            match rose {
                RoseComponent::Invoke(invoke) => match invoke.arg {
                    InvokeArg::CallingName(name) => {
                        if debug_apdu {
                            tracing::debug!("Received calling name '{}'", name);
                        }
                        call.info.callername = name;
                    }
                    InvokeArg::DivertingLegInfo2(dli2) => dli2.apply(&mut call.info),
                    InvokeArg::CallTransferComplete(info) | InvokeArg::CallTransferUpdate(info) => info.apply(&mut call.info),
                    InvokeArg::AocChargingRequest(case) => {
                        if debug_aoc {
                            tracing::debug!("AOC charging request, case {:?}", case);
                        }
                    }
                    InvokeArg::AocECharging(charging) => {
                        call.aoc_units = if charging.free_of_charge { 0 } else { charging.units };
                        if debug_aoc {
                            tracing::debug!(
                                "AOC-E: {} units{}",
                                call.aoc_units,
                                if charging.free_of_charge { " (free of charge)" } else { "" }
                            );
                        }
                    }
                    InvokeArg::PathReplacement => forward = call.bridged_call,
                    InvokeArg::Mwi { activate, number, .. } => {
                        if debug_apdu {
                            tracing::debug!("MWI {} for '{}'", if activate { "activate" } else { "deactivate" }, number);
                        }
                    }
                    InvokeArg::InformationFollowing => {
                        if debug_apdu {
                            tracing::debug!("Calling name follows in a later FACILITY");
                        }
                    }
                    InvokeArg::NotHandled(op) => {
                        if debug_apdu {
                            tracing::debug!("Don't know how to handle operation {}", op);
                        }
                    }
                },
                RoseComponent::ReturnResult(result) => {
                    if result.op == Some(rlt::OPERATION_IND) {
                        if let Some(id) = result.rlt_call_id {
                            tracing::debug!("Call {} is transferable, RLT call id {:06x}", cr, id);
                            call.rlt_call_id = Some(id);
                        }
                    } else if debug_apdu {
                        tracing::debug!("ROSE return result for invoke {}", result.invoke_id);
                    }
                }
                RoseComponent::ReturnError(err) => {
                    tracing::warn!("ROSE return error for invoke {}: error {}", err.invoke_id, err.error);
                }
                RoseComponent::Reject(reject) => {
                    tracing::warn!(
                        "ROSE reject for invoke {:?}: problem 0x{:02x}/{}",
                        reject.invoke_id,
                        reject.problem_tag,
                        reject.problem
                    );
                }
            }
        }

        // Path replacement is relayed untouched to the other leg
        if let Some(other) = forward {
            let res = self.attach_apdu(other, MsgType::Facility, Ok(data.to_vec())).and_then(|_| self.facility(queue, other));
            if let Err(e) = res {
                tracing::warn!("Unable to relay path replacement to call {}: {}", other, e);
            }
        }
    }

    /// Asks the switch to connect two calls to each other and drop us out of the path
    pub fn channel_bridge(&mut self, queue: &mut MessageQueue, c1: CallRef, c2: CallRef) -> Result<(), PriError> {
        let l1 = self.link_of(c1)?;
        let l2 = self.link_of(c2)?;
        if l1.switch != l2.switch {
            return Err(PriError::Incompatible("calls on different switch types"));
        }
        let (b1, b2) = (self.call_mut(c1)?.info.bearer.transcapability, self.call_mut(c2)?.info.bearer.transcapability);
        if b1 != b2 {
            return Err(PriError::Incompatible("calls with different bearer capabilities"));
        }
        if l1.inst != l2.inst {
            return Err(PriError::Incompatible("calls on different data links"));
        }

        match l1.switch {
            SwitchType::Ni2 | SwitchType::Lucent5e | SwitchType::Att4ess => {
                let id = self.next_invoke_id();
                self.attach_apdu(c1, MsgType::Facility, ops::encode_eect(id, c2))?;
                self.facility(queue, c1)
            }
            SwitchType::Dms100 => {
                // The APDU names the transferable call and travels on the other one
                let (bearer, id) = match (self.call_mut(c1)?.rlt_call_id, self.call_mut(c2)?.rlt_call_id) {
                    (_, Some(id)) => (c1, id),
                    (Some(id), None) => (c2, id),
                    (None, None) => return Err(PriError::Incompatible("neither call is transferable")),
                };
                self.attach_apdu(bearer, MsgType::Facility, ops::encode_rlt_third_party(id))?;
                self.facility(queue, bearer)
            }
            SwitchType::Qsig => {
                let id = self.next_invoke_id();
                self.attach_apdu(c1, MsgType::Facility, ops::encode_anfpr(id, 0, c2))?;
                let id = self.next_invoke_id();
                self.attach_apdu(c2, MsgType::Facility, ops::encode_anfpr(id, 1, c1))?;
                self.call_mut(c1)?.bridged_call = Some(c2);
                self.call_mut(c2)?.bridged_call = Some(c1);
                self.facility(queue, c1)?;
                self.facility(queue, c2)
            }
            _ => Err(PriError::Incompatible("no transfer procedure on this switch type")),
        }
    }

    /// Message waiting indication in a call independent SETUP towards `req.called`
    pub fn mwi(
        &mut self,
        queue: &mut MessageQueue,
        sched: &mut Scheduler,
        cr: CallRef,
        activate: bool,
        req: &SetupRequest,
    ) -> Result<(), PriError> {
        if req.called.is_empty() {
            return Err(PriError::InvalidArgument("message waiting needs a called number"));
        }
        let id = self.next_invoke_id();
        self.attach_apdu(cr, MsgType::Setup, ops::encode_mwi(id, activate, &req.called))?;
        let req = req.clone().call_independent();
        self.setup(queue, sched, cr, &req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pri_config::{InterfaceKind, SharedConfig};
    use pri_core::{ManualClock, protodisc, sapi, tei};
    use pri_pdus::q931::ie::bearer::trans_cap;
    use pri_pdus::q931::{IeKind, Q931Message, WalkEvent};
    use pri_saps::SapMsgInner;

    use crate::callcontrol::cc_entity::CcLink;
    use crate::lapd::ROOT;

    fn cc(switch: SwitchType, node: NodeType) -> (CallControl, Scheduler, DlLinkInfo) {
        let config = SharedConfig::new(node, switch, InterfaceKind::Pri);
        config.state_write().sendfacility = true;
        let mut cc = CallControl::new(config);
        let link = DlLinkInfo {
            inst: ROOT,
            master: None,
            node,
            switch,
            bri: false,
            sapi: sapi::CALL_CTRL,
            tei: tei::PRI,
            protodisc: protodisc::Q931,
            gr303_master: false,
        };
        cc.links.insert(ROOT, CcLink { info: link, cref: 1, up: true, rx_count: 0, tx_count: 0 });
        (cc, Scheduler::new(Box::new(ManualClock::new()), ROOT), link)
    }

    fn facility_ies(queue: &mut MessageQueue) -> Vec<(u8, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(msg) = queue.pop_front() {
            let SapMsgInner::DlDataReq(req) = msg.msg else { continue };
            let msg = Q931Message::from_bytes(&req.payload).unwrap();
            for ev in msg.walk() {
                if let Ok(WalkEvent::Ie { ie, .. }) = ev {
                    if ie.kind() == Some(IeKind::Facility) {
                        out.push((msg.msg_type, ie.data));
                    }
                }
            }
        }
        out
    }

    #[test]
    fn qsig_setup_carries_name_and_diversion() {
        let (mut cc, mut sched, _) = cc(SwitchType::Qsig, NodeType::Cpe);
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        let req = SetupRequest::new("4000", 0).caller("1000", "Alice", 0, 0).redirecting("3000", 0, 0, 1);
        cc.setup(&mut queue, &mut sched, cr, &req).unwrap();
        let ies = facility_ies(&mut queue);
        assert_eq!(ies.len(), 2);
        assert!(ies.iter().all(|(mt, _)| *mt == MsgType::Setup as u8));
        assert!(cc.call(cr).unwrap().info.apdus.is_empty());
    }

    #[test]
    fn ni2_network_sends_the_name_later() {
        let (mut cc, mut sched, _) = cc(SwitchType::Ni2, NodeType::Network);
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        let req = SetupRequest::new("4000", 0).caller("1000", "Alice", 0, 0);
        cc.setup(&mut queue, &mut sched, cr, &req).unwrap();
        assert_eq!(facility_ies(&mut queue).len(), 1);
        let pending = &cc.call(cr).unwrap().info.apdus;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message, MsgType::Facility as u8);
        assert!(!pending[0].sent);
    }

    #[test]
    fn nothing_attached_when_facilities_are_off() {
        let (mut cc, mut sched, _) = cc(SwitchType::Qsig, NodeType::Cpe);
        cc.config.state_write().sendfacility = false;
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        let req = SetupRequest::new("4000", 0).caller("1000", "Alice", 0, 0);
        cc.setup(&mut queue, &mut sched, cr, &req).unwrap();
        assert!(facility_ies(&mut queue).is_empty());
    }

    #[test]
    fn received_name_and_diversion_reach_the_call() {
        let (mut cc, _, link) = cc(SwitchType::Qsig, NodeType::Network);
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();

        let name = ops::encode_calling_name(true, 3, "Bob").unwrap();
        cc.handle_facility(&mut queue, cr, link, &name);
        assert_eq!(cc.call(cr).unwrap().info.callername, "Bob");

        let mut diverted = cc.call(cr).unwrap().info.clone();
        diverted.redirectingnum = "5551234".to_string();
        diverted.redirectingreason = 1;
        let dli2 = ops::encode_dli2(SwitchType::Qsig, 4, &diverted).unwrap();
        cc.handle_facility(&mut queue, cr, link, &dli2);
        let info = &cc.call(cr).unwrap().info;
        assert_eq!(info.redirectingnum, "5551234");
        assert_eq!(info.origcallednum, "5551234");
    }

    #[test]
    fn aoce_units_are_recorded() {
        let (mut cc, _, link) = cc(SwitchType::EuroIsdnE1, NodeType::Cpe);
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        let aoce = ops::encode_aoce_charging_unit(1, 12).unwrap();
        cc.handle_facility(&mut queue, cr, link, &aoce);
        assert_eq!(cc.call(cr).unwrap().aoc_units, 12);

        let free = ops::encode_aoce_charging_unit(2, 0).unwrap();
        cc.handle_facility(&mut queue, cr, link, &free);
        assert_eq!(cc.call(cr).unwrap().aoc_units, 0);
    }

    #[test]
    fn garbage_facility_is_ignored() {
        let (mut cc, _, link) = cc(SwitchType::Ni2, NodeType::Cpe);
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        cc.handle_facility(&mut queue, cr, link, &[0x91, 0xa1, 0x03, 0x02]);
        assert!(queue.is_empty());
        assert!(cc.call(cr).is_some());
    }

    #[test]
    fn bridge_needs_matching_bearers() {
        let (mut cc, _, _) = cc(SwitchType::Ni2, NodeType::Cpe);
        let mut queue = MessageQueue::new();
        let c1 = cc.new_call().unwrap();
        let c2 = cc.new_call().unwrap();
        cc.calls.get_mut(&c2).unwrap().info.bearer.transcapability = trans_cap::DIGITAL;
        assert!(matches!(cc.channel_bridge(&mut queue, c1, c2), Err(PriError::Incompatible(_))));
        assert!(matches!(cc.channel_bridge(&mut queue, c1, 0x8123), Err(PriError::NoSuchCall(0x8123))));
        assert!(queue.is_empty());
    }

    #[test]
    fn ni2_bridge_sends_explicit_transfer() {
        let (mut cc, _, _) = cc(SwitchType::Ni2, NodeType::Cpe);
        let mut queue = MessageQueue::new();
        let c1 = cc.new_call().unwrap();
        let c2 = cc.new_call().unwrap();
        cc.channel_bridge(&mut queue, c1, c2).unwrap();
        let ies = facility_ies(&mut queue);
        assert_eq!(ies.len(), 1);
        assert_eq!(ies[0].0, MsgType::Facility as u8);
    }

    #[test]
    fn dms100_bridge_needs_a_transferable_call() {
        let (mut cc, _, _) = cc(SwitchType::Dms100, NodeType::Cpe);
        let mut queue = MessageQueue::new();
        let c1 = cc.new_call().unwrap();
        let c2 = cc.new_call().unwrap();
        assert!(cc.channel_bridge(&mut queue, c1, c2).is_err());
        cc.calls.get_mut(&c1).unwrap().rlt_call_id = Some(0x123456);
        cc.channel_bridge(&mut queue, c1, c2).unwrap();
        // Sent on the leg without the id
        let mut sent_on = Vec::new();
        while let Some(msg) = queue.pop_front() {
            if let SapMsgInner::DlDataReq(req) = msg.msg {
                sent_on.push(req.cr);
            }
        }
        assert_eq!(sent_on, vec![Some(c2)]);
    }

    #[test]
    fn mwi_goes_out_call_independent() {
        let (mut cc, mut sched, _) = cc(SwitchType::Qsig, NodeType::Cpe);
        cc.config.state_write().sendfacility = false;
        let mut queue = MessageQueue::new();
        let cr = cc.new_call().unwrap();
        let req = SetupRequest::new("2000", 0);
        cc.mwi(&mut queue, &mut sched, cr, true, &req).unwrap();
        let ies = facility_ies(&mut queue);
        assert_eq!(ies.len(), 1);
        assert_eq!(ies[0].0, MsgType::Setup as u8);
        assert!(cc.call(cr).unwrap().info.channel.justsignalling);
    }
}

//! TEI management (layer 2 management entity) on SAPI 63 / TEI 127.
//!
//! The network hands out TEIs starting at 64, one terminal at a time. The
//! terminal requests a TEI after startup and creates a subchannel for it once
//! assigned. Check and remove requests from the network are honoured.

use pri_core::pri_entities::PriEntity;
use pri_core::{DebugFlags, InstanceId, NodeType, Sap, tei};
use pri_pdus::q921::{TEI_MGMT_ENTITY, TeiMgmtMsg, TeiMsgType};
use pri_saps::SapMsg;
use pri_saps::SapMsgInner;
use pri_saps::dl::DlRemoveInd;

use crate::MessageQueue;
use crate::lapd::instance::{LinkCtx, Q921State};
use crate::lapd::lapd_entity::Lapd;
use crate::scheduler::Scheduler;

impl Lapd {
    pub(super) fn receive_mdl(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, id: InstanceId, payload: &[u8]) {
        if self.config.debug().has(DebugFlags::Q921_STATE) {
            tracing::debug!("Received MDL message on {}", id);
        }
        if payload.first() != Some(&TEI_MGMT_ENTITY) {
            tracing::error!("Received MDL message with unsupported management entity {:02x?}", payload.first());
            return;
        }
        if payload.get(4).is_some_and(|ai| ai & 0x01 == 0) {
            tracing::error!("Received MDL message with multibyte TEI identifier");
            return;
        }
        let msg = match TeiMgmtMsg::from_bytes(payload) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!("Undecodable MDL message: {}", e);
                return;
            }
        };
        let Some(node) = self.instance(id).map(|i| i.node) else {
            return;
        };

        match (node, msg.msg) {
            (NodeType::Network, TeiMsgType::IdentityRequest) => self.tei_identity_request(queue, sched, id, msg),
            (NodeType::Cpe, TeiMsgType::IdentityAssigned) => self.tei_identity_assigned(queue, sched, id, msg),
            (NodeType::Cpe, TeiMsgType::IdentityDenied) => {
                if self.instance(id).is_some_and(|i| i.ri == msg.ri) {
                    tracing::warn!("TEI request denied by the network (ai {}), retrying on T202", msg.ai);
                }
            }
            (NodeType::Cpe, TeiMsgType::IdentityCheckRequest) => {
                let Some(sub_tei) = self.instance(id).and_then(|i| i.subchannel).and_then(|s| self.instance(s)).map(|s| s.tei) else {
                    return;
                };
                if msg.ai == tei::GROUP || msg.ai == sub_tei {
                    let ri = rand::random_range(0..65535u16);
                    self.with_inst(queue, sched, id, |inst, ctx| inst.send_tei(ctx, TeiMsgType::IdentityCheckResponse, ri, sub_tei, true));
                }
            }
            (NodeType::Cpe, TeiMsgType::IdentityRemove) => {
                let sub_tei = self.instance(id).and_then(|i| i.subchannel).and_then(|s| self.instance(s)).map(|s| s.tei);
                if sub_tei.is_some_and(|t| msg.ai == tei::GROUP || msg.ai == t) {
                    tracing::info!("Network removed TEI {}", msg.ai);
                    self.release_and_reacquire(queue, sched, id);
                }
            }
            (_, other) => {
                if self.config.debug().has(DebugFlags::Q921_STATE) {
                    tracing::debug!("Ignoring TEI management message {:?}", other);
                }
            }
        }
        self.process_releases(queue, sched);
    }

    fn tei_identity_request(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, id: InstanceId, msg: TeiMgmtMsg) {
        if msg.ai != tei::GROUP {
            tracing::error!("Received TEI identity request with invalid TEI {}", msg.ai);
            self.with_inst(queue, sched, id, |inst, ctx| inst.send_tei(ctx, TeiMsgType::IdentityDenied, msg.ri, msg.ai, true));
            return;
        }
        if self.instance(id).is_some_and(|i| i.subchannel.is_some()) {
            tracing::warn!("TEI already handed out, denying request with Ri {:04x}", msg.ri);
            self.with_inst(queue, sched, id, |inst, ctx| inst.send_tei(ctx, TeiMsgType::IdentityDenied, msg.ri, tei::GROUP, true));
            return;
        }
        let Some(switch) = self.instance(id).map(|i| i.switch) else {
            return;
        };
        let Some(sub) = self.alloc(id, switch, true, tei::AUTO_FIRST) else {
            return;
        };
        tracing::info!("Assigning TEI {} to Ri {:04x}", tei::AUTO_FIRST, msg.ri);
        self.with_inst(queue, sched, id, |inst, ctx| inst.send_tei(ctx, TeiMsgType::IdentityAssigned, msg.ri, tei::AUTO_FIRST, true));
        self.announce(queue, sub);
        self.with_inst(queue, sched, sub, |inst, ctx| inst.start(ctx, false));
    }

    fn tei_identity_assigned(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, id: InstanceId, msg: TeiMgmtMsg) {
        let Some(master) = self.instance(id) else {
            return;
        };
        if msg.ri != master.ri {
            if self.config.debug().has(DebugFlags::Q921_STATE) {
                tracing::debug!("TEI assignment received for another Ri {:04x} (ours is {:04x})", msg.ri, master.ri);
            }
            return;
        }
        let current = master.subchannel;
        let switch = master.switch;
        self.with_inst(queue, sched, id, |inst, ctx| ctx_cancel_t202(inst, ctx));

        if let Some(sub) = current {
            if self.instance(sub).is_some_and(|s| s.tei == msg.ai) {
                tracing::error!("TEI {} already assigned to us, releasing it", msg.ai);
                self.release_and_reacquire(queue, sched, id);
                return;
            }
            // Replaced by the new assignment
            if let Some(mut old) = self.instances.get_mut(sub.0).and_then(|s| s.take()) {
                let mut ctx = LinkCtx { queue: &mut *queue, sched: &mut *sched, config: &self.config };
                old.cancel_timers(&mut ctx);
                queue.push_back(SapMsg::new(Sap::DlSap, PriEntity::Lapd, PriEntity::CallControl, SapMsgInner::DlRemoveInd(DlRemoveInd { inst: sub })));
            }
            if let Some(m) = self.instances[id.0].as_mut() {
                m.subchannel = None;
            }
        }

        tracing::info!("TEI assigned to {}", msg.ai);
        let Some(sub) = self.alloc(id, switch, true, msg.ai) else {
            return;
        };
        if let Some(m) = self.instances[id.0].as_mut() {
            m.state = Q921State::TeiAssigned;
            m.n202_counter = 0;
        }
        self.announce(queue, sub);
        self.with_inst(queue, sched, sub, |inst, ctx| inst.start(ctx, true));
    }
}

fn ctx_cancel_t202(inst: &mut crate::lapd::instance::Instance, ctx: &mut LinkCtx) {
    if let Some(h) = inst.t202.take() {
        ctx.sched.schedule_del(h);
    }
}

use pri_config::{SharedConfig, TimerIdx};
use pri_core::pri_entities::PriEntity;
use pri_core::{DebugFlags, InstanceId, Sap, SwitchType, tei};
use pri_pdus::fcs16;
use pri_pdus::q921::{Q921Control, Q921Frame, Q921Header, UFrameKind};
use pri_saps::dl::{DlAssignInd, DlDataReq, DlRemoveInd};
use pri_saps::ph::PhDataInd;
use pri_saps::{SapMsg, SapMsgInner};

use crate::lapd::instance::{Instance, LinkCtx};
use crate::scheduler::{LapdTimer, Scheduler, TimerEvent};
use crate::{MessageQueue, PriEntityTrait};

/// Master instance of the D-channel
pub const ROOT: InstanceId = InstanceId(0);

/// Q.921 entity. Owns the instance arena: the D-channel itself and, on BRI
/// point-to-multipoint and GR-303, one subchannel hanging off it.
pub struct Lapd {
    pub(super) config: SharedConfig,
    pub(super) instances: Vec<Option<Instance>>,
}

impl Lapd {
    pub fn new(config: SharedConfig) -> Self {
        let cfg = config.config();
        let bri = cfg.interface.is_bri();
        let root_tei = match cfg.interface {
            pri_config::InterfaceKind::BriPtmp => tei::GROUP,
            _ => tei::PRI,
        };
        let window = config.timer(TimerIdx::K).max(1) as usize;
        let mut lapd = Self { config: config.clone(), instances: vec![Some(Instance::new(ROOT, None, cfg.node, cfg.switch, bri, root_tei, window))] };

        let sub_switch = match cfg.switch {
            SwitchType::Gr303Eoc => Some(SwitchType::Gr303EocPath),
            SwitchType::Gr303Tmc => Some(SwitchType::Gr303TmcSwitching),
            _ => None,
        };
        if let Some(switch) = sub_switch {
            lapd.alloc(ROOT, switch, false, tei::PRI);
        }
        lapd
    }

    /// Announces the instances to call control and starts them, subchannel first
    pub fn startup(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler) {
        let ids: Vec<InstanceId> = self.instances.iter().flatten().map(|i| i.id).collect();
        for &id in &ids {
            self.announce(queue, id);
        }
        for &id in ids.iter().rev() {
            self.with_inst(queue, sched, id, |inst, ctx| {
                let is_cpe = inst.node.is_cpe();
                inst.start(ctx, is_cpe)
            });
        }
        self.process_releases(queue, sched);
    }

    /// Resets the D-channel and brings it up again
    pub fn restart(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler) {
        self.with_inst(queue, sched, ROOT, |inst, ctx| {
            let is_cpe = inst.node.is_cpe();
            inst.reset(ctx);
            inst.start(ctx, is_cpe)
        });
        self.process_releases(queue, sched);
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(id.0)?.as_ref()
    }

    pub fn root(&self) -> Option<&Instance> {
        self.instance(ROOT)
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter().flatten()
    }

    /// Creates a subchannel of `master` in a free arena slot
    pub(super) fn alloc(&mut self, master: InstanceId, switch: SwitchType, bri: bool, tei_value: u8) -> Option<InstanceId> {
        let window = self.config.timer(TimerIdx::K).max(1) as usize;
        let node = self.instance(master)?.node;
        let slot = match self.instances.iter().skip(1).position(|i| i.is_none()) {
            Some(pos) => pos + 1,
            None => {
                self.instances.push(None);
                self.instances.len() - 1
            }
        };
        let id = InstanceId(slot);
        self.instances[slot] = Some(Instance::new(id, Some(master), node, switch, bri, tei_value, window));
        if let Some(m) = self.instances[master.0].as_mut() {
            m.subchannel = Some(id);
        }
        Some(id)
    }

    /// Tells call control about an instance
    pub(super) fn announce(&self, queue: &mut MessageQueue, id: InstanceId) {
        if let Some(inst) = self.instance(id) {
            queue.push_back(SapMsg::new(
                Sap::DlSap,
                PriEntity::Lapd,
                PriEntity::CallControl,
                SapMsgInner::DlAssignInd(DlAssignInd { link: inst.link_info() }),
            ));
        }
    }

    pub(super) fn with_inst<R>(
        &mut self,
        queue: &mut MessageQueue,
        sched: &mut Scheduler,
        id: InstanceId,
        f: impl FnOnce(&mut Instance, &mut LinkCtx) -> R,
    ) -> Option<R> {
        let inst = self.instances.get_mut(id.0)?.as_mut()?;
        let mut ctx = LinkCtx { queue: &mut *queue, sched: &mut *sched, config: &self.config };
        Some(f(inst, &mut ctx))
    }

    /// Drops the subchannel of `master` and starts over with TEI acquisition
    pub(super) fn release_and_reacquire(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, master: InstanceId) {
        let Some(sub_id) = self.instances.get_mut(master.0).and_then(|m| m.as_mut()).and_then(|m| m.subchannel.take()) else {
            tracing::error!("No TEI to release on {}", master);
            return;
        };
        if let Some(mut sub) = self.instances.get_mut(sub_id.0).and_then(|s| s.take()) {
            tracing::info!("Releasing TEI {} ({})", sub.tei, sub_id);
            let mut ctx = LinkCtx { queue: &mut *queue, sched: &mut *sched, config: &self.config };
            sub.dchannel_down(&mut ctx);
            sub.cancel_timers(&mut ctx);
            queue.push_back(SapMsg::new(
                Sap::DlSap,
                PriEntity::Lapd,
                PriEntity::CallControl,
                SapMsgInner::DlRemoveInd(DlRemoveInd { inst: sub_id }),
            ));
        }
        self.with_inst(queue, sched, master, |inst, ctx| {
            let is_cpe = inst.node.is_cpe();
            inst.start(ctx, is_cpe)
        });
    }

    /// Runs the TEI releases link procedures asked for
    pub(super) fn process_releases(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler) {
        loop {
            let Some(inst) = self.instances.iter_mut().flatten().find(|i| i.tei_release_pending) else {
                break;
            };
            inst.tei_release_pending = false;
            let master = inst.master;
            if let Some(master) = master {
                self.release_and_reacquire(queue, sched, master);
            }
        }
    }

    /// Instance a received frame is addressed to
    fn route(&self, h: &Q921Header) -> Option<InstanceId> {
        let mut cur = Some(ROOT);
        while let Some(id) = cur {
            let inst = self.instance(id)?;
            if inst.sapi == h.sapi && (inst.tei == h.tei || h.tei == tei::GROUP) {
                return Some(id);
            }
            cur = inst.subchannel;
        }
        None
    }

    fn rx_ph_data_ind(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, prim: PhDataInd) {
        let Some(raw) = fcs16::strip_fcs(&prim.frame) else {
            tracing::debug!("Dropping frame of {} octets", prim.frame.len());
            return;
        };
        let frame = match Q921Frame::from_bytes(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("Dropping undecodable frame: {}", e);
                return;
            }
        };
        if self.config.debug().has(DebugFlags::Q921_DUMP) {
            tracing::debug!("{}", frame.dump(false));
        }
        if let Some(root) = self.instances[ROOT.0].as_mut() {
            root.rx_count += 1;
        }

        let Some(id) = self.route(&frame.header) else {
            if self.config.debug().has(DebugFlags::Q921_STATE) {
                tracing::debug!("Received frame for unknown SAPI/TEI {}/{}", frame.header.sapi, frame.header.tei);
            }
            return;
        };
        let is_mgmt_ui = self.instance(id).is_some_and(|i| i.is_mgmt()) && matches!(frame.control, Q921Control::U { kind: UFrameKind::Ui, .. });
        if is_mgmt_ui {
            self.receive_mdl(queue, sched, id, &frame.payload);
        } else {
            self.with_inst(queue, sched, id, |inst, ctx| {
                if id != ROOT {
                    inst.rx_count += 1;
                }
                inst.receive(ctx, frame);
                inst.reschedule_t203(ctx);
            });
        }
        self.process_releases(queue, sched);
    }

    fn rx_dl_data_req(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, prim: DlDataReq) {
        let inst = prim.inst;
        let sent = self.with_inst(queue, sched, inst, |i, ctx| i.transmit_iframe(ctx, prim.payload));
        if sent.is_none() {
            tracing::warn!("DL-DATA for unknown instance {} dropped", inst);
        }
        self.process_releases(queue, sched);
    }
}

impl PriEntityTrait for Lapd {
    fn entity(&self) -> PriEntity {
        PriEntity::Lapd
    }

    fn rx_prim(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, message: SapMsg) {
        tracing::trace!("rx_prim: {}", message.msg);
        match message.msg {
            SapMsgInner::PhDataInd(prim) => self.rx_ph_data_ind(queue, sched, prim),
            SapMsgInner::DlDataReq(prim) => self.rx_dl_data_req(queue, sched, prim),
            other => tracing::warn!("Lapd: unexpected primitive {} from {:?}", other, message.src),
        }
    }

    fn rx_timer(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler, event: TimerEvent) {
        let TimerEvent::Lapd { inst, timer } = event else {
            tracing::warn!("Lapd: foreign timer {}", event);
            return;
        };
        let ran = self.with_inst(queue, sched, inst, |i, ctx| match timer {
            LapdTimer::T200 => i.t200_expire(ctx),
            LapdTimer::T203 => i.t203_expire(ctx),
            LapdTimer::T202 => {
                i.t202 = None;
                i.tei_request(ctx);
            }
            LapdTimer::Sabme => {
                i.sabme_timer = None;
                i.send_sabme(ctx, true);
            }
        });
        if ran.is_none() {
            tracing::debug!("Timer {} for a freed instance", event);
        }
        self.process_releases(queue, sched);
    }

    fn run_end(&mut self, queue: &mut MessageQueue, sched: &mut Scheduler) {
        let owed: Vec<InstanceId> = self.instances().filter(|i| i.ack_pending()).map(|i| i.id).collect();
        for id in owed {
            self.with_inst(queue, sched, id, |i, ctx| i.rr(ctx, false, false));
        }
    }
}

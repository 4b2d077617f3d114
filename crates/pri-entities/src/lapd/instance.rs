use std::collections::VecDeque;

use pri_config::{SharedConfig, TimerIdx};
use pri_core::pri_entities::PriEntity;
use pri_core::{DebugFlags, InstanceId, NodeType, Sap, SwitchType, protodisc, sapi, tei};
use pri_pdus::q921::{Q921Control, Q921Frame, Q921Header, SFrameKind, TeiMgmtMsg, TeiMsgType, UFrameKind};
use pri_saps::cc::{CcEventInd, EvError, PriEvent};
use pri_saps::dl::{DlDataInd, DlEstablishInd, DlLinkInfo, DlReleaseInd, DlUnitdataInd};
use pri_saps::ph::PhDataReq;
use pri_saps::{SapMsg, SapMsgInner};

use crate::MessageQueue;
use crate::scheduler::{LapdTimer, Scheduler, TimerEvent, TimerHandle};

/// Data link states of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Q921State {
    Down,
    TeiUnassigned,
    TeiAwaitingAssign,
    TeiAssigned,
    LinkConnectionReleased,
    LinkConnectionEstablished,
    AwaitingEstablish,
}

impl core::fmt::Display for Q921State {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Q921State::Down => "DOWN",
            Q921State::TeiUnassigned => "TEI_UNASSIGNED",
            Q921State::TeiAwaitingAssign => "TEI_AWAITING_ASSIGN",
            Q921State::TeiAssigned => "TEI_ASSIGNED",
            Q921State::LinkConnectionReleased => "LINK_CONNECTION_RELEASED",
            Q921State::LinkConnectionEstablished => "LINK_CONNECTION_ESTABLISHED",
            Q921State::AwaitingEstablish => "AWAITING_ESTABLISH",
        };
        f.write_str(s)
    }
}

/// Queue and scheduler a link procedure works on
pub struct LinkCtx<'a> {
    pub queue: &'a mut MessageQueue,
    pub sched: &'a mut Scheduler,
    pub config: &'a SharedConfig,
}

impl LinkCtx<'_> {
    fn debug(&self, flag: u32) -> bool {
        self.config.debug().has(flag)
    }

    fn timer(&self, idx: TimerIdx) -> i32 {
        self.config.timer(idx)
    }

    /// Arms `timer` with the configured value of `idx`. Disabled timers are not armed.
    fn arm(&mut self, inst: InstanceId, timer: LapdTimer, idx: TimerIdx) -> Option<TimerHandle> {
        let delay = self.config.state_read().timers.delay_ms(idx)?;
        self.sched.schedule_event(delay, TimerEvent::Lapd { inst, timer }, inst).ok()
    }

    fn cancel(&mut self, handle: &mut Option<TimerHandle>) {
        if let Some(h) = handle.take() {
            self.sched.schedule_del(h);
        }
    }
}

/// Frame waiting for acknowledgement. N(R) and P are refreshed on retransmission.
#[derive(Debug, Clone)]
pub struct TxFrame {
    pub n_s: u8,
    pub n_r: u8,
    pub p: bool,
    pub payload: Vec<u8>,
    pub transmitted: bool,
}

#[inline]
fn inc(x: u8) -> u8 {
    (x + 1) & 0x7f
}

/// One LAPD data link: a PRI D-channel, a BRI TEI or a GR-303 split channel
pub struct Instance {
    pub id: InstanceId,
    pub master: Option<InstanceId>,
    pub subchannel: Option<InstanceId>,

    pub node: NodeType,
    pub switch: SwitchType,
    pub bri: bool,
    pub sapi: u8,
    pub tei: u8,
    pub protodisc: u8,

    pub state: Q921State,

    pub v_s: u8,
    pub v_a: u8,
    pub v_r: u8,
    /// Last N(R) we sent, an acknowledgement is owed while it differs from V(R)
    pub v_na: u8,

    pub window: usize,
    /// Frames transmitted and not yet acknowledged
    pub windowlen: usize,
    pub txqueue: VecDeque<TxFrame>,

    pub sentrej: bool,
    pub solicitfbit: bool,
    /// Peer sent RNR
    pub busy: bool,
    pub retrans: i32,
    pub sabme_count: i32,

    /// Reference number of our pending TEI request
    pub ri: u16,
    pub n202_counter: i32,

    pub t200: Option<TimerHandle>,
    pub t203: Option<TimerHandle>,
    pub t202: Option<TimerHandle>,
    pub sabme_timer: Option<TimerHandle>,

    pub rx_count: u64,
    pub tx_count: u64,

    /// Set when the TEI of this subchannel has to be given up. Handled by the
    /// arena owner once the current procedure returns.
    pub tei_release_pending: bool,
}

impl Instance {
    pub fn new(id: InstanceId, master: Option<InstanceId>, node: NodeType, switch: SwitchType, bri: bool, tei_value: u8, window: usize) -> Self {
        let mut sapi_value = if tei_value == tei::GROUP { sapi::LAYER2_MANAGEMENT } else { sapi::CALL_CTRL };
        let mut tei_value = tei_value;
        let mut pd = protodisc::Q931;
        match switch {
            SwitchType::Gr303Eoc => {
                pd = protodisc::GR303;
                sapi_value = sapi::GR303_EOC;
                tei_value = tei::GR303_EOC_OPS;
            }
            SwitchType::Gr303EocPath => {
                pd = protodisc::GR303;
                sapi_value = sapi::GR303_EOC;
                tei_value = tei::GR303_EOC_PATH;
            }
            SwitchType::Gr303Tmc => {
                pd = protodisc::GR303;
                sapi_value = sapi::GR303_TMC_CALLPROC;
                tei_value = tei::GR303_TMC_CALLPROC;
            }
            SwitchType::Gr303TmcSwitching => {
                pd = protodisc::GR303;
                sapi_value = sapi::GR303_TMC_SWITCHING;
                tei_value = tei::GR303_TMC_SWITCHING;
            }
            _ => {}
        }

        Self {
            id,
            master,
            subchannel: None,
            node,
            switch,
            bri,
            sapi: sapi_value,
            tei: tei_value,
            protodisc: pd,
            state: Q921State::LinkConnectionReleased,
            v_s: 0,
            v_a: 0,
            v_r: 0,
            v_na: 0,
            window,
            windowlen: 0,
            txqueue: VecDeque::new(),
            sentrej: false,
            solicitfbit: false,
            busy: false,
            retrans: 0,
            sabme_count: 0,
            ri: 0,
            n202_counter: 0,
            t200: None,
            t203: None,
            t202: None,
            sabme_timer: None,
            rx_count: 0,
            tx_count: 0,
            tei_release_pending: false,
        }
    }

    pub fn link_info(&self) -> DlLinkInfo {
        DlLinkInfo {
            inst: self.id,
            master: self.master,
            node: self.node,
            switch: self.switch,
            bri: self.bri,
            sapi: self.sapi,
            tei: self.tei,
            protodisc: self.protodisc,
            gr303_master: !self.bri && self.subchannel.is_some(),
        }
    }

    /// Broadcast TEI management link of a point-to-multipoint interface
    pub fn is_mgmt(&self) -> bool {
        self.sapi == sapi::LAYER2_MANAGEMENT && self.tei == tei::GROUP
    }

    /// C/R bit for a command (`true`) or response. The network sets C/R in commands.
    fn c_r(&self, command: bool) -> bool {
        match self.node {
            NodeType::Network => command,
            NodeType::Cpe => !command,
        }
    }

    fn header(&self, command: bool) -> Q921Header {
        Q921Header::new(self.sapi, self.c_r(command), self.tei)
    }

    fn to_cc(&self, ctx: &mut LinkCtx, msg: SapMsgInner) {
        ctx.queue.push_back(SapMsg::new(Sap::DlSap, PriEntity::Lapd, PriEntity::CallControl, msg));
    }

    pub fn to_host(&self, ctx: &mut LinkCtx, event: PriEvent) {
        ctx.queue
            .push_back(SapMsg::new(Sap::CcSap, PriEntity::Lapd, PriEntity::Host, SapMsgInner::CcEventInd(CcEventInd { event })));
    }

    fn transmit(&mut self, ctx: &mut LinkCtx, frame: Q921Frame) {
        self.tx_count += 1;
        if ctx.debug(DebugFlags::Q921_DUMP) {
            tracing::debug!("{}", frame.dump(true));
        }
        ctx.queue.push_back(SapMsg::new(
            Sap::PhSap,
            PriEntity::Lapd,
            PriEntity::PhyIo,
            SapMsgInner::PhDataReq(PhDataReq { inst: self.id, frame: frame.to_bytes() }),
        ));
        self.reschedule_t203(ctx);
    }

    /// Restarts T203 if it is running
    pub fn reschedule_t203(&mut self, ctx: &mut LinkCtx) {
        if self.t203.is_some() {
            ctx.cancel(&mut self.t203);
            if ctx.debug(DebugFlags::Q921_STATE) {
                tracing::debug!("-- Restarting T203 counter on {}", self.id);
            }
            self.t203 = ctx.arm(self.id, LapdTimer::T203, TimerIdx::T203);
        }
    }

    fn send_iframe_at(&mut self, ctx: &mut LinkCtx, idx: usize) {
        let f = &self.txqueue[idx];
        let frame = Q921Frame::iframe(self.header(true), f.n_s, f.n_r, f.p, f.payload.clone());
        self.transmit(ctx, frame);
    }

    pub fn send_ua(&mut self, ctx: &mut LinkCtx, pf: bool) {
        if ctx.debug(DebugFlags::Q921_STATE) {
            tracing::debug!("Sending Unnumbered Acknowledgement on {}", self.id);
        }
        let frame = Q921Frame::uframe(self.header(false), UFrameKind::Ua, pf, Vec::new());
        self.transmit(ctx, frame);
    }

    /// Sends SABME now, or just arms the retransmission timer when `now` is false
    pub fn send_sabme(&mut self, ctx: &mut LinkCtx, now: bool) {
        ctx.cancel(&mut self.sabme_timer);
        self.sabme_timer = ctx.arm(self.id, LapdTimer::Sabme, TimerIdx::T200);
        if !now {
            return;
        }
        if self.bri && self.master.is_some() && self.state == Q921State::AwaitingEstablish {
            if self.sabme_count >= ctx.timer(TimerIdx::N200) {
                ctx.cancel(&mut self.sabme_timer);
                tracing::info!("{}: no answer to SABME, giving up TEI {}", self.id, self.tei);
                self.tei_release_pending = true;
                return;
            }
            self.sabme_count += 1;
        }
        if ctx.debug(DebugFlags::Q921_STATE) {
            tracing::debug!("Sending Set Asynchronous Balanced Mode Extended on {}", self.id);
        }
        let frame = Q921Frame::uframe(self.header(true), UFrameKind::Sabme, true, Vec::new());
        self.transmit(ctx, frame);
        self.state = Q921State::AwaitingEstablish;
    }

    pub fn rr(&mut self, ctx: &mut LinkCtx, pbit: bool, command: bool) {
        let frame = Q921Frame::sframe(self.header(command), SFrameKind::Rr, self.v_r, pbit);
        self.v_na = self.v_r;
        if ctx.debug(DebugFlags::Q921_STATE) {
            tracing::debug!("Sending Receiver Ready ({}) on {}", self.v_r, self.id);
        }
        self.transmit(ctx, frame);
    }

    fn reject(&mut self, ctx: &mut LinkCtx, pf: bool) {
        let frame = Q921Frame::sframe(self.header(false), SFrameKind::Rej, self.v_r, pf);
        if ctx.debug(DebugFlags::Q921_STATE) {
            tracing::debug!("Sending Reject ({}) on {}", self.v_r, self.id);
        }
        self.sentrej = true;
        self.transmit(ctx, frame);
    }

    pub fn send_tei(&mut self, ctx: &mut LinkCtx, msg: TeiMsgType, ri: u16, ai: u8, command: bool) {
        let tei_msg = TeiMgmtMsg::new(msg, ri, ai);
        if ctx.debug(DebugFlags::Q921_STATE) {
            tracing::debug!("Sending TEI management message {}", tei_msg);
        }
        let frame = Q921Frame::uframe(self.header(command), UFrameKind::Ui, false, tei_msg.to_bytes());
        self.transmit(ctx, frame);
    }

    /// Asks the network for a TEI, retried on T202
    pub fn tei_request(&mut self, ctx: &mut LinkCtx) {
        if self.subchannel.is_some() {
            tracing::error!("Request for TEI but TEI already assigned");
            return;
        }
        self.n202_counter += 1;
        if self.n202_counter > ctx.timer(TimerIdx::N202) && ctx.debug(DebugFlags::Q921_STATE) {
            tracing::debug!("TEI request {} exceeds N202, still trying", self.n202_counter);
        }
        self.ri = rand::random_range(0..65535u16);
        self.send_tei(ctx, TeiMsgType::IdentityRequest, self.ri, tei::GROUP, true);
        self.state = Q921State::TeiAwaitingAssign;
        ctx.cancel(&mut self.t202);
        self.t202 = ctx.arm(self.id, LapdTimer::T202, TimerIdx::T202);
    }

    /// Queues an I-frame and sends it if the window allows
    pub fn transmit_iframe(&mut self, ctx: &mut LinkCtx, payload: Vec<u8>) {
        self.txqueue.push_back(TxFrame { n_s: self.v_s, n_r: self.v_r, p: false, payload, transmitted: false });
        self.v_s = inc(self.v_s);
        self.v_na = self.v_r;

        if self.retrans == 0 && !self.busy {
            if self.windowlen < self.window {
                self.windowlen += 1;
                let idx = self.txqueue.len() - 1;
                self.txqueue[idx].transmitted = true;
                self.send_iframe_at(ctx, idx);
            } else if ctx.debug(DebugFlags::Q921_STATE) {
                tracing::debug!("Delaying transmission, window is {}/{} long", self.windowlen, self.window);
            }
        }
        ctx.cancel(&mut self.t203);
        if self.t200.is_none() {
            if ctx.debug(DebugFlags::Q921_STATE) {
                tracing::debug!("Starting T200 timer on {}", self.id);
            }
            self.t200 = ctx.arm(self.id, LapdTimer::T200, TimerIdx::T200);
        } else if ctx.debug(DebugFlags::Q921_STATE) {
            tracing::debug!("T200 timer already going on {}", self.id);
        }
    }

    fn ack_packet(&mut self, ctx: &mut LinkCtx, num: u8) -> bool {
        let Some(pos) = self.txqueue.iter().position(|f| f.n_s == num) else {
            return false;
        };
        self.txqueue.remove(pos);
        if ctx.debug(DebugFlags::Q921_STATE) {
            tracing::debug!("-- ACKing packet {}, new txqueue is {} ({}-{})", num, self.txqueue.len(), self.v_a, self.v_s);
        }
        self.retrans = 0;
        self.windowlen = self.windowlen.saturating_sub(1);

        // The window moved, send the next waiting frame
        if let Some(idx) = self.txqueue.iter().position(|f| !f.transmitted) {
            self.txqueue[idx].n_r = self.v_r;
            self.txqueue[idx].transmitted = true;
            self.windowlen += 1;
            self.send_iframe_at(ctx, idx);
        }
        true
    }

    /// Processes N(R). Returns false when the acknowledgement was invalid and the
    /// link has been restarted.
    fn ack_rx(&mut self, ctx: &mut LinkCtx, ack: u8) -> bool {
        let mut x = self.v_a;
        while x != self.v_s && x != ack {
            x = inc(x);
        }
        if x != ack {
            tracing::error!("ACK received for '{}' outside of window of '{}' to '{}', restarting", ack, self.v_a, self.v_s);
            self.dchannel_down(ctx);
            self.start(ctx, true);
            return false;
        }

        let mut x = self.v_a;
        while x != ack {
            self.ack_packet(ctx, x);
            x = inc(x);
        }
        self.v_a = ack;

        if self.txqueue.is_empty() {
            ctx.cancel(&mut self.t200);
        }
        ctx.cancel(&mut self.t203);
        if self.txqueue.is_empty() {
            if ctx.debug(DebugFlags::Q921_STATE) {
                tracing::debug!("-- Nothing left, starting T203 counter");
            }
            self.t203 = ctx.arm(self.id, LapdTimer::T203, TimerIdx::T203);
        } else if self.t200.is_none() {
            if ctx.debug(DebugFlags::Q921_STATE) {
                tracing::debug!("-- Something left to transmit, restarting T200 counter");
            }
            self.t200 = ctx.arm(self.id, LapdTimer::T200, TimerIdx::T200);
        }
        true
    }

    pub fn t200_expire(&mut self, ctx: &mut LinkCtx) {
        self.t200 = None;
        let n200 = ctx.timer(TimerIdx::N200);
        if !self.txqueue.is_empty() {
            let v_r = self.v_r;
            if let Some(head) = self.txqueue.front_mut() {
                head.p = true;
                head.n_r = v_r;
            }
            self.v_na = self.v_r;
            self.solicitfbit = true;
            self.retrans += 1;

            if self.retrans < n200 {
                if self.busy {
                    self.rr(ctx, true, true);
                } else {
                    if !self.txqueue[0].transmitted {
                        tracing::error!("!! Not good - head of queue has not been transmitted yet");
                        self.txqueue[0].transmitted = true;
                        self.windowlen += 1;
                    }
                    if ctx.debug(DebugFlags::Q921_STATE) {
                        tracing::debug!("-- Retransmitting {} bytes", self.txqueue[0].payload.len());
                    }
                    self.send_iframe_at(ctx, 0);
                }
                self.t200 = ctx.arm(self.id, LapdTimer::T200, TimerIdx::T200);
            } else {
                tracing::info!("-- Timeout occured on {}, restarting", self.id);
                self.state = Q921State::LinkConnectionReleased;
                self.dchannel_down(ctx);
                self.start(ctx, true);
            }
        } else if self.solicitfbit {
            self.retrans += 1;
            if self.retrans < n200 {
                if ctx.debug(DebugFlags::Q921_STATE) {
                    tracing::debug!("-- Retrying poll on {}", self.id);
                }
                self.rr(ctx, true, true);
                self.t200 = ctx.arm(self.id, LapdTimer::T200, TimerIdx::T200);
            } else {
                tracing::info!("-- Timeout occured on {}, restarting", self.id);
                self.state = Q921State::LinkConnectionReleased;
                if self.bri && self.master.is_some() {
                    self.tei_release_pending = true;
                } else {
                    self.dchannel_down(ctx);
                    self.start(ctx, true);
                }
            }
        } else {
            tracing::error!("T200 counter expired, nothing to send...");
        }
    }

    pub fn t203_expire(&mut self, ctx: &mut LinkCtx) {
        self.t203 = None;
        if self.state == Q921State::LinkConnectionEstablished {
            if ctx.debug(DebugFlags::Q921_STATE) {
                tracing::debug!("T203 counter expired, sending RR and scheduling T203 again");
            }
            self.solicitfbit = true;
            self.retrans = 0;
            self.rr(ctx, true, true);
            ctx.cancel(&mut self.t200);
            self.t200 = ctx.arm(self.id, LapdTimer::T200, TimerIdx::T200);
        } else if ctx.debug(DebugFlags::Q921_STATE) {
            tracing::debug!("T203 counter expired in weird state {}", self.state);
        }
    }

    fn handle_iframe(&mut self, ctx: &mut LinkCtx, n_s: u8, n_r: u8, p: bool, payload: Vec<u8>) {
        if n_s == self.v_r {
            self.v_r = inc(self.v_r);
            self.sentrej = false;
            if !self.ack_rx(ctx, n_r) {
                return;
            }
            if p {
                self.rr(ctx, true, false);
            } else if self.busy {
                self.rr(ctx, false, false);
            }
            // Outstanding acknowledgements go out at the end of the run, so a
            // response from call control can carry them
            let link = self.link_info();
            self.to_cc(ctx, SapMsgInner::DlDataInd(DlDataInd { link, payload }));
        } else if !self.sentrej {
            if ctx.debug(DebugFlags::Q921_STATE) {
                tracing::debug!("-- Got out of sequence I-frame {} (expected {}), rejecting", n_s, self.v_r);
            }
            self.reject(ctx, p);
        } else if p {
            self.rr(ctx, true, false);
        }
    }

    /// Handles a frame addressed to this instance
    pub fn receive(&mut self, ctx: &mut LinkCtx, frame: Q921Frame) {
        match frame.control {
            Q921Control::I { n_s, n_r, p } => {
                if self.state != Q921State::LinkConnectionEstablished {
                    tracing::error!("Got I-frame on {} while link state {}", self.id, self.state);
                    return;
                }
                self.handle_iframe(ctx, n_s, n_r, p, frame.payload);
            }
            Q921Control::S { kind, n_r, p_f } => {
                if self.state != Q921State::LinkConnectionEstablished {
                    tracing::error!("Got S-frame on {} while link state {}", self.id, self.state);
                    return;
                }
                self.handle_sframe(ctx, kind, n_r, p_f);
            }
            Q921Control::U { kind, p_f } => self.handle_uframe(ctx, frame.header, kind, p_f, frame.payload),
        }
    }

    fn handle_sframe(&mut self, ctx: &mut LinkCtx, kind: SFrameKind, n_r: u8, p_f: bool) {
        match kind {
            SFrameKind::Rr => {
                if ctx.debug(DebugFlags::Q921_STATE) {
                    tracing::debug!("-- Got RR response to {}", n_r);
                }
                self.busy = false;
                if !self.ack_rx(ctx, n_r) {
                    return;
                }
                if p_f {
                    if self.solicitfbit {
                        if ctx.debug(DebugFlags::Q921_STATE) {
                            tracing::debug!("-- Got RR response to our frame");
                        }
                    } else {
                        if ctx.debug(DebugFlags::Q921_STATE) {
                            tracing::debug!("-- Unsolicited RR with P/F bit, responding");
                        }
                        self.rr(ctx, true, false);
                    }
                    self.solicitfbit = false;
                }
            }
            SFrameKind::Rnr => {
                if ctx.debug(DebugFlags::Q921_STATE) {
                    tracing::debug!("-- Got receiver not ready");
                }
                if p_f {
                    self.rr(ctx, true, false);
                }
                self.busy = true;
            }
            SFrameKind::Rej => {
                if ctx.debug(DebugFlags::Q921_STATE) {
                    tracing::debug!("-- Got reject requesting packet {}... Retransmitting.", n_r);
                }
                if p_f {
                    self.rr(ctx, true, false);
                }
                let v_r = self.v_r;
                let mut sendnow = false;
                let mut retransmit = Vec::new();
                for (idx, f) in self.txqueue.iter_mut().enumerate() {
                    if f.n_s == n_r {
                        sendnow = true;
                    }
                    if sendnow {
                        if !f.transmitted {
                            break;
                        }
                        f.n_r = v_r;
                        retransmit.push(idx);
                    }
                }
                for idx in retransmit {
                    if ctx.debug(DebugFlags::Q921_STATE) {
                        tracing::debug!("-- Retransmitting {} bytes", self.txqueue[idx].payload.len());
                    }
                    self.send_iframe_at(ctx, idx);
                }
                if !sendnow {
                    if !self.txqueue.is_empty() {
                        tracing::error!("!! Got reject for frame {}, but we only have others!", n_r);
                    } else {
                        // Peer is in sync with what we already dropped
                        self.v_a = n_r;
                        self.v_s = n_r;
                        ctx.cancel(&mut self.t200);
                        ctx.cancel(&mut self.t203);
                        self.t203 = ctx.arm(self.id, LapdTimer::T203, TimerIdx::T203);
                    }
                }
            }
        }
    }

    fn handle_uframe(&mut self, ctx: &mut LinkCtx, header: Q921Header, kind: UFrameKind, p_f: bool, payload: Vec<u8>) {
        match kind {
            UFrameKind::Dm => {
                if p_f {
                    if ctx.debug(DebugFlags::Q921_STATE) {
                        tracing::debug!("-- Got DM Mode from peer.");
                    }
                    self.dchannel_down(ctx);
                    self.restart(ctx, false);
                } else if ctx.debug(DebugFlags::Q921_STATE) {
                    tracing::debug!("-- Ignoring unsolicited DM with p/f set to 0");
                }
            }
            UFrameKind::Ui => {
                let link = self.link_info();
                self.to_cc(ctx, SapMsgInner::DlUnitdataInd(DlUnitdataInd { link, payload }));
            }
            UFrameKind::Disc => {
                if ctx.debug(DebugFlags::Q921_STATE) {
                    tracing::debug!("-- Got Disconnect from peer.");
                }
                self.send_ua(ctx, p_f);
                self.dchannel_down(ctx);
                self.restart(ctx, false);
            }
            UFrameKind::Sabme => {
                if ctx.debug(DebugFlags::Q921_STATE) {
                    tracing::debug!("-- Got SABME from {} peer.", if header.c_r { "network" } else { "cpe" });
                }
                // Commands from the network carry C/R = 1
                if header.c_r && self.node == NodeType::Network {
                    let err = "We think we're the network, but they think they're the network, too.";
                    tracing::error!("{}", err);
                    self.to_host(ctx, PriEvent::ConfigErr(EvError { err: err.to_string() }));
                    return;
                }
                if !header.c_r && self.node == NodeType::Cpe {
                    let err = "We think we're the CPE, but they think they're the CPE too.";
                    tracing::error!("{}", err);
                    self.to_host(ctx, PriEvent::ConfigErr(EvError { err: err.to_string() }));
                    return;
                }
                self.send_ua(ctx, p_f);
                self.dchannel_up(ctx);
            }
            UFrameKind::Ua => match self.state {
                Q921State::AwaitingEstablish => {
                    if ctx.debug(DebugFlags::Q921_STATE) {
                        tracing::debug!("-- Got UA from {} peer  Link up.", if header.c_r { "cpe" } else { "network" });
                    }
                    self.dchannel_up(ctx);
                }
                Q921State::TeiAssigned | Q921State::LinkConnectionReleased | Q921State::LinkConnectionEstablished if self.bri => {
                    // Somebody else answers on our TEI
                    if self.master.is_some() {
                        tracing::info!("Got UA on {} outside of link setup, TEI {} may be in use twice", self.id, self.tei);
                        self.tei_release_pending = true;
                    } else {
                        tracing::error!("Huh!? no master found");
                    }
                }
                state => tracing::error!("!! Got a UA, but i'm in state {}", state),
            },
            UFrameKind::Frmr => tracing::error!("!! Got FRMR on {}, frame got rejected!", self.id),
            UFrameKind::Xid => tracing::error!("!! XID frames not supported"),
        }
    }

    /// Drops all link state, timers and queued frames. State becomes released.
    pub fn reset(&mut self, ctx: &mut LinkCtx) {
        self.v_s = 0;
        self.v_a = 0;
        self.v_r = 0;
        self.v_na = 0;
        self.window = ctx.timer(TimerIdx::K).max(1) as usize;
        self.windowlen = 0;
        ctx.cancel(&mut self.sabme_timer);
        ctx.cancel(&mut self.t203);
        ctx.cancel(&mut self.t200);
        self.sabme_count = 0;
        self.busy = false;
        self.solicitfbit = false;
        self.state = Q921State::LinkConnectionReleased;
        self.retrans = 0;
        self.sentrej = false;
        self.txqueue.clear();
    }

    pub fn restart(&mut self, ctx: &mut LinkCtx, now: bool) {
        if self.state != Q921State::LinkConnectionReleased {
            tracing::error!("!! q921_start: Not in 'Link Connection Released' state");
            return;
        }
        self.reset(ctx);
        self.send_sabme(ctx, now);
    }

    /// Starts the link. The CPE side sends SABME at once, the network side waits
    /// a T200 period first. TEI management links request a TEI instead.
    pub fn start(&mut self, ctx: &mut LinkCtx, is_cpe: bool) {
        self.reset(ctx);
        if self.is_mgmt() {
            self.state = Q921State::Down;
            if is_cpe {
                self.tei_request(ctx);
            }
        } else {
            self.send_sabme(ctx, is_cpe);
        }
    }

    pub fn dchannel_up(&mut self, ctx: &mut LinkCtx) {
        self.reset(ctx);
        self.sentrej = false;
        self.state = Q921State::LinkConnectionEstablished;
        tracing::info!("{}: data link up (sapi {}, tei {})", self.id, self.sapi, self.tei);
        self.t203 = ctx.arm(self.id, LapdTimer::T203, TimerIdx::T203);
        let link = self.link_info();
        self.to_cc(ctx, SapMsgInner::DlEstablishInd(DlEstablishInd { link }));
        self.to_host(ctx, PriEvent::DchanUp);
    }

    pub fn dchannel_down(&mut self, ctx: &mut LinkCtx) {
        self.reset(ctx);
        tracing::info!("{}: data link down (sapi {}, tei {})", self.id, self.sapi, self.tei);
        let link = self.link_info();
        self.to_cc(ctx, SapMsgInner::DlReleaseInd(DlReleaseInd { link }));
        self.to_host(ctx, PriEvent::DchanDown);
    }

    /// Drops every timer without touching the link state, used when the instance is freed
    pub fn cancel_timers(&mut self, ctx: &mut LinkCtx) {
        ctx.cancel(&mut self.t200);
        ctx.cancel(&mut self.t203);
        ctx.cancel(&mut self.t202);
        ctx.cancel(&mut self.sabme_timer);
    }

    /// An acknowledgement is owed to the peer
    pub fn ack_pending(&self) -> bool {
        self.state == Q921State::LinkConnectionEstablished && self.v_na != self.v_r
    }
}

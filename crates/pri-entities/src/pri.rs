use std::fmt::Write as _;
use std::time::Duration;

use pri_config::{IoBackend, SharedConfig, TimerIdx};
use pri_core::pri_entities::PriEntity;
use pri_core::{CallRef, Clock, DebugFlags, NodeType, PriTime, SwitchType, SystemClock};
use pri_saps::cc::PriEvent;

use crate::callcontrol::{CallControl, SetupRequest};
use crate::error::PriError;
use crate::host::Host;
use crate::lapd::{Lapd, ROOT};
use crate::phy::{FrameIo, PhyIo, UnixDatagramIo};
use crate::scheduler::Scheduler;
use crate::{MessageQueue, MessageRouter};

pub use pri_core::names::{cause_name, plan_name, pres_name};
pub use pri_saps::cc::event_name;

type Phy = PhyIo<Box<dyn FrameIo>>;

pub fn switch_name(switch: SwitchType) -> String {
    switch.to_string()
}

pub fn node_name(node: NodeType) -> String {
    node.to_string()
}

/// One D-channel: frame I/O, Q.921, Q.931 and the event queue towards the
/// application, wired through a message router.
///
/// Driven from a single thread. The application waits for a frame or for
/// `schedule_next()`, then calls `check_event()` or `schedule_run()` and
/// collects what happened with `next_event()`. `dchannel_run()` does the
/// waiting itself.
pub struct Pri {
    config: SharedConfig,
    router: MessageRouter,
}

impl Pri {
    pub fn new(config: SharedConfig, io: Box<dyn FrameIo>) -> Self {
        Self::with_clock(config, io, Box::new(SystemClock::new()))
    }

    /// Opens the frame transport named in the configuration
    pub fn open(config: SharedConfig) -> Result<Self, PriError> {
        let cfg = config.config();
        match cfg.io.backend {
            IoBackend::UnixDatagram => {
                let (Some(local), Some(peer)) = (cfg.io.local_path.as_deref(), cfg.io.peer_path.as_deref()) else {
                    return Err(PriError::InvalidArgument("unix datagram backend needs local and peer paths"));
                };
                let io = UnixDatagramIo::bind(local, peer)?;
                Ok(Self::new(config.clone(), Box::new(io)))
            }
            _ => Err(PriError::InvalidArgument("no frame transport configured")),
        }
    }

    pub fn with_clock(config: SharedConfig, io: Box<dyn FrameIo>, clock: Box<dyn Clock>) -> Self {
        let sched = Scheduler::new(clock, ROOT);
        let mut router = MessageRouter::new(sched);
        router.register_entity(Box::new(Host::new(config.clone())));
        router.register_entity(Box::new(CallControl::new(config.clone())));
        router.register_entity(Box::new(Lapd::new(config.clone())));
        router.register_entity(Box::new(Phy::new(config.clone(), io)));

        let mut pri = Self { config, router };
        if let Some((lapd, queue, sched)) = pri.router.entity_ctx::<Lapd>(PriEntity::Lapd) {
            lapd.startup(queue, sched);
        }
        pri.router.run_end();
        let cfg = pri.config.config();
        tracing::info!("D-channel started: {} {} {:?}", cfg.switch, cfg.node, cfg.interface);
        pri
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn lapd(&self) -> Option<&Lapd> {
        self.router.entity_ref::<Lapd>(PriEntity::Lapd)
    }

    pub fn call_control(&self) -> Option<&CallControl> {
        self.router.entity_ref::<CallControl>(PriEntity::CallControl)
    }

    /// Runs `f` on call control, then delivers everything it queued
    fn with_cc<R>(&mut self, f: impl FnOnce(&mut CallControl, &mut MessageQueue, &mut Scheduler) -> Result<R, PriError>) -> Result<R, PriError> {
        let (cc, queue, sched) = self
            .router
            .entity_ctx::<CallControl>(PriEntity::CallControl)
            .ok_or(PriError::Incompatible("call control not registered"))?;
        let res = f(cc, queue, sched);
        self.router.run_end();
        res
    }

    /* Link */

    /// Drops the data link and establishes it again
    pub fn restart(&mut self) -> Result<(), PriError> {
        let (lapd, queue, sched) = self
            .router
            .entity_ctx::<Lapd>(PriEntity::Lapd)
            .ok_or(PriError::Incompatible("data link not registered"))?;
        lapd.restart(queue, sched);
        self.router.run_end();
        Ok(())
    }

    /* Calls */

    pub fn new_call(&mut self) -> Result<CallRef, PriError> {
        self.with_cc(|cc, _, _| cc.new_call())
    }

    pub fn destroy_call(&mut self, cr: CallRef) {
        // Unknown references are logged by call control
        let _ = self.with_cc(|cc, _, sched| {
            cc.destroy_call(sched, cr);
            Ok(())
        });
    }

    /// New call plus SETUP. The call is dropped again when the SETUP can't go out.
    pub fn call(&mut self, req: &SetupRequest) -> Result<CallRef, PriError> {
        let cr = self.new_call()?;
        match self.setup(cr, req) {
            Ok(()) => Ok(cr),
            Err(e) => {
                self.destroy_call(cr);
                Err(e)
            }
        }
    }

    pub fn setup(&mut self, cr: CallRef, req: &SetupRequest) -> Result<(), PriError> {
        self.with_cc(|cc, queue, sched| cc.setup(queue, sched, cr, req))
    }

    /// ALERTING
    pub fn acknowledge(&mut self, cr: CallRef, channel: i32, info: bool) -> Result<(), PriError> {
        self.with_cc(|cc, queue, _| cc.alerting(queue, cr, channel, info))
    }

    /// CALL PROCEEDING
    pub fn proceeding(&mut self, cr: CallRef, channel: i32, info: bool) -> Result<(), PriError> {
        self.with_cc(|cc, queue, _| cc.call_proceeding(queue, cr, channel, info))
    }

    pub fn progress(&mut self, cr: CallRef, channel: i32, info: bool) -> Result<(), PriError> {
        self.with_cc(|cc, queue, _| cc.progress(queue, cr, channel, info))
    }

    /// SETUP ACKNOWLEDGE, asking for more digits
    pub fn need_more_info(&mut self, cr: CallRef, channel: i32, nonisdn: bool) -> Result<(), PriError> {
        self.with_cc(|cc, queue, _| cc.setup_ack(queue, cr, channel, nonisdn))
    }

    /// CONNECT
    pub fn answer(&mut self, cr: CallRef, channel: i32, nonisdn: bool) -> Result<(), PriError> {
        self.with_cc(|cc, queue, sched| cc.connect(queue, sched, cr, channel, nonisdn))
    }

    /// One overlap dialling digit in INFORMATION
    pub fn information(&mut self, cr: CallRef, digit: char) -> Result<(), PriError> {
        self.with_cc(|cc, queue, _| cc.information(queue, cr, digit))
    }

    pub fn keypad_facility(&mut self, cr: CallRef, digits: &str) -> Result<(), PriError> {
        if digits.is_empty() {
            return Err(PriError::InvalidArgument("no keypad digits"));
        }
        self.with_cc(|cc, queue, _| cc.keypad_facility(queue, cr, digits))
    }

    pub fn notify(&mut self, cr: CallRef, channel: i32, info: i32) -> Result<(), PriError> {
        self.with_cc(|cc, queue, _| cc.notify(queue, cr, channel, info))
    }

    /// Clears the call. Cause -1 is normal clearing.
    pub fn hangup(&mut self, cr: CallRef, cause: i32) -> Result<(), PriError> {
        let cause = if cause == -1 { pri_pdus::q931::ie::cause::cause::NORMAL_CLEARING as i32 } else { cause };
        self.with_cc(|cc, queue, sched| cc.hangup(queue, sched, cr, cause))
    }

    /// RESTART of one channel
    pub fn reset(&mut self, channel: i32) -> Result<(), PriError> {
        self.with_cc(|cc, queue, _| cc.restart(queue, channel))
    }

    /// Asks the switch to connect two calls and drop us out of both
    pub fn channel_bridge(&mut self, c1: CallRef, c2: CallRef) -> Result<(), PriError> {
        self.with_cc(|cc, queue, _| cc.channel_bridge(queue, c1, c2))
    }

    pub fn mwi_activate(&mut self, cr: CallRef, req: &SetupRequest) -> Result<(), PriError> {
        self.with_cc(|cc, queue, sched| cc.mwi(queue, sched, cr, true, req))
    }

    pub fn mwi_deactivate(&mut self, cr: CallRef, req: &SetupRequest) -> Result<(), PriError> {
        self.with_cc(|cc, queue, sched| cc.mwi(queue, sched, cr, false, req))
    }

    /// Call reference value and call mode of a call
    pub fn get_crv(&self, cr: CallRef) -> Result<(u16, u8), PriError> {
        let cc = self.call_control().ok_or(PriError::Incompatible("call control not registered"))?;
        cc.call(cr).map(|c| c.crv()).ok_or(PriError::NoSuchCall(cr))
    }

    /// Gives the call another reference value. Returns the reference to use from now on.
    pub fn set_crv(&mut self, cr: CallRef, crv: u16, callmode: u8) -> Result<CallRef, PriError> {
        self.with_cc(|cc, _, sched| cc.set_crv(sched, cr, crv, callmode))
    }

    pub fn set_useruser(&mut self, cr: CallRef, info: &str) -> Result<(), PriError> {
        self.with_cc(|cc, _, _| cc.set_useruser(cr, info))
    }

    /* Settings */

    pub fn set_debug(&mut self, flags: u32) {
        self.config.state_write().debug = DebugFlags(flags);
    }

    pub fn get_debug(&self) -> u32 {
        self.config.debug().0
    }

    pub fn set_overlapdial(&mut self, enable: bool) {
        self.config.state_write().overlapdial = enable;
    }

    pub fn set_inbanddisconnect(&mut self, enable: bool) {
        self.config.state_write().inband_disconnect = enable;
    }

    /// Supplementary service APDUs in outgoing calls, subchannels included
    pub fn facility_enable(&mut self) {
        self.config.state_write().sendfacility = true;
    }

    /// Network specific facility sent in SETUP, `None` for none
    pub fn set_nsf(&mut self, nsf: Option<u8>) {
        self.config.state_write().nsf = nsf;
    }

    pub fn set_timer(&mut self, idx: TimerIdx, value: i32) -> Result<(), PriError> {
        self.config.state_write().timers.set(idx, value).map_err(PriError::InvalidArgument)
    }

    pub fn get_timer(&self, idx: TimerIdx) -> i32 {
        self.config.timer(idx)
    }

    pub fn timer_from_name(name: &str) -> Option<TimerIdx> {
        TimerIdx::from_name(name)
    }

    /* Driving */

    /// Processes at most one received frame, without waiting for it
    pub fn check_event(&mut self) -> Result<Option<PriEvent>, PriError> {
        self.poll_frame(Some(Duration::ZERO))?;
        Ok(self.next_event())
    }

    fn poll_frame(&mut self, timeout: Option<Duration>) -> Result<bool, PriError> {
        let (phy, queue, _) = self
            .router
            .entity_ctx::<Phy>(PriEntity::PhyIo)
            .ok_or(PriError::Incompatible("frame i/o not registered"))?;
        let got = phy.poll(queue, timeout)?;
        self.router.run_end();
        Ok(got)
    }

    /// Deadline of the earliest timer
    pub fn schedule_next(&self) -> Option<PriTime> {
        self.router.scheduler().schedule_next()
    }

    pub fn pending_timers(&self) -> usize {
        self.router.scheduler().pending()
    }

    /// Runs the timers that are due
    pub fn schedule_run(&mut self) -> Option<PriEvent> {
        let now = self.router.scheduler().now();
        let ran = self.router.run_timers(now);
        if ran > 0 {
            tracing::trace!("schedule_run: {} timers at {}", ran, now);
        }
        self.next_event()
    }

    /// Handles frames and timers until there is an event. Without `block` this
    /// is a single `check_event`.
    pub fn dchannel_run(&mut self, block: bool) -> Result<Option<PriEvent>, PriError> {
        if !block {
            return self.check_event();
        }
        loop {
            if let Some(ev) = self.next_event() {
                return Ok(Some(ev));
            }
            let timeout = self.schedule_next().map(|deadline| {
                let now = self.router.scheduler().now();
                Duration::from_millis(now.until(deadline))
            });
            if !self.poll_frame(timeout)? {
                if let Some(ev) = self.schedule_run() {
                    return Ok(Some(ev));
                }
            }
        }
    }

    pub fn next_event(&mut self) -> Option<PriEvent> {
        let host = self.router.entity_ctx::<Host>(PriEntity::Host)?.0;
        host.pop_event()
    }

    pub fn pending_events(&self) -> usize {
        self.router.entity_ref::<Host>(PriEntity::Host).map_or(0, |h| h.pending())
    }

    /* Diagnostics */

    pub fn dump_event(&self, event: &PriEvent) -> String {
        event.dump()
    }

    /// Link and call control counters plus the key settings, one per line
    pub fn dump_info_str(&self) -> String {
        let cfg = self.config.config();
        let state = self.config.state_read();
        let mut s = String::new();
        let _ = writeln!(s, "Switchtype: {}", cfg.switch);
        let _ = writeln!(s, "Type: {}", cfg.node);

        let (q931_rx, q931_tx) = self
            .call_control()
            .map(|cc| cc.links().fold((0, 0), |(rx, tx), l| (rx + l.rx_count, tx + l.tx_count)))
            .unwrap_or((0, 0));
        let _ = writeln!(s, "Q931 RX: {}", q931_rx);
        let _ = writeln!(s, "Q931 TX: {}", q931_tx);

        if let Some(root) = self.lapd().and_then(|l| l.root()) {
            let outstanding = root.txqueue.iter().filter(|f| f.transmitted).count();
            let _ = writeln!(s, "Q921 RX: {}", root.rx_count);
            let _ = writeln!(s, "Q921 TX: {}", root.tx_count);
            let _ = writeln!(s, "Q921 Outstanding: {}", outstanding);
            let _ = writeln!(s, "Window Length: {}/{}", root.windowlen, root.window);
            let _ = writeln!(s, "Sentrej: {}", root.sentrej as u8);
            let _ = writeln!(s, "SolicitFbit: {}", root.solicitfbit as u8);
            let _ = writeln!(s, "Retrans: {}", root.retrans);
            let _ = writeln!(s, "Busy: {}", root.busy as u8);
        }
        let _ = writeln!(s, "Overlap Dial: {}", state.overlapdial as u8);
        for idx in [TimerIdx::T200, TimerIdx::T203, TimerIdx::T305, TimerIdx::T308, TimerIdx::T309, TimerIdx::T313] {
            let _ = writeln!(s, "{} Timer: {}", idx.name(), state.timers.get(idx));
        }
        let _ = writeln!(s, "N200 Counter: {}", state.timers.get(TimerIdx::N200));
        s
    }
}

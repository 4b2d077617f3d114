use std::time::Duration;

use pri_config::SharedConfig;
use pri_core::pri_entities::PriEntity;
use pri_core::{DebugFlags, Sap};
use pri_pdus::fcs16;
use pri_saps::ph::{PhDataInd, PhDataReq};
use pri_saps::{SapMsg, SapMsgInner};

use crate::error::PriError;
use crate::phy::frame_io::FrameIo;
use crate::scheduler::Scheduler;
use crate::{MessageQueue, PriEntityTrait};

impl FrameIo for Box<dyn FrameIo> {
    fn read_frame(&mut self, timeout: Option<Duration>) -> std::io::Result<Option<Vec<u8>>> {
        self.as_mut().read_frame(timeout)
    }

    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<usize> {
        self.as_mut().write_frame(frame)
    }
}

/// Bridges the PH-SAP to a frame transport. Appends the FCS on transmit and checks
/// it on receive when configured to, otherwise leaves that to the HDLC driver.
pub struct PhyIo<F: FrameIo> {
    config: SharedConfig,
    io: F,
    compute_fcs: bool,

    rx_frames: u64,
    tx_frames: u64,
    bad_fcs: u64,
}

impl<F: FrameIo> PhyIo<F> {
    pub fn new(config: SharedConfig, io: F) -> Self {
        let compute_fcs = config.config().io.compute_fcs;
        Self {
            config,
            io,
            compute_fcs,
            rx_frames: 0,
            tx_frames: 0,
            bad_fcs: 0,
        }
    }

    /// Reads at most one frame from the transport and queues it for Lapd.
    /// Returns whether a frame was queued.
    pub fn poll(&mut self, queue: &mut MessageQueue, timeout: Option<Duration>) -> Result<bool, PriError> {
        let Some(frame) = self.io.read_frame(timeout)? else {
            return Ok(false);
        };
        if frame.len() < 3 {
            tracing::debug!("dropping runt frame of {} octets", frame.len());
            return Ok(false);
        }
        if self.compute_fcs && !fcs16::check_fcs(&frame) {
            self.bad_fcs += 1;
            tracing::warn!("dropping frame with bad FCS ({} octets)", frame.len());
            return Ok(false);
        }
        self.rx_frames += 1;
        if self.config.debug().has(DebugFlags::Q921_RAW) {
            tracing::debug!("< [ {}]", hex_line(&frame));
        }
        queue.push_back(SapMsg::new(Sap::PhSap, PriEntity::PhyIo, PriEntity::Lapd, SapMsgInner::PhDataInd(PhDataInd { frame })));
        Ok(true)
    }

    fn rx_ph_data_req(&mut self, prim: PhDataReq) {
        let mut frame = prim.frame;
        if self.compute_fcs {
            fcs16::append_fcs(&mut frame);
        } else {
            // Room for the FCS the driver fills in
            frame.extend_from_slice(&[0, 0]);
        }
        if self.config.debug().has(DebugFlags::Q921_RAW) {
            tracing::debug!("> [ {}]", hex_line(&frame));
        }
        match self.io.write_frame(&frame) {
            Ok(n) if n == frame.len() => self.tx_frames += 1,
            Ok(n) => tracing::error!("Short write: {}/{} from {}", n, frame.len(), prim.inst),
            Err(e) => tracing::error!("Write failed from {}: {}", prim.inst, e),
        }
    }

    pub fn counters(&self) -> (u64, u64, u64) {
        (self.rx_frames, self.tx_frames, self.bad_fcs)
    }
}

fn hex_line(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x} ", b)).collect()
}

impl<F: FrameIo + 'static> PriEntityTrait for PhyIo<F> {
    fn entity(&self) -> PriEntity {
        PriEntity::PhyIo
    }

    fn rx_prim(&mut self, _queue: &mut MessageQueue, _sched: &mut Scheduler, message: SapMsg) {
        tracing::trace!("rx_prim: {}", message.msg);
        match message.msg {
            SapMsgInner::PhDataReq(prim) => self.rx_ph_data_req(prim),
            other => tracing::warn!("PhyIo: unexpected primitive {} from {:?}", other, message.src),
        }
    }
}

use pri_core::CallRef;
use pri_entities::{Pri, PriError, SetupRequest};
use pri_saps::cc::PriEvent;

/// Digits needed before an overlap-dialled call is answered
const MIN_DIGITS: usize = 3;

/// Default application behaviour: answers every incoming call, hangs up
/// whenever the peer does, and optionally places one call once the D-channel is up.
pub struct Responder {
    dial: Option<String>,
    /// Call placed by us, cleared again once the peer answered
    outgoing: Option<CallRef>,
    finished: bool,
}

impl Responder {
    pub fn new(dial: Option<String>) -> Self {
        Self { dial, outgoing: None, finished: false }
    }

    /// The call we placed has been answered and cleared
    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn handle(&mut self, pri: &mut Pri, ev: &PriEvent) -> Result<(), PriError> {
        match ev {
            PriEvent::DchanUp => {
                println!("-- D-Channel is now up!");
                if let Some(number) = self.dial.take() {
                    let req = SetupRequest::new(&number, 0x21).channel(1, true, false);
                    let cr = pri.call(&req)?;
                    println!("-- Dialling {} on call {}", number, cr);
                    self.outgoing = Some(cr);
                }
            }
            PriEvent::DchanDown => println!("-- D-Channel is now down!"),
            PriEvent::Restart(r) => println!("-- Restarting channel {}", r.channel),
            PriEvent::ConfigErr(e) => println!("-- Configuration error detected: {}", e.err),
            PriEvent::Ring(ring) => {
                println!(
                    "-- Ring on channel {} (from {} to {}), answering...",
                    ring.channel, ring.callingnum, ring.callednum
                );
                if ring.channel == -1 {
                    // No channel requested yet, wait for the number
                    pri.need_more_info(ring.call, 1, true)?;
                } else {
                    pri.answer(ring.call, ring.channel, true)?;
                }
            }
            PriEvent::InfoReceived(info) => {
                println!("-- Number is: {}", info.callednum);
                if info.callednum.len() >= MIN_DIGITS {
                    pri.answer(info.call, 1, true)?;
                }
            }
            PriEvent::Answer(ans) if Some(ans.call) == self.outgoing => {
                println!("-- Call {} answered, hanging up", ans.call);
                pri.hangup(ans.call, 16)?;
            }
            PriEvent::Hangup(h) | PriEvent::HangupReq(h) => {
                println!("-- Hanging up call {} (cause {})", h.call, h.cause);
                pri.hangup(h.call, h.cause)?;
                self.check_done(h.call);
            }
            PriEvent::HangupAck(h) => self.check_done(h.call),
            _ => {}
        }
        Ok(())
    }

    fn check_done(&mut self, cr: CallRef) {
        if self.outgoing == Some(cr) {
            self.outgoing = None;
            self.finished = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pri_config::{InterfaceKind, IoBackend, SharedConfig, StackConfig};
    use pri_core::{ManualClock, NodeType, SwitchType};
    use pri_entities::phy::linked_pair;

    fn node(node: NodeType, io: pri_entities::phy::LinkedFrameIo, clock: &ManualClock) -> Pri {
        let mut cfg = StackConfig::new(node, SwitchType::Ni2, InterfaceKind::Pri);
        cfg.io.backend = IoBackend::None;
        Pri::with_clock(SharedConfig::from_config(cfg), Box::new(io), Box::new(clock.clone()))
    }

    #[test]
    fn dialled_call_is_answered_and_cleared() {
        let clock = ManualClock::new();
        let (net_io, cpe_io) = linked_pair();
        let mut net = node(NodeType::Network, net_io, &clock);
        let mut cpe = node(NodeType::Cpe, cpe_io, &clock);
        let mut net_app = Responder::new(None);
        let mut cpe_app = Responder::new(Some("5551000".to_string()));

        for _ in 0..50 {
            while let Some(ev) = net.check_event().unwrap() {
                net_app.handle(&mut net, &ev).unwrap();
            }
            while let Some(ev) = cpe.check_event().unwrap() {
                cpe_app.handle(&mut cpe, &ev).unwrap();
            }
            if cpe_app.finished() {
                break;
            }
        }
        assert!(cpe_app.finished());
        assert!(cpe.call_control().unwrap().calls().next().is_none());
    }
}

use crossbeam_channel::{Receiver, Sender};

use pri_config::{InterfaceKind, IoBackend, SharedConfig, StackConfig};
use pri_core::{ManualClock, NodeType, SwitchType};
use pri_entities::Pri;
use pri_entities::phy::linked_pair;
use pri_pdus::fcs16;
use pri_pdus::q921::{Q921Control, Q921Frame};
use pri_pdus::q931::Q931Message;
use pri_saps::cc::PriEvent;

/// Default test config for one side. Can still be modified before passing it to `LinkedPair::from_configs`
pub fn default_test_config(node: NodeType, switch: SwitchType, interface: InterfaceKind) -> StackConfig {
    let mut cfg = StackConfig::new(node, switch, interface);
    // Frames go through the in-memory pair, not a configured transport
    cfg.io.backend = IoBackend::None;
    cfg
}

/// One stack of the pair, with taps on the frames travelling towards it
pub struct Side {
    pub pri: Pri,
    /// Frames the peer sent us that have not been processed yet
    pub inbound: Receiver<Vec<u8>>,
    /// Pushes a frame as if the peer had sent it
    pub inject: Sender<Vec<u8>>,
    /// Events reported so far and not yet taken
    pub events: Vec<PriEvent>,
}

impl Side {
    /// Processes every frame waiting for us. Returns how many there were.
    pub fn pump(&mut self) -> usize {
        let mut count = 0;
        while !self.inbound.is_empty() {
            if let Some(ev) = self.pri.check_event().expect("frame i/o") {
                self.events.push(ev);
            }
            self.collect();
            count += 1;
        }
        count
    }

    pub fn collect(&mut self) {
        while let Some(ev) = self.pri.next_event() {
            self.events.push(ev);
        }
    }

    pub fn take_events(&mut self) -> Vec<PriEvent> {
        self.collect();
        std::mem::take(&mut self.events)
    }

    /// Takes the frames waiting for us off the wire, so we never see them
    pub fn intercept(&mut self) -> Vec<Vec<u8>> {
        self.inbound.try_iter().collect()
    }

    /// Hands a frame (FCS excluded) to the stack as if it came from the peer
    pub fn inject_frame(&mut self, frame: &Q921Frame) {
        let mut raw = frame.to_bytes();
        fcs16::append_fcs(&mut raw);
        self.inject.send(raw).expect("stack side of the pair is gone");
    }

    pub fn is_up(&self) -> bool {
        self.pri.lapd().and_then(|l| l.instances().last()).is_some_and(|i| i.state == pri_entities::lapd::Q921State::LinkConnectionEstablished)
    }
}

/// Network and CPE stacks connected back to back through in-memory frame transports.
/// Both share one manual clock.
pub struct LinkedPair {
    pub net: Side,
    pub cpe: Side,
    pub clock: ManualClock,
}

impl LinkedPair {
    pub fn new(switch: SwitchType, interface: InterfaceKind) -> Self {
        Self::from_configs(
            default_test_config(NodeType::Network, switch, interface),
            default_test_config(NodeType::Cpe, switch, interface),
        )
    }

    pub fn from_configs(net_cfg: StackConfig, cpe_cfg: StackConfig) -> Self {
        let clock = ManualClock::new();
        let (net_io, cpe_io) = linked_pair();
        let (net_inject, net_inbound) = net_io.inbound();
        let (cpe_inject, cpe_inbound) = cpe_io.inbound();
        let net = Pri::with_clock(SharedConfig::from_config(net_cfg), Box::new(net_io), Box::new(clock.clone()));
        let cpe = Pri::with_clock(SharedConfig::from_config(cpe_cfg), Box::new(cpe_io), Box::new(clock.clone()));
        Self {
            net: Side { pri: net, inbound: net_inbound, inject: net_inject, events: Vec::new() },
            cpe: Side { pri: cpe, inbound: cpe_inbound, inject: cpe_inject, events: Vec::new() },
            clock,
        }
    }

    /// Passes frames both ways until the wire is quiet
    pub fn pump(&mut self) -> usize {
        let mut total = 0;
        loop {
            let n = self.net.pump() + self.cpe.pump();
            if n == 0 {
                self.net.collect();
                self.cpe.collect();
                return total;
            }
            total += n;
        }
    }

    /// Moves the clock and runs whatever timers became due, without pumping
    pub fn advance(&mut self, ms: u64) {
        self.clock.advance(ms);
        for side in [&mut self.net, &mut self.cpe] {
            if let Some(ev) = side.pri.schedule_run() {
                side.events.push(ev);
            }
            side.collect();
        }
    }

    /// Brings the data link up, the way a freshly started pair does
    pub fn establish(&mut self) {
        for _ in 0..10 {
            self.pump();
            if self.net.is_up() && self.cpe.is_up() {
                return;
            }
            self.advance(1000);
        }
        panic!("data link did not come up");
    }

    /// Establishes the link and forgets the DCHAN_UP events
    pub fn establish_quiet(&mut self) {
        self.establish();
        assert!(self.net.take_events().contains(&PriEvent::DchanUp));
        assert!(self.cpe.take_events().contains(&PriEvent::DchanUp));
    }
}

/// Splits a frame taken off the wire into its Q.921 frame
pub fn decode_frame(raw: &[u8]) -> Q921Frame {
    let data = fcs16::strip_fcs(raw).expect("frame with FCS");
    Q921Frame::from_bytes(data).expect("valid Q.921 frame")
}

/// Q.931 message carried in an I-frame taken off the wire
pub fn decode_q931(raw: &[u8]) -> Option<Q931Message> {
    let frame = decode_frame(raw);
    match frame.control {
        Q921Control::I { .. } => Q931Message::from_bytes(&frame.payload).ok(),
        _ => None,
    }
}

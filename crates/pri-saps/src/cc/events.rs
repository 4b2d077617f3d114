use core::fmt;

use pri_core::CallRef;
use pri_core::names::{cause_name, plan_name, pres_name};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvRestart {
    pub channel: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvError {
    pub err: String,
}

/// Incoming call (RING) or overlap digits (INFO_RECEIVED)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvRing {
    /// Channel requested, `channel | ds1 << 8 | ds1explicit << 16`, -1 for any
    pub channel: i32,
    pub callingpres: i32,
    pub callingplanani: i32,
    pub callingplan: i32,
    pub callingani: String,
    pub callingnum: String,
    pub callingname: String,
    pub calledplan: i32,
    pub ani2: i32,
    pub callednum: String,
    pub redirectingnum: String,
    pub redirectingname: String,
    pub redirectingreason: i32,
    pub callingplanrdnis: i32,
    pub useruserinfo: String,
    /// We may pick another channel than the one requested
    pub flexible: bool,
    pub cref: i32,
    /// Transfer capability of the bearer
    pub ctype: i32,
    pub layer1: i32,
    /// Sending complete seen, no more digits will follow
    pub complete: bool,
    pub call: CallRef,
    pub callingsubaddr: String,
    pub progress: i32,
    pub progressmask: i32,
    pub origcalledname: String,
    pub origcallednum: String,
    pub callingplanorigcalled: i32,
    pub origredirectingreason: i32,
}

/// Payload of HANGUP, HANGUP_ACK and HANGUP_REQ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvHangup {
    pub channel: i32,
    pub cause: i32,
    pub cref: i32,
    pub call: CallRef,
    /// Advice of charge, number of charged units (from AOC-E)
    pub aoc_units: i64,
    pub useruserinfo: String,
}

/// Payload of RINGING and ANSWER
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvAnswer {
    pub channel: i32,
    pub cref: i32,
    pub progress: i32,
    pub progressmask: i32,
    pub call: CallRef,
    pub useruserinfo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvFacname {
    pub callingname: String,
    pub callingnum: String,
    pub channel: i32,
    pub cref: i32,
    pub call: CallRef,
    pub callingpres: i32,
    pub callingplan: i32,
}

/// Payload of PROCEEDING and PROGRESS
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvProceeding {
    pub channel: i32,
    pub cref: i32,
    pub progress: i32,
    pub progressmask: i32,
    pub cause: i32,
    pub call: CallRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvSetupAck {
    pub channel: i32,
    pub call: CallRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvNotify {
    pub channel: i32,
    pub info: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvKeypadDigit {
    pub channel: i32,
    pub call: CallRef,
    pub digits: String,
}

/// Events reported to the application. Numbering follows the classic PRI event ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriEvent {
    DchanUp,
    DchanDown,
    Restart(EvRestart),
    ConfigErr(EvError),
    Ring(Box<EvRing>),
    Hangup(EvHangup),
    Ringing(EvAnswer),
    Answer(EvAnswer),
    HangupAck(EvHangup),
    RestartAck(EvRestart),
    Facname(EvFacname),
    InfoReceived(Box<EvRing>),
    Proceeding(EvProceeding),
    SetupAck(EvSetupAck),
    HangupReq(EvHangup),
    Notify(EvNotify),
    Progress(EvProceeding),
    KeypadDigit(EvKeypadDigit),
}

impl PriEvent {
    pub fn id(&self) -> u32 {
        match self {
            PriEvent::DchanUp => 1,
            PriEvent::DchanDown => 2,
            PriEvent::Restart(_) => 3,
            PriEvent::ConfigErr(_) => 4,
            PriEvent::Ring(_) => 5,
            PriEvent::Hangup(_) => 6,
            PriEvent::Ringing(_) => 7,
            PriEvent::Answer(_) => 8,
            PriEvent::HangupAck(_) => 9,
            PriEvent::RestartAck(_) => 10,
            PriEvent::Facname(_) => 11,
            PriEvent::InfoReceived(_) => 12,
            PriEvent::Proceeding(_) => 13,
            PriEvent::SetupAck(_) => 14,
            PriEvent::HangupReq(_) => 15,
            PriEvent::Notify(_) => 16,
            PriEvent::Progress(_) => 17,
            PriEvent::KeypadDigit(_) => 18,
        }
    }

    /// Call the event refers to, if any
    pub fn call(&self) -> Option<CallRef> {
        match self {
            PriEvent::Ring(e) | PriEvent::InfoReceived(e) => Some(e.call),
            PriEvent::Hangup(e) | PriEvent::HangupAck(e) | PriEvent::HangupReq(e) => Some(e.call),
            PriEvent::Ringing(e) | PriEvent::Answer(e) => Some(e.call),
            PriEvent::Facname(e) => Some(e.call),
            PriEvent::Proceeding(e) | PriEvent::Progress(e) => Some(e.call),
            PriEvent::SetupAck(e) => Some(e.call),
            PriEvent::KeypadDigit(e) => Some(e.call),
            _ => None,
        }
    }

    /// Multi-line human readable description of the event
    pub fn dump(&self) -> String {
        let mut s = format!("Event type: {} ({})\n", event_name(self.id()), self.id());
        match self {
            PriEvent::DchanUp | PriEvent::DchanDown => {}
            PriEvent::ConfigErr(e) => s.push_str(&format!("Error: {}\n", e.err)),
            PriEvent::Restart(e) => s.push_str(&format!("Restart on channel {}\n", e.channel)),
            PriEvent::Ring(e) => {
                s.push_str(&format!(
                    "Calling number: {} ({}, {})\n",
                    e.callingnum,
                    plan_name(e.callingplan),
                    pres_name(e.callingpres)
                ));
                s.push_str(&format!("Called number: {} ({})\n", e.callednum, plan_name(e.calledplan)));
                s.push_str(&format!(
                    "Channel: {} ({}) Reference number: {}\n",
                    e.channel,
                    if e.flexible { "Flexible" } else { "Not Flexible" },
                    e.cref
                ));
            }
            PriEvent::Hangup(e) => {
                s.push_str(&format!("Hangup, reference number: {}, reason: {}\n", e.cref, cause_name(e.cause)));
            }
            _ => s.push_str(&format!("Don't know how to dump events of type {}\n", self.id())),
        }
        s
    }
}

impl fmt::Display for PriEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", event_name(self.id()))
    }
}

pub fn event_name(id: u32) -> &'static str {
    match id {
        1 => "D-Channel Up",
        2 => "D-channel Down",
        3 => "Restart channel",
        4 => "Configuration Error",
        5 => "Ring",
        6 => "Hangup",
        7 => "Ringing",
        8 => "Answer",
        9 => "Hangup ACK",
        10 => "Restart ACK",
        11 => "FacName",
        12 => "Info Received",
        13 => "Proceeding",
        14 => "Setup ACK",
        15 => "Hangup Req",
        16 => "Notify",
        17 => "Progress",
        18 => "Keypad Digit",
        _ => "Unknown Event",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_names_line_up() {
        let ev = PriEvent::HangupReq(EvHangup { cause: 16, call: 0x8001, ..Default::default() });
        assert_eq!(ev.id(), 15);
        assert_eq!(ev.to_string(), "Hangup Req");
        assert_eq!(ev.call(), Some(0x8001));
        assert_eq!(PriEvent::DchanUp.call(), None);
    }

    #[test]
    fn ring_dump_mentions_numbers() {
        let ring = EvRing { callingnum: "2565551212".into(), callednum: "5551212".into(), calledplan: 0x21, ..Default::default() };
        let dump = PriEvent::Ring(Box::new(ring)).dump();
        assert!(dump.contains("Calling number: 2565551212"));
        assert!(dump.contains("Called number: 5551212 (National number in ISDN)"));
    }
}

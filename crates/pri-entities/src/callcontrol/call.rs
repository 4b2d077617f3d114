use pri_core::{CallRef, InstanceId};
use pri_pdus::q931::CallState;
use pri_pdus::q931::ie::CallInfo;
use pri_saps::cc::EvHangup;

use crate::scheduler::TimerHandle;

/// One call attempt in the call pool
#[derive(Debug, Clone)]
pub struct Call {
    pub cr: CallRef,
    /// Instance the call signals on
    pub inst: InstanceId,
    pub our_state: CallState,
    pub peer_state: CallState,
    pub info: CallInfo,

    /// The application knows about the call and expects a hangup event
    pub alive: bool,
    /// A HANGUP_ACK is owed once RELEASE COMPLETE goes either way
    pub sendhangupack: bool,
    /// Created by a received message that isn't a SETUP yet
    pub newcall: bool,
    /// We sent at least one message for the call
    pub acked: bool,
    /// CALL PROCEEDING was sent
    pub proc_sent: bool,
    pub t308_timedout: u8,
    pub t303_expired: bool,
    pub forceinvert: bool,

    /// Charged units from AOC-E, -1 if none
    pub aoc_units: i64,
    pub retranstimer: Option<TimerHandle>,
    /// Other leg of a Q.SIG path replacement
    pub bridged_call: Option<CallRef>,
    /// RLT call id handed out by a DMS-100, the call is transferable once set
    pub rlt_call_id: Option<u32>,
    /// Encoded SETUP, resent on the first T303 expiry
    pub setup_msg: Option<Vec<u8>>,
}

impl Call {
    pub fn new(cr: CallRef, inst: InstanceId) -> Self {
        Self {
            cr,
            inst,
            our_state: CallState::Null,
            peer_state: CallState::Null,
            info: CallInfo::default(),
            alive: false,
            sendhangupack: false,
            newcall: true,
            acked: false,
            proc_sent: false,
            t308_timedout: 0,
            t303_expired: false,
            forceinvert: false,
            aoc_units: -1,
            retranstimer: None,
            bridged_call: None,
            rlt_call_id: None,
            setup_msg: None,
        }
    }

    pub fn set_our_state(&mut self, state: CallState, trace: bool) {
        if trace && self.our_state != state {
            tracing::debug!(
                "call {} on channel {} enters state {} ({})",
                self.cr,
                self.info.channel.event_channel(),
                state as u8,
                state
            );
        }
        self.our_state = state;
    }

    /// Cause as the application sees it, -1 when none was given
    pub fn event_cause(&self) -> i32 {
        match self.info.cause.value {
            0 => -1,
            v => v as i32,
        }
    }

    pub fn event_channel(&self) -> i32 {
        self.info.channel.event_channel()
    }

    /// Last received progress description, -1 if none
    pub fn event_progress(&self) -> i32 {
        if self.info.progress.mask == 0 { -1 } else { self.info.progress.progress as i32 }
    }

    /// Payload shared by the hangup family of events. Takes the user-user information.
    pub fn hangup_event(&mut self) -> EvHangup {
        EvHangup {
            channel: self.event_channel(),
            cause: self.event_cause(),
            cref: self.cr as i32,
            call: self.cr,
            aoc_units: self.aoc_units,
            useruserinfo: std::mem::take(&mut self.info.useruserinfo),
        }
    }

    /// Call reference value as shown to the application, without the origination flag
    pub fn crv(&self) -> (u16, u8) {
        ((self.cr & 0x7fff) >> 3, (self.cr & 0x7) as u8)
    }

    pub fn set_crv(&mut self, crv: u16, callmode: u8) {
        self.cr = ((crv << 3) & 0x7fff) | (callmode as u16 & 0x7);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pri_pdus::q931::ie::CauseInfo;

    #[test]
    fn crv_packs_callmode_into_low_bits() {
        let mut call = Call::new(0x8000 | 0x123, InstanceId(0));
        let (crv, mode) = call.crv();
        assert_eq!(crv, 0x123 >> 3);
        assert_eq!(mode, 0x3);
        call.set_crv(42, 5);
        assert_eq!(call.crv(), (42, 5));
        assert_eq!(call.cr & 0x8000, 0);
    }

    #[test]
    fn hangup_event_takes_user_user_info() {
        let mut call = Call::new(0x8001, InstanceId(0));
        call.info.cause = CauseInfo::new(17);
        call.info.useruserinfo = "bye".to_string();
        call.info.channel.channelno = Some(3);
        let ev = call.hangup_event();
        assert_eq!(ev.cause, 17);
        assert_eq!(ev.channel, 3);
        assert_eq!(ev.useruserinfo, "bye");
        assert_eq!(ev.aoc_units, -1);
        assert!(call.info.useruserinfo.is_empty());
        assert_eq!(call.hangup_event().useruserinfo, "");
    }

    #[test]
    fn no_cause_reads_as_minus_one() {
        let call = Call::new(1, InstanceId(0));
        assert_eq!(call.event_cause(), -1);
        assert_eq!(call.event_progress(), -1);
        assert_eq!(call.event_channel(), -1);
    }
}

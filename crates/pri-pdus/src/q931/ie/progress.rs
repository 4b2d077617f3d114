use pri_core::pdu_parse_error::PduParseErr;

use super::cause::{coding_name, location_name};

/// Progress description values as sent on the wire
pub mod prog {
    pub const CALL_NOT_E2E_ISDN: u8 = 0x01;
    pub const CALLED_NOT_ISDN: u8 = 0x02;
    pub const CALLER_NOT_ISDN: u8 = 0x03;
    pub const CALLER_RETURNED_TO_ISDN: u8 = 0x04;
    pub const INBAND_AVAILABLE: u8 = 0x08;
    pub const DELAY_AT_INTERF: u8 = 0x0a;
    pub const INTERWORKING_WITH_PUBLIC: u8 = 0x10;
    pub const INTERWORKING_NO_RELEASE: u8 = 0x11;
    pub const INTERWORKING_NO_RELEASE_PRE_ANSWER: u8 = 0x12;
    pub const INTERWORKING_NO_RELEASE_POST_ANSWER: u8 = 0x13;
}

/// Progress bits as exchanged with the application
pub mod prog_mask {
    pub const CALL_NOT_E2E_ISDN: u32 = 1 << 0;
    pub const CALLED_NOT_ISDN: u32 = 1 << 1;
    pub const CALLER_NOT_ISDN: u32 = 1 << 2;
    pub const INBAND_AVAILABLE: u32 = 1 << 3;
    pub const DELAY_AT_INTERF: u32 = 1 << 4;
    pub const INTERWORKING_WITH_PUBLIC: u32 = 1 << 5;
    pub const INTERWORKING_NO_RELEASE: u32 = 1 << 6;
    pub const INTERWORKING_NO_RELEASE_PRE_ANSWER: u32 = 1 << 7;
    pub const INTERWORKING_NO_RELEASE_POST_ANSWER: u32 = 1 << 8;
    pub const CALLER_RETURNED_TO_ISDN: u32 = 1 << 9;
}

/// Transmit priority, highest first. CALLER_RETURNED_TO_ISDN is receive only.
const TX_ORDER: [(u32, u8); 9] = [
    (prog_mask::CALL_NOT_E2E_ISDN, prog::CALL_NOT_E2E_ISDN),
    (prog_mask::CALLED_NOT_ISDN, prog::CALLED_NOT_ISDN),
    (prog_mask::CALLER_NOT_ISDN, prog::CALLER_NOT_ISDN),
    (prog_mask::INBAND_AVAILABLE, prog::INBAND_AVAILABLE),
    (prog_mask::DELAY_AT_INTERF, prog::DELAY_AT_INTERF),
    (prog_mask::INTERWORKING_WITH_PUBLIC, prog::INTERWORKING_WITH_PUBLIC),
    (prog_mask::INTERWORKING_NO_RELEASE, prog::INTERWORKING_NO_RELEASE),
    (prog_mask::INTERWORKING_NO_RELEASE_PRE_ANSWER, prog::INTERWORKING_NO_RELEASE_PRE_ANSWER),
    (prog_mask::INTERWORKING_NO_RELEASE_POST_ANSWER, prog::INTERWORKING_NO_RELEASE_POST_ANSWER),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressInfo {
    pub code: u8,
    pub loc: u8,
    /// Last received progress description
    pub progress: u8,
    /// Accumulated `prog_mask` bits, received or still to send
    pub mask: u32,
}

fn mask_for(progress: u8) -> Option<u32> {
    let bit = match progress {
        prog::CALLER_RETURNED_TO_ISDN => prog_mask::CALLER_RETURNED_TO_ISDN,
        p => TX_ORDER.iter().find(|(_, code)| *code == p)?.0,
    };
    Some(bit)
}

impl ProgressInfo {
    pub fn decode(&mut self, data: &[u8]) -> Result<(), PduParseErr> {
        if data.len() < 2 {
            return Err(PduParseErr::BufferEnded { field: Some("progress_description") });
        }
        self.loc = data[0] & 0x0f;
        self.code = (data[0] & 0x60) >> 5;
        self.progress = data[1] & 0x7f;
        match mask_for(self.progress) {
            Some(bit) => self.mask |= bit,
            None => tracing::warn!("invalid progress indicator value received: {:02x}", self.progress),
        }
        Ok(())
    }

    /// Emits one indicator for the highest priority pending bit and clears it
    pub fn encode_next(&mut self) -> Option<Vec<u8>> {
        if self.mask == 0 {
            return None;
        }
        let Some(&(bit, code)) = TX_ORDER.iter().find(|(bit, _)| self.mask & bit != 0) else {
            tracing::warn!("undefined progress bit: {:x}", self.mask);
            return None;
        };
        self.mask &= !bit;
        Some(vec![0x80 | (self.code << 5) | self.loc, 0x80 | code])
    }
}

pub fn progress_name(progress: u8) -> &'static str {
    match progress {
        prog::CALL_NOT_E2E_ISDN => {
            "Call is not end-to-end ISDN; further call progress information may be available inband."
        }
        prog::CALLED_NOT_ISDN => "Called equipment is non-ISDN.",
        prog::CALLER_NOT_ISDN => "Calling equipment is non-ISDN.",
        prog::INBAND_AVAILABLE => "Inband information or appropriate pattern now available.",
        prog::DELAY_AT_INTERF => "Delay in response at called Interface.",
        prog::INTERWORKING_WITH_PUBLIC => "Interworking with a public network.",
        prog::INTERWORKING_NO_RELEASE => "Interworking with a network unable to supply a release signal.",
        prog::INTERWORKING_NO_RELEASE_PRE_ANSWER => {
            "Interworking with a network unable to supply a release signal before answer."
        }
        prog::INTERWORKING_NO_RELEASE_POST_ANSWER => {
            "Interworking with a network unable to supply a release signal after answer."
        }
        _ => "Unknown",
    }
}

pub(crate) fn dump(data: &[u8], prefix: char) -> Vec<String> {
    let d0 = data.first().copied().unwrap_or(0);
    let d1 = data.get(1).copied().unwrap_or(0);
    vec![
        format!(
            "{} Progress Indicator (len={:2}) [ Ext: {}  Coding: {} ({})  0: {}  Location: {} ({})",
            prefix,
            data.len() + 2,
            d0 >> 7,
            coding_name((d0 & 0x60) >> 5),
            (d0 & 0x60) >> 5,
            (d0 & 0x10) >> 4,
            location_name(d0 & 0x0f),
            d0 & 0x0f
        ),
        format!(
            "{}                               Ext: {}  Progress Description: {} ({}) ]",
            prefix,
            d1 >> 7,
            progress_name(d1 & 0x7f),
            d1 & 0x7f
        ),
    ]
}

use pri_core::names::cause_name;
use pri_core::pdu_parse_error::PduParseErr;

use crate::q931::enums::ie_kind::ie_name;
use crate::q931::enums::msg_type::msg_name;

/// Cause values referenced by the stack itself
pub mod cause {
    pub const UNALLOCATED: u8 = 1;
    pub const NORMAL_CLEARING: u8 = 16;
    pub const USER_BUSY: u8 = 17;
    pub const DESTINATION_OUT_OF_ORDER: u8 = 27;
    pub const INVALID_NUMBER_FORMAT: u8 = 28;
    pub const RESPONSE_TO_STATUS_ENQUIRY: u8 = 30;
    pub const NORMAL_UNSPECIFIED: u8 = 31;
    pub const REQUESTED_CHAN_UNAVAIL: u8 = 44;
    pub const INVALID_CALL_REFERENCE: u8 = 81;
    pub const MANDATORY_IE_MISSING: u8 = 96;
    pub const MESSAGE_TYPE_NONEXIST: u8 = 97;
    pub const WRONG_MESSAGE: u8 = 98;
    pub const IE_NONEXIST: u8 = 99;
    pub const INVALID_IE_CONTENTS: u8 = 100;
    pub const WRONG_CALL_STATE: u8 = 101;
    pub const RECOVERY_ON_TIMER_EXPIRE: u8 = 102;
    pub const PROTOCOL_ERROR: u8 = 111;
    pub const INTERWORKING: u8 = 127;
}

pub mod coding {
    pub const CCITT: u8 = 0;
    pub const INTERNATIONAL: u8 = 1;
    pub const NATIONAL: u8 = 2;
    pub const NETWORK_SPECIFIC: u8 = 3;
}

pub mod location {
    pub const USER: u8 = 0;
    pub const PRIV_NET_LOCAL_USER: u8 = 1;
    pub const PUB_NET_LOCAL_USER: u8 = 2;
    pub const TRANSIT_NET: u8 = 3;
    pub const PUB_NET_REMOTE_USER: u8 = 4;
    pub const PRIV_NET_REMOTE_USER: u8 = 5;
    pub const INTERNATIONAL_NETWORK: u8 = 7;
    pub const NETWORK_BEYOND_INTERWORKING: u8 = 0x0a;
}

/// Cause element content. A zero cause value is never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CauseInfo {
    pub code: u8,
    pub loc: u8,
    pub value: u8,
}

impl CauseInfo {
    pub fn new(value: u8) -> Self {
        Self { code: coding::CCITT, loc: location::PRIV_NET_LOCAL_USER, value }
    }

    pub fn decode(&mut self, data: &[u8]) -> Result<(), PduParseErr> {
        if data.len() < 2 {
            return Err(PduParseErr::BufferEnded { field: Some("cause_value") });
        }
        self.loc = data[0] & 0x0f;
        self.code = (data[0] & 0x60) >> 5;
        self.value = data[1] & 0x7f;
        Ok(())
    }

    pub fn encode(&self) -> Option<Vec<u8>> {
        if self.value == 0 {
            return None;
        }
        Some(vec![0x80 | (self.code << 5) | self.loc, 0x80 | self.value])
    }
}

pub fn coding_name(code: u8) -> &'static str {
    match code {
        coding::CCITT => "CCITT (ITU) standard",
        coding::INTERNATIONAL => "Non-ITU international standard",
        coding::NATIONAL => "National standard",
        coding::NETWORK_SPECIFIC => "Network specific standard",
        _ => "Unknown",
    }
}

pub fn location_name(loc: u8) -> &'static str {
    match loc {
        location::USER => "User",
        location::PRIV_NET_LOCAL_USER => "Private network serving the local user",
        location::PUB_NET_LOCAL_USER => "Public network serving the local user",
        location::TRANSIT_NET => "Transit network",
        location::PUB_NET_REMOTE_USER => "Public network serving the remote user",
        location::PRIV_NET_REMOTE_USER => "Private network serving the remote user",
        location::INTERNATIONAL_NETWORK => "International network",
        location::NETWORK_BEYOND_INTERWORKING => "Network beyond the interworking point",
        _ => "Unknown",
    }
}

fn cause_class_name(class: u8) -> &'static str {
    match class {
        0 | 1 => "Normal Event",
        2 => "Network Congestion (resource unavailable)",
        3 => "Service or Option not Available",
        4 => "Service or Option not Implemented",
        5 => "Invalid message (e.g. parameter out of range)",
        6 => "Protocol Error (e.g. unknown message)",
        7 => "Interworking",
        _ => "Unknown",
    }
}

pub(crate) fn dump(data: &[u8], prefix: char) -> Vec<String> {
    let len = data.len() + 2;
    let d0 = data.first().copied().unwrap_or(0);
    let d1 = data.get(1).copied().unwrap_or(0);
    let value = d1 & 0x7f;
    let mut lines = vec![
        format!(
            "{} Cause (len={:2}) [ Ext: {}  Coding: {} ({})  Spare: {}  Location: {} ({})",
            prefix,
            len,
            d0 >> 7,
            coding_name((d0 & 0x60) >> 5),
            (d0 & 0x60) >> 5,
            (d0 & 0x10) >> 4,
            location_name(d0 & 0x0f),
            d0 & 0x0f
        ),
        format!(
            "{}                  Ext: {}  Cause: {} ({}), class = {} ({}) ]",
            prefix,
            d1 >> 7,
            cause_name(value as i32),
            value,
            cause_class_name(value >> 4),
            value >> 4
        ),
    ];
    if data.len() < 3 {
        return lines;
    }
    let diag = &data[2..];
    match value {
        cause::IE_NONEXIST => {
            for (i, b) in diag.iter().enumerate() {
                lines.push(format!("{}              Cause data {}: {:02x} ({}, {} IE)", prefix, i + 1, b, b, ie_name(*b as u16)));
            }
        }
        cause::WRONG_CALL_STATE => {
            for (i, b) in diag.iter().enumerate() {
                lines.push(format!("{}              Cause data {}: {:02x} ({}, {} message)", prefix, i + 1, b, b, msg_name(*b, false)));
            }
        }
        cause::RECOVERY_ON_TIMER_EXPIRE => {
            let hex: Vec<String> = diag.iter().map(|b| format!("{:02x}", b)).collect();
            let timer: String = diag.iter().map(|&b| if (b' '..0x7f).contains(&b) { b as char } else { '.' }).collect();
            lines.push(format!("{}              Cause data: {} (Timer T{})", prefix, hex.join(" "), timer));
        }
        _ => {
            for (i, b) in diag.iter().enumerate() {
                lines.push(format!("{}              Cause data {}: {:02x} ({})", prefix, i + 1, b, b));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_and_encode() {
        let mut c = CauseInfo::default();
        c.decode(&[0x82, 0x90]).unwrap();
        assert_eq!(c, CauseInfo { code: 0, loc: 2, value: cause::NORMAL_CLEARING });
        assert_eq!(c.encode(), Some(vec![0x82, 0x90]));
        assert_eq!(CauseInfo::default().encode(), None);
        assert!(c.decode(&[0x82]).is_err());
    }

    #[test]
    fn timer_diagnostic_is_printed_as_text() {
        let lines = dump(&[0x81, 0xe6, b'3', b'0', b'3'], '<');
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("Recover on timer expiry (102)"));
        assert!(lines[2].ends_with("33 30 33 (Timer T303)"));
    }
}
